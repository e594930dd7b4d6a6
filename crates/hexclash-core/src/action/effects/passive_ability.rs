//! Passive text of ability cards.
//!
//! Most of these rewrite movement beats of the active card: `m` becomes a
//! charge, a kick, an attack sweep. Labels are matched case-insensitively
//! after removing brackets, and replacements keep the original bracket
//! marking.

use super::{CardEffect, EffectCategory, EffectContext};
use crate::action::transform::{
    label_ends_with, map_entries, replace_all, replace_first, replace_label, replace_last, EntryPatch,
};
use crate::action::{normalize_label, ActionEntry, WAIT_ACTION};

/// The six-direction strike some passives attach.
const SWEEP: &str = "a-La-Ra-BLa-BRa-Ba";

macro_rules! passive_ability {
    ($name:ident, $id:literal) => {
        impl CardEffect for $name {
            fn card_id(&self) -> &'static str {
                $id
            }

            fn category(&self) -> EffectCategory {
                EffectCategory::PassiveAbility
            }

            fn apply(&self, list: &[ActionEntry], _ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
                self.rewrite(list)
            }
        }
    };
}

/// `chase`: a wait is inserted before the set (taking over the start
/// rotation) and every `m` becomes `2m`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChasePassive;

impl ChasePassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        let first = list.first()?;
        let mut wait = first.clone();
        wait.action = WAIT_ACTION.to_string();
        wait.interaction = None;
        let cleared = EntryPatch::new()
            .rotation("", None)
            .apply(first)
            .unwrap_or_else(|| first.clone());
        let mut shifted = Vec::with_capacity(list.len() + 1);
        shifted.push(wait);
        shifted.push(cleared);
        shifted.extend_from_slice(&list[1..]);
        Some(replace_all(&shifted, "m", "2m", &EntryPatch::new()).unwrap_or(shifted))
    }
}

passive_ability!(ChasePassive, "chase");

/// `counter-attack`: the first `m` gains a backward strike (3 damage, KBF 3).
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterAttackPassive;

impl CounterAttackPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        replace_first(list, "m", "m-Ba", &EntryPatch::new().attack(3, 3))
    }
}

passive_ability!(CounterAttackPassive, "counter-attack");

/// `cross-slash`: every `m` strikes both forward diagonals (2 damage, KBF 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossSlashPassive;

impl CrossSlashPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        replace_all(list, "m", "m-La-Ra", &EntryPatch::new().attack(2, 1))
    }
}

passive_ability!(CrossSlashPassive, "cross-slash");

/// `flying-knee`: moves become charges (1 damage, KBF 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct FlyingKneePassive;

impl FlyingKneePassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        map_entries(list, |_, entry| {
            if !label_ends_with(&entry.action, 'm') {
                return None;
            }
            let label = normalize_label(&entry.action);
            let next = format!("{}c", &label[..label.len() - 1]);
            replace_label(entry, &next, &EntryPatch::new().attack(1, 1))
        })
    }
}

passive_ability!(FlyingKneePassive, "flying-knee");

/// `guard`: waits become backward blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardPassive;

impl GuardPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        replace_all(list, WAIT_ACTION, "Bb", &EntryPatch::new())
    }
}

passive_ability!(GuardPassive, "guard");

/// `jab`: +30 priority on every beat.
#[derive(Debug, Clone, Copy, Default)]
pub struct JabPassive;

impl JabPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        map_entries(list, |_, entry| {
            EntryPatch::new().priority(entry.priority + 30).apply(entry)
        })
    }
}

passive_ability!(JabPassive, "jab");

/// `push-kick`: moves and jumps go backward.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushKickPassive;

impl PushKickPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        map_entries(list, |_, entry| {
            let label = normalize_label(&entry.action);
            let movable = label_ends_with(label, 'm') || label_ends_with(label, 'j');
            if !movable || label.starts_with('B') {
                return None;
            }
            replace_label(entry, &format!("B{label}"), &EntryPatch::new())
        })
    }
}

passive_ability!(PushKickPassive, "push-kick");

/// `smash-attack`: every jump is followed by an all-around strike
/// (1 damage, KBF 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct SmashAttackPassive;

impl SmashAttackPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        if !list.iter().any(|entry| label_ends_with(&entry.action, 'j')) {
            return None;
        }
        let mut next = Vec::with_capacity(list.len() + 1);
        for entry in list {
            next.push(entry.clone());
            if label_ends_with(&entry.action, 'j') {
                let mut smash = entry.clone();
                smash.action = SWEEP.to_string();
                smash.rotation.clear();
                smash.rotation_source = None;
                smash.interaction = None;
                smash.damage = 1;
                smash.kbf = 1;
                next.push(smash);
            }
        }
        Some(next)
    }
}

passive_ability!(SmashAttackPassive, "smash-attack");

/// `smoke-bomb`: toggles the backward prefix on moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmokeBombPassive;

impl SmokeBombPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        map_entries(list, |_, entry| {
            if !label_ends_with(&entry.action, 'm') {
                return None;
            }
            let label = normalize_label(&entry.action);
            let next = label
                .strip_prefix('B')
                .map_or_else(|| format!("B{label}"), str::to_string);
            replace_label(entry, &next, &EntryPatch::new())
        })
    }
}

passive_ability!(SmokeBombPassive, "smoke-bomb");

/// `whirlwind`: the last `m` becomes a charge with an all-around strike
/// (1 damage, KBF 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhirlwindPassive;

impl WhirlwindPassive {
    fn rewrite(self, list: &[ActionEntry]) -> Option<Vec<ActionEntry>> {
        replace_last(list, "m", "c-La-Ra-BLa-BRa-Ba", &EntryPatch::new().attack(1, 0))
    }
}

passive_ability!(WhirlwindPassive, "whirlwind");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::effects::test_support::{card, labels, raw_list};
    use crate::action::RotationSource;
    use crate::card::CardType;

    fn run(effect: &dyn CardEffect, template: &[&str], rotation: &str) -> Option<Vec<ActionEntry>> {
        let active = card("dash", CardType::Movement, template);
        let passive = card(effect.card_id(), CardType::Ability, &["a"]);
        let list = raw_list(&active, &passive, rotation);
        let ctx = EffectContext {
            active: &active,
            passive: &passive,
            rotation,
        };
        effect.apply(&list, &ctx)
    }

    mod chase {
        use super::*;

        #[test]
        fn prepends_wait_with_rotation() {
            let result = run(&ChasePassive, &["m", "[m]", "E"], "R1").unwrap();
            assert_eq!(labels(&result), vec!["W", "2m", "[2m]", "E"]);
            assert_eq!(result[0].rotation, "R1");
            assert_eq!(result[0].rotation_source, Some(RotationSource::Selected));
            assert_eq!(result[1].rotation, "");
            assert_eq!(result[1].rotation_source, None);
        }

        #[test]
        fn empty_list_is_noop() {
            assert!(ChasePassive.rewrite(&[]).is_none());
        }
    }

    #[test]
    fn counter_attack_adds_back_strike_once() {
        let result = run(&CounterAttackPassive, &["m", "m", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["m-Ba", "m", "E"]);
        assert_eq!((result[0].damage, result[0].kbf), (3, 3));
        assert_eq!((result[1].damage, result[1].kbf), (4, 2));
    }

    #[test]
    fn cross_slash_rewrites_every_move() {
        let result = run(&CrossSlashPassive, &["m", "2m", "[m]", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["m-La-Ra", "2m", "[m-La-Ra]", "E"]);
    }

    #[test]
    fn flying_knee_turns_moves_into_charges() {
        let result = run(&FlyingKneePassive, &["2m", "[m]", "j", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["2c", "[c]", "j", "E"]);
        assert_eq!(result[0].damage, 1);
        assert_eq!(result[2].damage, 4);
    }

    #[test]
    fn guard_blocks_on_waits() {
        let result = run(&GuardPassive, &["W", "m", "w", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["Bb", "m", "Bb", "E"]);
        assert!(run(&GuardPassive, &["m", "E"], "0").is_none());
    }

    #[test]
    fn jab_raises_priority() {
        let result = run(&JabPassive, &["m", "E"], "0").unwrap();
        assert!(result.iter().all(|entry| entry.priority == 50));
    }

    #[test]
    fn push_kick_reverses_moves_and_jumps() {
        let result = run(&PushKickPassive, &["m", "2j", "Bm", "a", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["Bm", "B2j", "Bm", "a", "E"]);
    }

    #[test]
    fn smash_attack_follows_jumps() {
        let result = run(&SmashAttackPassive, &["2j", "E"], "R1").unwrap();
        assert_eq!(labels(&result), vec!["2j", SWEEP, "E"]);
        assert_eq!(result[1].rotation, "");
        assert_eq!((result[1].damage, result[1].kbf), (1, 1));
        assert!(run(&SmashAttackPassive, &["m", "E"], "0").is_none());
    }

    #[test]
    fn smoke_bomb_toggles_backward() {
        let result = run(&SmokeBombPassive, &["m", "[Bm]", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["Bm", "[m]", "E"]);
    }

    #[test]
    fn whirlwind_spins_the_last_move() {
        let result = run(&WhirlwindPassive, &["m", "m", "E"], "0").unwrap();
        assert_eq!(labels(&result), vec!["m", "c-La-Ra-BLa-BRa-Ba", "E"]);
        assert_eq!((result[1].damage, result[1].kbf), (1, 0));
    }
}
