//! Active text of ability cards.

use super::{CardEffect, EffectCategory, EffectContext};
use crate::action::transform::{bracketed_indices, update_entries, EntryPatch};
use crate::action::{ActionEntry, RotationSource};

/// `counter-attack`: its active text is resolved during combat, so the list
/// is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterAttackActive;

impl CardEffect for CounterAttackActive {
    fn card_id(&self) -> &'static str {
        "counter-attack"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::ActiveAbility
    }

    fn apply(&self, _list: &[ActionEntry], _ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        None
    }
}

/// `aerial-strike`: the beat after the first bracketed beat turns around
/// (forced `3`). The selected start rotation stays.
#[derive(Debug, Clone, Copy, Default)]
pub struct AerialStrikeActive;

impl CardEffect for AerialStrikeActive {
    fn card_id(&self) -> &'static str {
        "aerial-strike"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::ActiveAbility
    }

    fn apply(&self, list: &[ActionEntry], _ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        let target = bracketed_indices(list).first()? + 1;
        if target >= list.len() {
            return None;
        }
        update_entries(list, &[target], |entry| {
            EntryPatch::new()
                .rotation("3", Some(RotationSource::Forced))
                .apply(entry)
        })
    }
}

/// `smoke-bomb`: the selected rotation moves from the first beat to the beat
/// after the first bracketed beat.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmokeBombActive;

impl CardEffect for SmokeBombActive {
    fn card_id(&self) -> &'static str {
        "smoke-bomb"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::ActiveAbility
    }

    fn apply(&self, list: &[ActionEntry], _ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        let target = bracketed_indices(list).first()? + 1;
        if target >= list.len() {
            return None;
        }
        let selected = list.first()?.rotation.trim().to_string();
        if selected.is_empty() {
            return None;
        }
        let cleared = update_entries(list, &[0], |entry| {
            EntryPatch::new().rotation("", None).apply(entry)
        });
        let base = cleared.as_deref().unwrap_or(list);
        let moved = update_entries(base, &[target], |entry| {
            EntryPatch::new()
                .rotation(selected.as_str(), Some(RotationSource::Selected))
                .apply(entry)
        });
        moved.or(cleared)
    }
}

/// `whirlwind`: bracketed beats hit with knockback factor 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhirlwindActive;

impl CardEffect for WhirlwindActive {
    fn card_id(&self) -> &'static str {
        "whirlwind"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::ActiveAbility
    }

    fn apply(&self, list: &[ActionEntry], _ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        let indices = bracketed_indices(list);
        update_entries(list, &indices, |entry| EntryPatch::new().kbf(3).apply(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::effects::test_support::{card, labels, raw_list};
    use crate::card::{Card, CardType};

    fn apply(effect: &dyn CardEffect, active: &Card, rotation: &str) -> Option<Vec<ActionEntry>> {
        let passive = card("step", CardType::Movement, &["m", "E"]);
        let list = raw_list(active, &passive, rotation);
        let ctx = EffectContext {
            active,
            passive: &passive,
            rotation,
        };
        effect.apply(&list, &ctx)
    }

    #[test]
    fn counter_attack_is_identity() {
        let active = card("counter-attack", CardType::Ability, &["[b]", "a", "E"]);
        assert!(apply(&CounterAttackActive, &active, "0").is_none());
    }

    #[test]
    fn aerial_strike_turns_after_bracket() {
        let active = card("aerial-strike", CardType::Ability, &["[j]", "a", "E"]);
        let result = apply(&AerialStrikeActive, &active, "R1").unwrap();
        assert_eq!(result[0].rotation, "R1");
        assert_eq!(result[1].rotation, "3");
        assert_eq!(result[1].rotation_source, Some(RotationSource::Forced));
    }

    #[test]
    fn aerial_strike_without_bracket_is_noop() {
        let active = card("aerial-strike", CardType::Ability, &["j", "a", "E"]);
        assert!(apply(&AerialStrikeActive, &active, "R1").is_none());
    }

    #[test]
    fn smoke_bomb_moves_selected_rotation() {
        let active = card("smoke-bomb", CardType::Ability, &["[a]", "X1", "E"]);
        let result = apply(&SmokeBombActive, &active, "L2").unwrap();
        assert_eq!(result[0].rotation, "");
        assert_eq!(result[0].rotation_source, None);
        assert_eq!(result[1].rotation, "L2");
        assert_eq!(result[1].rotation_source, Some(RotationSource::Selected));
        assert_eq!(labels(&result), vec!["[a]", "X1", "E"]);
    }

    #[test]
    fn whirlwind_raises_bracketed_kbf() {
        let active = card("whirlwind", CardType::Ability, &["a", "[a]", "E"]);
        let result = apply(&WhirlwindActive, &active, "0").unwrap();
        assert_eq!(result[0].kbf, 2);
        assert_eq!(result[1].kbf, 3);
    }
}
