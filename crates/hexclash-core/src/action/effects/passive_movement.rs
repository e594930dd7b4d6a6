//! Passive text of movement cards.

use super::{CardEffect, EffectCategory, EffectContext};
use crate::action::{normalize_label, ActionEntry, WAIT_ACTION};
use crate::card::CardType;

/// `fleche`: with an ability active, the last `W` is dropped when an earlier
/// beat contains an attack.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlechePassive;

fn contains_attack(action: &str) -> bool {
    action
        .split('-')
        .any(|token| normalize_label(token).to_ascii_lowercase().contains('a'))
}

impl CardEffect for FlechePassive {
    fn card_id(&self) -> &'static str {
        "fleche"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::PassiveMovement
    }

    fn apply(&self, list: &[ActionEntry], ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        if ctx.active.card_type != CardType::Ability {
            return None;
        }
        let last_wait = list
            .iter()
            .rposition(|entry| entry.action.trim().eq_ignore_ascii_case(WAIT_ACTION))?;
        if !list[..last_wait].iter().any(|entry| contains_attack(&entry.action)) {
            return None;
        }
        let mut next = list.to_vec();
        next.remove(last_wait);
        Some(next)
    }
}
