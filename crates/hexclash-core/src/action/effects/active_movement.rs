//! Active text of movement cards.

use super::{CardEffect, EffectCategory, EffectContext};
use crate::action::transform::{bracketed_indices, update_entries, EntryPatch};
use crate::action::{ActionEntry, RotationSource};

/// `ninja-roll`: the first bracketed beat turns one step against the
/// selected rotation (`R*` becomes `L1`, `L*` becomes `R1`).
///
/// An entry that already carries a different rotation is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NinjaRollActive;

fn opposite_rotation(rotation: &str) -> Option<&'static str> {
    let trimmed = rotation.trim().to_ascii_uppercase();
    if trimmed.starts_with('R') {
        Some("L1")
    } else if trimmed.starts_with('L') {
        Some("R1")
    } else {
        None
    }
}

impl CardEffect for NinjaRollActive {
    fn card_id(&self) -> &'static str {
        "ninja-roll"
    }

    fn category(&self) -> EffectCategory {
        EffectCategory::ActiveMovement
    }

    fn apply(&self, list: &[ActionEntry], ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>> {
        let target = *bracketed_indices(list).first()?;
        let opposite = opposite_rotation(ctx.rotation)?;
        update_entries(list, &[target], |entry| {
            if !entry.rotation.is_empty() && entry.rotation != opposite {
                return None;
            }
            EntryPatch::new()
                .rotation(opposite, Some(RotationSource::Forced))
                .apply(entry)
        })
    }
}
