//! Action-list builder.
//!
//! Turns an active card, a passive card, and a rotation into the action set
//! written to the timeline: one entry per template label, the card text
//! applied on top, and a trailing `E`.
//!
//! # Invariants
//!
//! - Only the first entry carries the selected rotation, tagged
//!   [`RotationSource::Selected`].
//! - Priority, damage, and knockback factor default to the active card's.
//! - Attack labels carry a throw marker when either card grants throws.
//! - The smoke-bomb swap recurses at most once.

use super::effects::{EffectContext, EffectRegistry};
use super::{label_is, ActionEntry, RotationSource, MARKER_ACTION, OPEN_ACTION};
use crate::card::{label_has_attack, Card, CardCatalog, CardRole};
use crate::error::BuildError;
use crate::interaction::InteractionKind;

/// The card whose marker swaps active and passive mid-set.
pub const SWAP_CARD_ID: &str = "smoke-bomb";

/// Builds action sets from card ids.
#[derive(Debug, Clone, Copy)]
pub struct ActionListBuilder<'a> {
    catalog: &'a CardCatalog,
    effects: &'a EffectRegistry,
}

impl<'a> ActionListBuilder<'a> {
    /// Creates a builder over a catalog and rule registry.
    #[must_use]
    pub fn new(catalog: &'a CardCatalog, effects: &'a EffectRegistry) -> Self {
        Self { catalog, effects }
    }

    /// Looks up both cards and builds their action set.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownCard`] for an id missing from the catalog
    /// and [`BuildError::SameCardType`] when both cards share a type.
    pub fn build(&self, active_id: &str, passive_id: &str, rotation: &str) -> Result<Vec<ActionEntry>, BuildError> {
        let active = self.card(active_id)?;
        let passive = self.card(passive_id)?;
        if active.card_type == passive.card_type {
            return Err(BuildError::SameCardType {
                card_type: active.card_type,
            });
        }
        let mut list = self.build_cards(active, passive, rotation, true);
        if !list.is_empty() && !list.last().is_some_and(|entry| label_is(&entry.action, OPEN_ACTION)) {
            list.push(ActionEntry::open());
        }
        Ok(list)
    }

    fn card(&self, id: &str) -> Result<&'a Card, BuildError> {
        self.catalog
            .get(id)
            .ok_or_else(|| BuildError::UnknownCard { id: id.to_string() })
    }

    /// Builds the list for an already resolved pair.
    ///
    /// An empty template gives an empty list.
    #[must_use]
    pub fn build_cards(&self, active: &Card, passive: &Card, rotation: &str, allow_swap: bool) -> Vec<ActionEntry> {
        if active.actions.is_empty() {
            return Vec::new();
        }
        let throws = active.grants_throw(CardRole::Active) || passive.grants_throw(CardRole::Passive);
        let raw: Vec<ActionEntry> = active
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let mut entry = ActionEntry::new(action.as_str())
                    .with_attack(active.priority, active.damage, active.kbf)
                    .with_cards(&active.id, &passive.id);
                if index == 0 {
                    entry = entry.with_rotation(rotation, Some(RotationSource::Selected));
                }
                if throws && label_has_attack(action) {
                    entry.interaction = Some(InteractionKind::Throw);
                }
                entry
            })
            .collect();

        let ctx = EffectContext {
            active,
            passive,
            rotation,
        };
        let list = self.effects.apply(&raw, &ctx).into_owned();

        if !allow_swap || active.id != SWAP_CARD_ID {
            return list;
        }
        let Some(swap_index) = list.iter().position(|entry| label_is(&entry.action, MARKER_ACTION)) else {
            return list;
        };
        let swapped = self.build_cards(passive, active, rotation, false);
        if swapped.is_empty() {
            return list;
        }
        tracing::debug!(card = %active.id, swap_index, "active and passive swapped");
        let mut spliced = list;
        spliced.truncate(swap_index);
        spliced.extend(swapped);
        spliced
    }
}

/// Builds an action set with the given catalog and rules.
///
/// # Errors
///
/// See [`ActionListBuilder::build`].
pub fn build_action_list(
    catalog: &CardCatalog,
    effects: &EffectRegistry,
    active_id: &str,
    passive_id: &str,
    rotation: &str,
) -> Result<Vec<ActionEntry>, BuildError> {
    ActionListBuilder::new(catalog, effects).build(active_id, passive_id, rotation)
}
