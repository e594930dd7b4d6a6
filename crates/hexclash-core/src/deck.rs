//! Deck and hand rules.
//!
//! A [`DeckState`] is owned by the match collaborator. The engine reads it to
//! validate submissions and to decide which interactions a player can be
//! offered, and mutates it only through the operations here.
//!
//! # Hand Model
//!
//! - Movement cards are all known; a used movement card is *exhausted* until
//!   the next refresh. The movement hand is the non-exhausted ones.
//! - Abilities are dealt from a deck into a hand of [`HAND_SIZE`]. A used or
//!   discarded ability goes to the bottom of the deck.
//! - The movement hand is kept no larger than the ability hand (capped at
//!   [`HAND_SIZE`]).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::action::effects::EffectRegistry;
use crate::action::{is_combo_action, label_is, ActionEntry, ActionListBuilder, OPEN_ACTION};
use crate::card::{CardCatalog, CardType};
use crate::error::{BuildError, PairProblem, ValidationError};
use crate::hex::{Board, Hex};
use crate::interaction::{Interaction, InteractionKind, HAND_TRIGGERS};
use crate::roster::Roster;
use crate::timeline::Timeline;

/// Baseline ability hand size and movement hand cap.
pub const HAND_SIZE: usize = 4;

/// Largest movement hand a draw lets the player rebuild by choice.
pub const DRAW_SELECTION_MAX_MOVEMENT: usize = 3;

/// One player's cards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckState {
    /// Every movement card of the deck.
    pub movement: Vec<String>,
    /// Abilities in hand.
    pub ability_hand: Vec<String>,
    /// Abilities left to draw, top first.
    pub ability_deck: Vec<String>,
    /// Movement cards used since the last refresh.
    pub exhausted: BTreeSet<String>,
    /// Beat of the last land refresh.
    pub last_refresh_index: Option<usize>,
    /// Active card of the last submission.
    pub active_card_id: Option<String>,
    /// Passive card of the last submission.
    pub passive_card_id: Option<String>,
}

/// Cards a discard of a given size takes from each hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscardRequirement {
    /// Abilities to discard.
    pub ability: usize,
    /// Movement cards to discard.
    pub movement: usize,
}

/// What a draw of a given size restores to the movement hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRequirement {
    /// Abilities the deck can actually deal.
    pub draw: usize,
    /// Exhausted movement cards returned to hand.
    pub restore: usize,
    /// True if the player picks the restored cards.
    pub requires_selection: bool,
}

/// Movement hand size allowed next to `ability_count` abilities.
#[must_use]
pub fn target_movement_hand_size(ability_count: usize) -> usize {
    ability_count.min(HAND_SIZE)
}

/// What a discard of `count` cards requires from `deck`.
///
/// Abilities are capped by the hand; movement cards are discarded until the
/// movement hand fits next to the remaining abilities.
#[must_use]
pub fn discard_requirements(deck: &DeckState, count: usize) -> DiscardRequirement {
    let ability = count.min(deck.ability_hand.len());
    let target = target_movement_hand_size(deck.ability_hand.len() - ability);
    DiscardRequirement {
        ability,
        movement: deck.movement_hand().len().saturating_sub(target),
    }
}

/// What a draw of `count` cards requires from `deck`.
#[must_use]
pub fn draw_requirements(deck: &DeckState, count: usize) -> DrawRequirement {
    let draw = count.min(deck.ability_deck.len());
    let target = target_movement_hand_size(deck.ability_hand.len() + draw);
    let restore = target.saturating_sub(deck.movement_hand().len());
    DrawRequirement {
        draw,
        restore,
        requires_selection: restore > 0 && target <= DRAW_SELECTION_MAX_MOVEMENT,
    }
}

impl DeckState {
    /// Creates a deck, dealing the first [`HAND_SIZE`] abilities.
    #[must_use]
    pub fn new(movement: Vec<String>, abilities: Vec<String>) -> Self {
        let mut ability_deck = abilities;
        let rest = ability_deck.split_off(ability_deck.len().min(HAND_SIZE));
        Self {
            movement,
            ability_hand: ability_deck,
            ability_deck: rest,
            ..Self::default()
        }
    }

    /// Movement cards that are not exhausted, in deck order.
    #[must_use]
    pub fn movement_hand(&self) -> Vec<&str> {
        self.movement
            .iter()
            .filter(|id| !self.exhausted.contains(*id))
            .map(String::as_str)
            .collect()
    }

    /// Draws up to `count` abilities and rebalances the movement hand.
    ///
    /// Returns the drawn ids.
    pub fn draw(&mut self, count: usize) -> Vec<String> {
        self.draw_restoring(count, &[])
    }

    /// Draws like [`DeckState::draw`], restoring the `restore` movement
    /// cards first when the movement hand grows.
    pub fn draw_restoring(&mut self, count: usize, restore: &[String]) -> Vec<String> {
        let take = count.min(self.ability_deck.len());
        let drawn: Vec<String> = self.ability_deck.drain(..take).collect();
        self.ability_hand.extend(drawn.iter().cloned());
        self.sync_movement_hand(restore, &[]);
        drawn
    }

    /// Discards abilities to the bottom of the deck, then movement cards.
    ///
    /// Movement ids that are not needed or not in hand are ignored; missing
    /// movement discards are taken from the end of the deck list.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CardUnavailable`] if an ability is not in
    /// hand. Nothing is discarded in that case.
    pub fn discard(&mut self, abilities: &[String], movement: &[String]) -> Result<(), ValidationError> {
        if let Some(missing) = abilities.iter().find(|id| !self.ability_hand.contains(id)) {
            return Err(ValidationError::CardUnavailable {
                id: missing.clone(),
                card_type: CardType::Ability,
            });
        }
        for id in abilities {
            if let Some(index) = self.ability_hand.iter().position(|held| held == id) {
                let card = self.ability_hand.remove(index);
                self.ability_deck.push(card);
            }
        }
        self.sync_movement_hand(&[], movement);
        Ok(())
    }

    /// Restores or exhausts movement cards until the movement hand matches
    /// the ability hand.
    fn sync_movement_hand(&mut self, restore: &[String], discard: &[String]) {
        let target = target_movement_hand_size(self.ability_hand.len());
        let mut size = self.movement_hand().len();
        if size < target {
            let preferred = restore.iter().filter(|id| self.exhausted.contains(*id)).cloned();
            let fallback = self.movement.iter().filter(|id| self.exhausted.contains(*id)).cloned();
            let candidates: Vec<String> = preferred.chain(fallback).collect();
            for id in candidates {
                if size >= target {
                    break;
                }
                if self.exhausted.remove(&id) {
                    size += 1;
                }
            }
        } else if size > target {
            let preferred = discard
                .iter()
                .filter(|id| self.movement.contains(id) && !self.exhausted.contains(*id))
                .cloned();
            let fallback = self.movement.iter().rev().filter(|id| !self.exhausted.contains(*id)).cloned();
            let candidates: Vec<String> = preferred.chain(fallback).collect();
            for id in candidates {
                if size <= target {
                    break;
                }
                if self.exhausted.insert(id) {
                    size -= 1;
                }
            }
        }
    }

    /// Records a submitted action set: the movement card is exhausted and
    /// the ability cycles to the bottom of the deck.
    pub fn apply_card_use(&mut self, used: &ValidatedSubmission) {
        self.active_card_id = Some(used.active_card_id.clone());
        self.passive_card_id = Some(used.passive_card_id.clone());
        self.exhausted.insert(used.movement_card_id.clone());
        if let Some(index) = self.ability_hand.iter().position(|id| *id == used.ability_card_id) {
            let card = self.ability_hand.remove(index);
            self.ability_deck.push(card);
        }
        self.last_refresh_index = None;
    }

    /// Clears exhausted movement and draws abilities up to `hand_size`.
    pub fn refresh(&mut self, hand_size: usize) {
        self.exhausted.clear();
        while self.ability_hand.len() < hand_size {
            let Some(next) = self.ability_deck.first().cloned() else {
                break;
            };
            self.ability_deck.remove(0);
            self.ability_hand.push(next);
        }
    }

    /// Returns true if any card in hand has a combo step.
    #[must_use]
    pub fn has_combo_card(&self, catalog: &CardCatalog) -> bool {
        self.movement_hand()
            .into_iter()
            .chain(self.ability_hand.iter().map(String::as_str))
            .filter_map(|id| catalog.get(id))
            .any(|card| card.actions.iter().any(|action| is_combo_action(action)))
    }

    /// Hand-trigger cards currently held.
    #[must_use]
    pub fn hand_trigger_cards(&self) -> BTreeSet<String> {
        let movement = self.movement_hand();
        HAND_TRIGGERS
            .iter()
            .filter(|definition| match definition.card_type {
                CardType::Ability => self.ability_hand.iter().any(|id| id == definition.card_id),
                CardType::Movement => movement.contains(&definition.card_id),
            })
            .map(|definition| definition.card_id.to_string())
            .collect()
    }

    /// Returns true if the player holds any card to pay a guard repeat with.
    #[must_use]
    pub fn can_continue_guard(&self) -> bool {
        !self.movement_hand().is_empty() || !self.ability_hand.is_empty()
    }
}

// =============================================================================
// Submissions
// =============================================================================

/// An action set as it arrives from a player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSubmission {
    /// Card played for its actions.
    pub active_card_id: String,
    /// Card played for its text.
    pub passive_card_id: String,
    /// Selected rotation label.
    pub rotation: String,
}

/// A submission that passed validation, with its built action set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    /// The action set to write.
    pub action_list: Vec<ActionEntry>,
    /// The active card.
    pub active_card_id: String,
    /// The passive card.
    pub passive_card_id: String,
    /// Whichever of the pair is the movement card.
    pub movement_card_id: String,
    /// Whichever of the pair is the ability card.
    pub ability_card_id: String,
}

/// Validates a submission against the player's cards and builds its action
/// set.
///
/// # Errors
///
/// Checks run in this order and the first failure is returned:
///
/// 1. [`ValidationError::MissingCard`] for an empty id
/// 2. [`ValidationError::InvalidCardPair`] for the same id twice
/// 3. [`ValidationError::UnknownCard`] for an id missing from the catalog
/// 4. [`ValidationError::InvalidCardPair`] for two cards of one type
/// 5. [`ValidationError::CardUnavailable`] for a movement card not in the
///    deck or an ability not in hand
/// 6. [`ValidationError::CardExhausted`] for an exhausted movement card
/// 7. [`ValidationError::RotationMissing`] / [`ValidationError::RotationInvalid`]
/// 8. [`ValidationError::NoActionList`] / [`ValidationError::NoRefresh`]
pub fn validate_submission(
    submission: &ActionSubmission,
    deck: &DeckState,
    catalog: &CardCatalog,
    effects: &EffectRegistry,
) -> Result<ValidatedSubmission, ValidationError> {
    let active_id = submission.active_card_id.trim();
    let passive_id = submission.passive_card_id.trim();
    if active_id.is_empty() || passive_id.is_empty() {
        return Err(ValidationError::MissingCard);
    }
    if active_id == passive_id {
        return Err(ValidationError::InvalidCardPair {
            reason: PairProblem::SameCard,
        });
    }
    let active = catalog
        .get(active_id)
        .ok_or_else(|| ValidationError::UnknownCard { id: active_id.to_string() })?;
    let passive = catalog
        .get(passive_id)
        .ok_or_else(|| ValidationError::UnknownCard { id: passive_id.to_string() })?;
    if active.card_type == passive.card_type {
        return Err(ValidationError::InvalidCardPair {
            reason: PairProblem::SameType,
        });
    }

    let (movement, ability) = if active.card_type == CardType::Movement {
        (active, passive)
    } else {
        (passive, active)
    };
    if !deck.movement.contains(&movement.id) {
        return Err(ValidationError::CardUnavailable {
            id: movement.id.clone(),
            card_type: CardType::Movement,
        });
    }
    if !deck.ability_hand.contains(&ability.id) {
        return Err(ValidationError::CardUnavailable {
            id: ability.id.clone(),
            card_type: CardType::Ability,
        });
    }
    if deck.exhausted.contains(&movement.id) {
        return Err(ValidationError::CardExhausted {
            id: movement.id.clone(),
        });
    }

    let rotation = submission.rotation.trim();
    if rotation.is_empty() {
        return Err(ValidationError::RotationMissing);
    }
    if !active.rotations.allows(rotation) {
        return Err(ValidationError::RotationInvalid {
            rotation: rotation.to_string(),
            card_id: active.id.clone(),
        });
    }
    if active.actions.is_empty() {
        return Err(ValidationError::NoActionList {
            card_id: active.id.clone(),
        });
    }
    if active.refresh_offset().is_none() {
        return Err(ValidationError::NoRefresh {
            card_id: active.id.clone(),
        });
    }

    let action_list = ActionListBuilder::new(catalog, effects)
        .build(&active.id, &passive.id, rotation)
        .map_err(|error| match error {
            BuildError::UnknownCard { id } => ValidationError::UnknownCard { id },
            BuildError::SameCardType { .. } => ValidationError::InvalidCardPair {
                reason: PairProblem::SameType,
            },
        })?;
    Ok(ValidatedSubmission {
        action_list,
        active_card_id: active.id.clone(),
        passive_card_id: passive.id.clone(),
        movement_card_id: movement.id.clone(),
        ability_card_id: ability.id.clone(),
    })
}

// =============================================================================
// Land Refresh
// =============================================================================

/// A refresh granted by [`refresh_on_land`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandRefresh {
    /// Who refreshed.
    pub user_id: String,
    /// The open beat the refresh belongs to.
    pub beat_index: usize,
    /// The platform stood on, when not on land.
    pub platform: Option<Hex>,
}

/// Refreshes every player standing on land at the timeline's earliest open
/// beat.
///
/// A player refreshes when their first open beat is the earliest open beat of
/// the match, the entry there is exactly `E`, they stand on land, and they
/// have not refreshed at that beat already. Nothing refreshes while any
/// interaction is pending, and a combo continued at that beat skips it.
///
/// A platform hex in `platforms` counts as land; the refresh then reports
/// the platform so the caller can consume it.
///
/// `hand_size` is the default ability hand size; a character's
/// `max_hand_size` power overrides it.
pub fn refresh_on_land(
    decks: &mut BTreeMap<String, DeckState>,
    timeline: &Timeline,
    roster: &Roster,
    board: &Board,
    platforms: &[Hex],
    interactions: &[Interaction],
    hand_size: usize,
) -> Vec<LandRefresh> {
    if decks.is_empty() || interactions.iter().any(Interaction::is_pending) {
        return Vec::new();
    }
    let earliest = timeline.earliest_open_index(roster);
    let mut refreshed = Vec::new();
    for (user_id, deck) in decks.iter_mut() {
        let Some(character) = roster.get(user_id) else {
            continue;
        };
        let first_open = timeline.first_open_index(&character.user_id);
        if first_open != earliest || deck.last_refresh_index == Some(first_open) {
            continue;
        }
        let combo_continued = interactions.iter().any(|interaction| {
            interaction.kind() == InteractionKind::Combo
                && interaction.actor == character.user_id
                && interaction.beat_index == first_open
                && interaction.combo_continues() == Some(true)
        });
        if combo_continued {
            continue;
        }
        let entry = timeline.entry(first_open, &character.user_id);
        if entry.is_some_and(|entry| !label_is(&entry.entry.action, OPEN_ACTION)) {
            continue;
        }
        let location = entry
            .map(|entry| entry.location)
            .or_else(|| timeline.last_entry_before(first_open, &character.user_id).map(|entry| entry.location))
            .unwrap_or(character.position);
        let platform = (!board.is_land(location) && platforms.contains(&location)).then_some(location);
        if !board.is_land(location) && platform.is_none() {
            continue;
        }
        deck.refresh(character.powers.max_hand_size.unwrap_or(hand_size));
        deck.last_refresh_index = Some(first_open);
        tracing::debug!(actor = %character.user_id, beat = first_open, on_platform = platform.is_some(), "land refresh");
        refreshed.push(LandRefresh {
            user_id: character.user_id.clone(),
            beat_index: first_open,
            platform,
        });
    }
    refreshed
}
