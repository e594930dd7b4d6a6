//! Match outcome: who is out and from which beat.
//!
//! Two ways to lose are evaluated here; writing the outcome into the
//! timeline stays with the caller.
//!
//! - **Far from land**: a character's last known hex is more than the
//!   threshold away from land at some beat
//! - **No cards in the abyss**: at the earliest open beat a character stands
//!   in the abyss, open, with no playable pair left
//!
//! # Invariants
//!
//! - Evaluation is read-only and deterministic: ties go to the earlier beat,
//!   then the larger distance, then the smaller user id

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::{label_is, OPEN_ACTION};
use crate::deck::DeckState;
use crate::hex::{Board, Hex};
use crate::roster::{Character, Roster};
use crate::timeline::Timeline;

/// Why a character lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossReason {
    /// Drifted too far from land.
    FarFromLand,
    /// Stranded in the abyss without a playable pair.
    NoCardsAbyss,
}

/// The first beat at which a character is too far from land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceLoss {
    /// The character.
    pub user_id: String,
    /// The beat.
    pub beat_index: usize,
    /// Distance to the nearest land hex at that beat.
    pub distance: i32,
}

/// A decided match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// The winner.
    pub winner_user_id: String,
    /// The loser.
    pub loser_user_id: String,
    /// Why.
    pub reason: LossReason,
    /// Beat at which the loss takes effect.
    pub beat_index: usize,
}

fn distance_to_land(board: &Board, hex: Hex) -> i32 {
    board.distance_to_land(hex).unwrap_or(i32::MAX)
}

fn character_distance_loss(timeline: &Timeline, character: &Character, board: &Board, threshold: i32) -> Option<DistanceLoss> {
    let loss = |beat_index: usize, distance: i32| DistanceLoss {
        user_id: character.user_id.clone(),
        beat_index,
        distance,
    };
    let mut location = character.position;
    if timeline.is_empty() {
        let distance = distance_to_land(board, location);
        return (distance > threshold).then(|| loss(0, distance));
    }
    for index in 0..timeline.len() {
        if let Some(entry) = timeline.entry(index, &character.user_id) {
            location = entry.location;
        }
        let distance = distance_to_land(board, location);
        if distance > threshold {
            return Some(loss(index, distance));
        }
    }
    None
}

/// Reports the first far-from-land loss of the match, if any.
///
/// Each character's location carries forward through beats where it has no
/// entry. Among characters out of range, the earliest beat wins, then the
/// larger distance, then the smaller user id.
#[must_use]
pub fn distance_loss(timeline: &Timeline, roster: &Roster, board: &Board, threshold: i32) -> Option<DistanceLoss> {
    roster
        .iter()
        .filter_map(|character| character_distance_loss(timeline, character, board, threshold))
        .min_by(|a, b| {
            a.beat_index
                .cmp(&b.beat_index)
                .then(b.distance.cmp(&a.distance))
                .then(a.user_id.cmp(&b.user_id))
        })
}

fn has_playable_cards(deck: Option<&DeckState>) -> bool {
    deck.is_none_or(|deck| {
        !deck.ability_hand.is_empty() && deck.movement.iter().any(|card| !deck.exhausted.contains(card))
    })
}

/// Decides the match, if it is decided.
///
/// A far-from-land loss takes effect on the beat after the character went
/// out of range. A stranded loss needs exactly one stranded character.
#[must_use]
pub fn evaluate_outcome(
    timeline: &Timeline,
    roster: &Roster,
    decks: &BTreeMap<String, DeckState>,
    board: &Board,
    threshold: i32,
) -> Option<MatchOutcome> {
    let winner_against = |loser: &str| {
        roster
            .iter()
            .find(|character| character.user_id != loser)
            .map(|character| character.user_id.clone())
    };

    if let Some(loss) = distance_loss(timeline, roster, board, threshold) {
        let winner_user_id = winner_against(&loss.user_id)?;
        tracing::debug!(loser = %loss.user_id, beat = loss.beat_index, distance = loss.distance, "far from land");
        return Some(MatchOutcome {
            winner_user_id,
            loser_user_id: loss.user_id,
            reason: LossReason::FarFromLand,
            beat_index: loss.beat_index + 1,
        });
    }

    let earliest = timeline.earliest_open_index(roster);
    let stranded: Vec<(&str, usize)> = roster
        .iter()
        .filter_map(|character| {
            let user_id = character.user_id.as_str();
            let index = timeline.first_open_index(user_id);
            if index != earliest {
                return None;
            }
            let entry = timeline.entry(index, user_id);
            if entry.is_some_and(|entry| !label_is(&entry.entry.action, OPEN_ACTION)) {
                return None;
            }
            let location = entry
                .map(|entry| entry.location)
                .or_else(|| timeline.last_entry_before(index, user_id).map(|entry| entry.location))
                .unwrap_or(character.position);
            if board.is_land(location) || has_playable_cards(decks.get(user_id)) {
                return None;
            }
            Some((user_id, index))
        })
        .collect();
    let [(loser, beat_index)] = stranded.as_slice() else {
        return None;
    };
    Some(MatchOutcome {
        winner_user_id: winner_against(loser)?,
        loser_user_id: (*loser).to_string(),
        reason: LossReason::NoCardsAbyss,
        beat_index: *beat_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionEntry;
    use crate::timeline::CharacterState;

    fn roster() -> Roster {
        Roster::new(vec![
            Character::new("alice", Hex::new(-1, 0), 0),
            Character::new("bob", Hex::new(1, 0), 180),
        ])
    }

    fn place(timeline: &mut Timeline, index: usize, user_id: &str, position: Hex, board: &Board) {
        let state = CharacterState {
            position,
            ..CharacterState::default()
        };
        timeline.upsert(index, user_id, ActionEntry::open(), &state, board);
    }

    mod distance {
        use super::*;

        #[test]
        fn on_land_is_never_a_loss() {
            let board = Board::standard();
            let roster = roster();
            let timeline = Timeline::seed(&roster, &board, 3);
            assert_eq!(distance_loss(&timeline, &roster, &board, 4), None);
        }

        #[test]
        fn reports_the_first_beat_out_of_range() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 4);
            place(&mut timeline, 1, "bob", Hex::new(6, 0), &board);
            place(&mut timeline, 2, "bob", Hex::new(8, 0), &board);
            let loss = distance_loss(&timeline, &roster, &board, 4).unwrap();
            assert_eq!(loss.user_id, "bob");
            assert_eq!(loss.beat_index, 2);
            assert_eq!(loss.distance, 6);
        }

        #[test]
        fn location_carries_through_missing_entries() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 1);
            place(&mut timeline, 0, "alice", Hex::new(-8, 0), &board);
            timeline.ensure_len(3);
            let loss = distance_loss(&timeline, &roster, &board, 4).unwrap();
            assert_eq!((loss.user_id.as_str(), loss.beat_index), ("alice", 0));
        }

        #[test]
        fn ties_go_to_the_larger_distance() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 2);
            place(&mut timeline, 1, "alice", Hex::new(-8, 0), &board);
            place(&mut timeline, 1, "bob", Hex::new(9, 0), &board);
            let loss = distance_loss(&timeline, &roster, &board, 4).unwrap();
            assert_eq!(loss.user_id, "bob");
        }
    }

    mod outcome {
        use super::*;

        #[test]
        fn far_from_land_takes_effect_next_beat() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 3);
            place(&mut timeline, 1, "bob", Hex::new(8, 0), &board);
            let outcome = evaluate_outcome(&timeline, &roster, &BTreeMap::new(), &board, 4).unwrap();
            assert_eq!(outcome.winner_user_id, "alice");
            assert_eq!(outcome.reason, LossReason::FarFromLand);
            assert_eq!(outcome.beat_index, 2);
        }

        #[test]
        fn stranded_without_cards_loses() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 1);
            place(&mut timeline, 0, "bob", Hex::new(4, 0), &board);
            let mut decks = BTreeMap::new();
            decks.insert("bob".to_string(), DeckState::new(vec!["step".into()], Vec::new()));
            let outcome = evaluate_outcome(&timeline, &roster, &decks, &board, 4).unwrap();
            assert_eq!(outcome.loser_user_id, "bob");
            assert_eq!(outcome.reason, LossReason::NoCardsAbyss);
            assert_eq!(outcome.beat_index, 0);
        }

        #[test]
        fn stranded_with_cards_plays_on() {
            let board = Board::standard();
            let roster = roster();
            let mut timeline = Timeline::seed(&roster, &board, 1);
            place(&mut timeline, 0, "bob", Hex::new(4, 0), &board);
            let mut decks = BTreeMap::new();
            decks.insert(
                "bob".to_string(),
                DeckState::new(vec!["step".into()], vec!["jab".into()]),
            );
            assert_eq!(evaluate_outcome(&timeline, &roster, &decks, &board, 4), None);
        }
    }
}
