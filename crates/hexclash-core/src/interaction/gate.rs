//! Intake of player decisions.
//!
//! [`submit`] validates a submission against the interaction it names and
//! records the resolution. Every check runs before anything is written, so a
//! rejected submission leaves the interaction list unchanged.

use serde::{Deserialize, Serialize};

use super::{Interaction, InteractionDetail, InteractionKind, InteractionResolution};
use crate::deck::{discard_requirements, DeckState};
use crate::error::InteractionError;
use crate::hex::Hex;

/// A decision as it arrives from a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionSubmission {
    /// Throw direction, validated to `0..6`.
    Throw {
        /// Raw direction index.
        direction_index: i64,
    },
    /// Combo choice.
    Combo {
        /// True to continue.
        continue_combo: bool,
    },
    /// Hand-trigger choice with the cards paid.
    HandTrigger {
        /// True to use the card.
        used: bool,
        /// Movement cards discarded as part of the cost.
        #[serde(default)]
        movement_card_ids: Vec<String>,
    },
    /// Discard selection.
    Discard {
        /// Ability cards to discard.
        #[serde(default)]
        ability_card_ids: Vec<String>,
        /// Movement cards to discard.
        #[serde(default)]
        movement_card_ids: Vec<String>,
    },
    /// Movement cards a draw restores.
    Draw {
        /// Exhausted movement cards to return to hand.
        #[serde(default)]
        movement_card_ids: Vec<String>,
    },
    /// Platform placement.
    HavenPlatform {
        /// The chosen hex.
        target_hex: Hex,
    },
    /// Guard repeat choice.
    GuardContinue {
        /// True to repeat.
        continue_guard: bool,
    },
    /// Rewind return choice.
    RewindReturn {
        /// True to return.
        return_to_anchor: bool,
    },
}

impl InteractionSubmission {
    /// The kind this submission answers.
    #[must_use]
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Throw { .. } => InteractionKind::Throw,
            Self::Combo { .. } => InteractionKind::Combo,
            Self::HandTrigger { .. } => InteractionKind::HandTrigger,
            Self::Discard { .. } => InteractionKind::Discard,
            Self::Draw { .. } => InteractionKind::Draw,
            Self::HavenPlatform { .. } => InteractionKind::HavenPlatform,
            Self::GuardContinue { .. } => InteractionKind::GuardContinue,
            Self::RewindReturn { .. } => InteractionKind::RewindReturn,
        }
    }
}

/// Validates and records a decision.
///
/// # Arguments
///
/// * `interactions` - All interactions of the match
/// * `user` - The submitting user
/// * `id` - The interaction being answered
/// * `submission` - The decision
/// * `deck` - The submitter's deck, when card counts should be checked
///
/// # Errors
///
/// - [`InteractionError::NotFound`] for an unknown id
/// - [`InteractionError::AlreadyResolved`] for a decided interaction
/// - [`InteractionError::NotOwner`] when `user` may not answer it
/// - [`InteractionError::PayloadMismatch`] when the submission kind differs
/// - [`InteractionError::DirectionOutOfRange`], [`InteractionError::HexNotOffered`],
///   [`InteractionError::CountMismatch`], [`InteractionError::CardNotOffered`]
///   for invalid payloads
pub fn submit<'a>(
    interactions: &'a mut [Interaction],
    user: &str,
    id: &str,
    submission: InteractionSubmission,
    deck: Option<&DeckState>,
) -> Result<&'a Interaction, InteractionError> {
    let interaction = interactions
        .iter_mut()
        .find(|interaction| interaction.id == id)
        .ok_or_else(|| InteractionError::NotFound { id: id.to_string() })?;
    if !interaction.is_pending() {
        return Err(InteractionError::AlreadyResolved { id: id.to_string() });
    }
    let owns = interaction.actor == user || (interaction.kind() == InteractionKind::Discard && interaction.target == user);
    if !owns {
        return Err(InteractionError::NotOwner {
            id: id.to_string(),
            user: user.to_string(),
        });
    }
    if submission.kind() != interaction.kind() {
        return Err(InteractionError::PayloadMismatch {
            id: id.to_string(),
            expected: interaction.kind(),
        });
    }

    let resolution = to_resolution(interaction, submission, deck)?;
    tracing::debug!(interaction = %interaction.id, user, "interaction resolved");
    interaction.resolve(resolution)?;
    Ok(interaction)
}

fn to_resolution(
    interaction: &Interaction,
    submission: InteractionSubmission,
    deck: Option<&DeckState>,
) -> Result<InteractionResolution, InteractionError> {
    let id = interaction.id.as_str();
    let resolution = match submission {
        InteractionSubmission::Throw { direction_index } => {
            let direction = usize::try_from(direction_index)
                .ok()
                .filter(|index| *index < 6)
                .ok_or(InteractionError::DirectionOutOfRange { index: direction_index })?;
            InteractionResolution::Throw {
                direction_index: direction,
            }
        }
        InteractionSubmission::Combo { continue_combo } => InteractionResolution::Combo { continue_combo },
        InteractionSubmission::HandTrigger {
            used,
            movement_card_ids,
        } => {
            if !used {
                InteractionResolution::HandTrigger {
                    used: false,
                    ability_card_ids: Vec::new(),
                    movement_card_ids: Vec::new(),
                }
            } else {
                let card_id = interaction.trigger_card_id().unwrap_or_default().to_string();
                if let Some(deck) = deck {
                    let required = discard_requirements(deck, 1);
                    check_count(id, required.movement, movement_card_ids.len())?;
                    if !deck.ability_hand.contains(&card_id) {
                        return Err(InteractionError::CountMismatch {
                            id: id.to_string(),
                            expected: 1,
                            actual: 0,
                        });
                    }
                }
                InteractionResolution::HandTrigger {
                    used: true,
                    ability_card_ids: vec![card_id],
                    movement_card_ids,
                }
            }
        }
        InteractionSubmission::Discard {
            ability_card_ids,
            movement_card_ids,
        } => {
            if let (Some(deck), InteractionDetail::Discard { count }) = (deck, &interaction.detail) {
                let required = discard_requirements(deck, *count as usize);
                check_count(id, required.ability, ability_card_ids.len())?;
                check_count(id, required.movement, movement_card_ids.len())?;
            }
            InteractionResolution::Discard {
                ability_card_ids,
                movement_card_ids,
            }
        }
        InteractionSubmission::Draw { movement_card_ids } => {
            if let InteractionDetail::Draw { movement_count, .. } = &interaction.detail {
                check_count(id, *movement_count as usize, movement_card_ids.len())?;
            }
            if let Some(deck) = deck {
                let unavailable = movement_card_ids
                    .iter()
                    .enumerate()
                    .find(|(index, card_id)| {
                        !deck.movement.contains(card_id)
                            || !deck.exhausted.contains(*card_id)
                            || movement_card_ids[..*index].contains(card_id)
                    });
                if let Some((_, card_id)) = unavailable {
                    return Err(InteractionError::CardNotOffered {
                        id: id.to_string(),
                        card_id: card_id.clone(),
                    });
                }
            }
            InteractionResolution::Draw { movement_card_ids }
        }
        InteractionSubmission::HavenPlatform { target_hex } => {
            if let InteractionDetail::HavenPlatform { touching, .. } = &interaction.detail {
                if !touching.contains(&target_hex) {
                    return Err(InteractionError::HexNotOffered {
                        id: id.to_string(),
                        hex: target_hex,
                    });
                }
            }
            InteractionResolution::HavenPlatform { target_hex }
        }
        InteractionSubmission::GuardContinue { continue_guard } => {
            InteractionResolution::GuardContinue { continue_guard }
        }
        InteractionSubmission::RewindReturn { return_to_anchor } => {
            InteractionResolution::RewindReturn { return_to_anchor }
        }
    };
    Ok(resolution)
}

fn check_count(id: &str, expected: usize, actual: usize) -> Result<(), InteractionError> {
    if expected == actual {
        Ok(())
    } else {
        Err(InteractionError::CountMismatch {
            id: id.to_string(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::HandTriggerKind;

    fn interactions() -> Vec<Interaction> {
        vec![
            Interaction::pending(1, "alice", "bob", InteractionDetail::Throw { damage: 4, kbf: 2 }),
            Interaction::pending(2, "bob", "bob", InteractionDetail::Discard { count: 1 }),
            Interaction::pending(
                3,
                "alice",
                "alice",
                InteractionDetail::HavenPlatform {
                    touching: Hex::new(2, 0).touching(),
                    consumed_beat: None,
                },
            ),
            Interaction::pending(
                4,
                "bob",
                "alice",
                InteractionDetail::HandTrigger {
                    card_id: "iron-will".into(),
                    trigger: HandTriggerKind::Hit,
                    order: None,
                    attack_hexes: Vec::new(),
                    draw_count: 0,
                    damage: 3,
                },
            )
            .with_id("hand-trigger:iron-will:4:bob:alice".into()),
        ]
    }

    fn deck() -> DeckState {
        DeckState::new(
            vec!["step".into(), "dash".into(), "leap".into(), "fleche".into()],
            vec![
                "jab".into(),
                "iron-will".into(),
                "guard".into(),
                "parry".into(),
                "spike".into(),
            ],
        )
    }

    mod ownership {
        use super::*;

        #[test]
        fn unknown_id() {
            let mut list = interactions();
            let err = submit(&mut list, "alice", "nope", InteractionSubmission::Combo { continue_combo: true }, None)
                .unwrap_err();
            assert_eq!(err, InteractionError::NotFound { id: "nope".into() });
        }

        #[test]
        fn not_the_actor() {
            let mut list = interactions();
            let err = submit(
                &mut list,
                "bob",
                "throw:1:alice:bob",
                InteractionSubmission::Throw { direction_index: 2 },
                None,
            )
            .unwrap_err();
            assert!(matches!(err, InteractionError::NotOwner { .. }));
            assert!(list[0].is_pending());
        }

        #[test]
        fn discard_target_may_answer() {
            let mut list = interactions();
            let resolved = submit(
                &mut list,
                "bob",
                "discard:2:bob:bob",
                InteractionSubmission::Discard {
                    ability_card_ids: vec!["jab".into()],
                    movement_card_ids: Vec::new(),
                },
                None,
            )
            .unwrap();
            assert!(!resolved.is_pending());
        }
    }

    mod payloads {
        use super::*;

        #[test]
        fn throw_direction_range() {
            let mut list = interactions();
            let err = submit(
                &mut list,
                "alice",
                "throw:1:alice:bob",
                InteractionSubmission::Throw { direction_index: 6 },
                None,
            )
            .unwrap_err();
            assert_eq!(err, InteractionError::DirectionOutOfRange { index: 6 });
            let ok = submit(
                &mut list,
                "alice",
                "throw:1:alice:bob",
                InteractionSubmission::Throw { direction_index: 2 },
                None,
            )
            .unwrap();
            assert_eq!(ok.throw_direction(), Some(2));
        }

        #[test]
        fn kind_mismatch() {
            let mut list = interactions();
            let err = submit(
                &mut list,
                "alice",
                "throw:1:alice:bob",
                InteractionSubmission::Combo { continue_combo: false },
                None,
            )
            .unwrap_err();
            assert!(matches!(err, InteractionError::PayloadMismatch { .. }));
        }

        #[test]
        fn haven_hex_must_be_offered() {
            let mut list = interactions();
            let err = submit(
                &mut list,
                "alice",
                "haven-platform:3:alice:alice",
                InteractionSubmission::HavenPlatform {
                    target_hex: Hex::new(-4, 0),
                },
                None,
            )
            .unwrap_err();
            assert!(matches!(err, InteractionError::HexNotOffered { .. }));
        }

        #[test]
        fn discard_counts_follow_hand_rules() {
            let mut list = interactions();
            let deck = deck();
            let err = submit(
                &mut list,
                "bob",
                "discard:2:bob:bob",
                InteractionSubmission::Discard {
                    ability_card_ids: vec!["jab".into(), "guard".into()],
                    movement_card_ids: Vec::new(),
                },
                Some(&deck),
            )
            .unwrap_err();
            assert_eq!(
                err,
                InteractionError::CountMismatch {
                    id: "discard:2:bob:bob".into(),
                    expected: 1,
                    actual: 2,
                }
            );
        }

        #[test]
        fn hand_trigger_pays_with_its_own_card() {
            let mut list = interactions();
            let deck = deck();
            let resolved = submit(
                &mut list,
                "bob",
                "hand-trigger:iron-will:4:bob:alice",
                InteractionSubmission::HandTrigger {
                    used: true,
                    movement_card_ids: vec!["step".into()],
                },
                Some(&deck),
            )
            .unwrap();
            assert!(resolved.trigger_used());
            assert_eq!(
                resolved.resolution,
                Some(InteractionResolution::HandTrigger {
                    used: true,
                    ability_card_ids: vec!["iron-will".into()],
                    movement_card_ids: vec!["step".into()],
                })
            );
        }

        #[test]
        fn draw_restores_exactly_the_asked_movement() {
            let mut draw = Interaction::resolved(
                5,
                "bob",
                "bob",
                InteractionDetail::Draw {
                    count: 1,
                    movement_count: 0,
                },
                InteractionResolution::Draw {
                    movement_card_ids: Vec::new(),
                },
            );
            draw.require_movement_selection(1);
            let mut list = vec![draw];
            let mut deck = deck();
            deck.exhausted.extend(["dash".to_string(), "leap".to_string()]);

            let err = submit(
                &mut list,
                "bob",
                "draw:5:bob:bob",
                InteractionSubmission::Draw {
                    movement_card_ids: vec!["dash".into(), "leap".into()],
                },
                Some(&deck),
            )
            .unwrap_err();
            assert_eq!(
                err,
                InteractionError::CountMismatch {
                    id: "draw:5:bob:bob".into(),
                    expected: 1,
                    actual: 2,
                }
            );
            let err = submit(
                &mut list,
                "bob",
                "draw:5:bob:bob",
                InteractionSubmission::Draw {
                    movement_card_ids: vec!["step".into()],
                },
                Some(&deck),
            )
            .unwrap_err();
            assert!(matches!(err, InteractionError::CardNotOffered { .. }));
            assert!(list[0].is_pending());

            let resolved = submit(
                &mut list,
                "bob",
                "draw:5:bob:bob",
                InteractionSubmission::Draw {
                    movement_card_ids: vec!["leap".into()],
                },
                Some(&deck),
            )
            .unwrap();
            assert_eq!(
                resolved.resolution,
                Some(InteractionResolution::Draw {
                    movement_card_ids: vec!["leap".into()],
                })
            );
        }
    }

    #[test]
    fn second_submission_is_rejected() {
        let mut list = interactions();
        submit(
            &mut list,
            "alice",
            "throw:1:alice:bob",
            InteractionSubmission::Throw { direction_index: 1 },
            None,
        )
        .unwrap();
        let err = submit(
            &mut list,
            "alice",
            "throw:1:alice:bob",
            InteractionSubmission::Throw { direction_index: 4 },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, InteractionError::AlreadyResolved { .. }));
        assert_eq!(list[0].throw_direction(), Some(1));
    }
}
