//! Interactions: player decisions that gate beat resolution.
//!
//! The resolver creates an [`Interaction`] whenever an entry needs a player
//! decision (a throw direction, a combo continuation, a hand-trigger use, a
//! discard, ...). While an interaction is pending, resolution stops at its
//! beat. Once resolved, the next resolution pass replays the timeline and
//! reads the decision back.
//!
//! # Architecture
//!
//! - [`InteractionDetail`] is what the resolver offered, one variant per kind.
//! - [`InteractionResolution`] is what the player answered, one variant per
//!   kind. [`gate`] checks that the two kinds agree.
//! - Ids are stable across passes (see [`interaction_id`]), so a replay finds
//!   the interaction created by the previous pass instead of a duplicate.
//!
//! # Invariants
//!
//! - A resolution is written at most once. [`Interaction::resolve`] rejects a
//!   second attempt and leaves the first payload untouched. A draw the
//!   resolver settled itself may be reopened once for a movement pick.
//! - `status` is `Resolved` exactly when `resolution` is `Some`.

pub mod gate;
pub mod hand_trigger;

pub use gate::{submit, InteractionSubmission};
pub use hand_trigger::{
    active_hand_trigger, rank_hand_triggers, HandTriggerDefinition, HandTriggerKind, TriggerStanding, HAND_TRIGGERS,
};

use serde::{Deserialize, Serialize};

use crate::error::InteractionError;
use crate::hex::Hex;

// =============================================================================
// Kinds and Status
// =============================================================================

/// The kind of decision an interaction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    /// Choose a knockback direction for a throw.
    Throw,
    /// Continue or decline a combo.
    Combo,
    /// Use a card from hand in response to an event.
    HandTrigger,
    /// Discard cards.
    Discard,
    /// Draw cards. Created resolved, reopened when the player must pick the
    /// movement cards the draw restores.
    Draw,
    /// Place an ethereal platform.
    HavenPlatform,
    /// Repeat a guard action set.
    GuardContinue,
    /// A recorded rewind anchor. Created resolved.
    RewindFocus,
    /// Return to a rewind anchor.
    RewindReturn,
    /// A scheduled parry counter. Created resolved.
    Parry,
}

impl InteractionKind {
    /// The kebab-case name used in ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Throw => "throw",
            Self::Combo => "combo",
            Self::HandTrigger => "hand-trigger",
            Self::Discard => "discard",
            Self::Draw => "draw",
            Self::HavenPlatform => "haven-platform",
            Self::GuardContinue => "guard-continue",
            Self::RewindFocus => "rewind-focus",
            Self::RewindReturn => "rewind-return",
            Self::Parry => "parry",
        }
    }
}

/// Lifecycle of an interaction. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionStatus {
    /// Waiting for a decision.
    Pending,
    /// Decided.
    Resolved,
}

/// Why a rewind focus stopped being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusEndReason {
    /// The owner returned to the anchor.
    Returned,
    /// The owner was knocked back.
    Knockback,
    /// The owner was stunned.
    Stun,
}

// =============================================================================
// Offers
// =============================================================================

/// What the resolver offered, with the bookkeeping it writes back on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionDetail {
    /// A throw landed; the thrower picks the direction.
    Throw {
        /// Damage the throw deals.
        damage: i32,
        /// Knockback factor of the throw.
        kbf: i32,
    },
    /// A hit was followed by a combo check.
    Combo {
        /// The card offering the combo.
        card_id: Option<String>,
    },
    /// A card in hand can react to what just happened.
    HandTrigger {
        /// The trigger card.
        card_id: String,
        /// The event that raised the offer.
        trigger: HandTriggerKind,
        /// Server-assigned order among simultaneous offers (1 is first).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<u32>,
        /// Hexes the triggering attack struck.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attack_hexes: Vec<Hex>,
        /// Cards drawn if used.
        #[serde(default)]
        draw_count: u32,
        /// Damage of the hit, for ranking.
        #[serde(default)]
        damage: i32,
    },
    /// The target must discard.
    Discard {
        /// Cards to discard.
        count: u32,
    },
    /// The target draws.
    Draw {
        /// Cards to draw.
        count: u32,
        /// Exhausted movement cards the player restores by hand.
        #[serde(default)]
        movement_count: u32,
    },
    /// Place a platform on one of the offered hexes.
    HavenPlatform {
        /// The offered hexes.
        touching: Vec<Hex>,
        /// Beat at which the placed platform was consumed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        consumed_beat: Option<usize>,
    },
    /// Repeat the current guard action set.
    GuardContinue {
        /// The guard card.
        card_id: Option<String>,
        /// Beat at which the repeat was written, once applied.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat_beat: Option<usize>,
    },
    /// A rewind anchor was recorded.
    RewindFocus {
        /// The rewind card.
        card_id: String,
        /// The anchor hex.
        anchor: Hex,
        /// Whether the focus is still live.
        active: bool,
        /// Beat at which the focus ended.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ended_beat: Option<usize>,
        /// Why the focus ended.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_reason: Option<FocusEndReason>,
    },
    /// Return to the anchor, or stay.
    RewindReturn {
        /// The rewind card.
        card_id: String,
        /// The anchor hex.
        anchor: Hex,
        /// Whether the return was already played out.
        #[serde(default)]
        applied: bool,
    },
    /// A block that will strike back next beat.
    Parry {
        /// Counter damage.
        damage: i32,
        /// Counter knockback factor.
        kbf: i32,
        /// Axial direction of the counter knockback.
        direction_index: Option<usize>,
    },
}

impl InteractionDetail {
    /// The kind of this offer.
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
            Self::RewindFocus { .. } => InteractionKind::RewindFocus,
            Self::RewindReturn { .. } => InteractionKind::RewindReturn,
            Self::Parry { .. } => InteractionKind::Parry,
        }
    }
}

// =============================================================================
// Resolutions
// =============================================================================

/// A player's answer, one shape per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionResolution {
    /// Knock the target along this axial direction.
    Throw {
        /// Axial direction index `0..6`.
        direction_index: usize,
    },
    /// Continue the combo or not.
    Combo {
        /// True to continue.
        continue_combo: bool,
    },
    /// Use the trigger card or not, with the cards paid.
    HandTrigger {
        /// True to use the card.
        used: bool,
        /// Ability cards discarded as the cost.
        #[serde(default)]
        ability_card_ids: Vec<String>,
        /// Movement cards discarded as the cost.
        #[serde(default)]
        movement_card_ids: Vec<String>,
    },
    /// The cards discarded.
    Discard {
        /// Ability cards discarded.
        ability_card_ids: Vec<String>,
        /// Movement cards discarded.
        movement_card_ids: Vec<String>,
    },
    /// Movement cards restored by the draw; empty when the deck chose.
    Draw {
        /// Exhausted movement cards returned to hand.
        #[serde(default)]
        movement_card_ids: Vec<String>,
    },
    /// The chosen platform hex.
    HavenPlatform {
        /// The chosen hex.
        target_hex: Hex,
    },
    /// Repeat the guard or not.
    GuardContinue {
        /// True to repeat.
        continue_guard: bool,
    },
    /// Focus anchors resolve themselves.
    RewindFocus,
    /// Return to the anchor or not.
    RewindReturn {
        /// True to return.
        return_to_anchor: bool,
    },
    /// Parry counters resolve themselves.
    Parry,
}

impl InteractionResolution {
    /// The kind this answer belongs to.
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
            Self::RewindFocus => InteractionKind::RewindFocus,
            Self::RewindReturn { .. } => InteractionKind::RewindReturn,
            Self::Parry => InteractionKind::Parry,
        }
    }
}

// =============================================================================
// Interaction
// =============================================================================

/// A decision point raised during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Stable id, see [`interaction_id`].
    pub id: String,
    /// Beat the decision belongs to.
    pub beat_index: usize,
    /// The deciding user.
    pub actor: String,
    /// The other party (the actor itself for self-directed offers).
    pub target: String,
    /// The user whose action caused the offer, when it differs from both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Pending or resolved.
    pub status: InteractionStatus,
    /// What was offered.
    pub detail: InteractionDetail,
    /// What was decided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<InteractionResolution>,
}

impl Interaction {
    /// Creates a pending interaction with the standard id for its kind.
    #[must_use]
    pub fn pending(beat_index: usize, actor: &str, target: &str, detail: InteractionDetail) -> Self {
        Self {
            id: interaction_id(detail.kind(), beat_index, actor, target),
            beat_index,
            actor: actor.to_string(),
            target: target.to_string(),
            source: None,
            status: InteractionStatus::Pending,
            detail,
            resolution: None,
        }
    }

    /// Creates an interaction that is resolved on creation.
    #[must_use]
    pub fn resolved(
        beat_index: usize,
        actor: &str,
        target: &str,
        detail: InteractionDetail,
        resolution: InteractionResolution,
    ) -> Self {
        let mut interaction = Self::pending(beat_index, actor, target, detail);
        interaction.status = InteractionStatus::Resolved;
        interaction.resolution = Some(resolution);
        interaction
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    /// Sets the source user.
    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// The kind of this interaction.
    #[must_use]
    pub fn kind(&self) -> InteractionKind {
        self.detail.kind()
    }

    /// Returns true while no decision has been recorded.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == InteractionStatus::Pending
    }

    /// Records a decision.
    ///
    /// # Errors
    ///
    /// - [`InteractionError::AlreadyResolved`] if a decision exists
    /// - [`InteractionError::PayloadMismatch`] if the answer is for another kind
    pub fn resolve(&mut self, resolution: InteractionResolution) -> Result<(), InteractionError> {
        if !self.is_pending() {
            return Err(InteractionError::AlreadyResolved { id: self.id.clone() });
        }
        if resolution.kind() != self.kind() {
            return Err(InteractionError::PayloadMismatch {
                id: self.id.clone(),
                expected: self.kind(),
            });
        }
        self.status = InteractionStatus::Resolved;
        self.resolution = Some(resolution);
        Ok(())
    }

    /// Puts a self-resolved draw back in front of the player to pick the
    /// `count` movement cards it restores.
    pub(crate) fn require_movement_selection(&mut self, count: u32) {
        let self_resolved = matches!(
            &self.resolution,
            Some(InteractionResolution::Draw { movement_card_ids }) if movement_card_ids.is_empty()
        );
        if !self_resolved {
            return;
        }
        if let InteractionDetail::Draw { movement_count, .. } = &mut self.detail {
            *movement_count = count;
            self.status = InteractionStatus::Pending;
            self.resolution = None;
        }
    }

    /// The chosen throw direction, if resolved with one in range.
    #[must_use]
    pub fn throw_direction(&self) -> Option<usize> {
        match self.resolution {
            Some(InteractionResolution::Throw { direction_index }) if direction_index < 6 => Some(direction_index),
            _ => None,
        }
    }

    /// The combo decision.
    #[must_use]
    pub fn combo_continues(&self) -> Option<bool> {
        match self.resolution {
            Some(InteractionResolution::Combo { continue_combo }) => Some(continue_combo),
            _ => None,
        }
    }

    /// True if a hand trigger was resolved as used.
    #[must_use]
    pub fn trigger_used(&self) -> bool {
        matches!(self.resolution, Some(InteractionResolution::HandTrigger { used: true, .. }))
    }

    /// The guard decision.
    #[must_use]
    pub fn guard_continues(&self) -> Option<bool> {
        match self.resolution {
            Some(InteractionResolution::GuardContinue { continue_guard }) => Some(continue_guard),
            _ => None,
        }
    }

    /// The rewind-return decision.
    #[must_use]
    pub fn returns_to_anchor(&self) -> Option<bool> {
        match self.resolution {
            Some(InteractionResolution::RewindReturn { return_to_anchor }) => Some(return_to_anchor),
            _ => None,
        }
    }

    /// The chosen platform hex.
    #[must_use]
    pub fn haven_target(&self) -> Option<Hex> {
        match self.resolution {
            Some(InteractionResolution::HavenPlatform { target_hex }) => Some(target_hex),
            _ => None,
        }
    }

    /// The hand-trigger card id, if this is a hand trigger.
    #[must_use]
    pub fn trigger_card_id(&self) -> Option<&str> {
        match &self.detail {
            InteractionDetail::HandTrigger { card_id, .. } => Some(card_id),
            _ => None,
        }
    }
}

// =============================================================================
// Ids
// =============================================================================

/// Builds the id `"{kind}:{beat}:{actor}:{target}"`.
///
/// # Example
///
/// ```
/// use hexclash_core::interaction::{interaction_id, InteractionKind};
///
/// assert_eq!(interaction_id(InteractionKind::Throw, 3, "alice", "bob"), "throw:3:alice:bob");
/// ```
#[must_use]
pub fn interaction_id(kind: InteractionKind, beat_index: usize, actor: &str, target: &str) -> String {
    format!("{}:{beat_index}:{actor}:{target}", kind.as_str())
}

/// Builds a hand-trigger id. The last part is the source user when there is
/// one, otherwise the target.
#[must_use]
pub fn hand_trigger_id(card_id: &str, beat_index: usize, actor: &str, other: &str) -> String {
    format!("hand-trigger:{card_id}:{beat_index}:{actor}:{other}")
}

/// Key that deduplicates hand-trigger offers: one per card, beat, and actor.
#[must_use]
pub fn hand_trigger_key(card_id: &str, beat_index: usize, actor: &str) -> String {
    format!("{card_id}:{beat_index}:{actor}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throw() -> Interaction {
        Interaction::pending(2, "alice", "bob", InteractionDetail::Throw { damage: 4, kbf: 2 })
    }

    mod resolve {
        use super::*;

        #[test]
        fn records_first_resolution() {
            let mut interaction = throw();
            interaction
                .resolve(InteractionResolution::Throw { direction_index: 2 })
                .unwrap();
            assert_eq!(interaction.status, InteractionStatus::Resolved);
            assert_eq!(interaction.throw_direction(), Some(2));
        }

        #[test]
        fn second_resolution_is_rejected() {
            let mut interaction = throw();
            interaction
                .resolve(InteractionResolution::Throw { direction_index: 2 })
                .unwrap();
            let err = interaction
                .resolve(InteractionResolution::Throw { direction_index: 5 })
                .unwrap_err();
            assert_eq!(err, InteractionError::AlreadyResolved { id: interaction.id.clone() });
            assert_eq!(interaction.throw_direction(), Some(2));
        }

        #[test]
        fn wrong_payload_is_rejected() {
            let mut interaction = throw();
            let err = interaction
                .resolve(InteractionResolution::Combo { continue_combo: true })
                .unwrap_err();
            assert!(matches!(err, InteractionError::PayloadMismatch { expected: InteractionKind::Throw, .. }));
            assert!(interaction.is_pending());
        }
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(throw().id, "throw:2:alice:bob");
        assert_eq!(hand_trigger_id("iron-will", 4, "bob", "alice"), "hand-trigger:iron-will:4:bob:alice");
        assert_eq!(hand_trigger_key("iron-will", 4, "bob"), "iron-will:4:bob");
    }

    #[test]
    fn created_resolved_has_status() {
        let draw = Interaction::resolved(
            1,
            "bob",
            "bob",
            InteractionDetail::Draw {
                count: 2,
                movement_count: 0,
            },
            InteractionResolution::Draw {
                movement_card_ids: Vec::new(),
            },
        );
        assert_eq!(draw.id, "draw:1:bob:bob");
        assert!(!draw.is_pending());
    }

    #[test]
    fn serializes_with_type_tags() {
        let json = serde_json::to_value(throw()).unwrap();
        assert_eq!(json["detail"]["type"], "throw");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["beatIndex"], 2);
    }
}
