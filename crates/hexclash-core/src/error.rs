//! Error types for every fallible boundary of the engine.
//!
//! Errors are values. Nothing in the resolver panics on bad input: a corrupt
//! beat is logged and treated as a no-op, while submission-time problems are
//! surfaced through the enums below.

use serde::Serialize;
use thiserror::Error;

use crate::card::CardType;
use crate::hex::Hex;
use crate::interaction::InteractionKind;

// =============================================================================
// Submission Validation
// =============================================================================

/// Why an active/passive pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairProblem {
    /// Both ids name the same card.
    SameCard,
    /// Both cards are movement cards, or both are ability cards.
    SameType,
}

/// A rejected action submission.
///
/// Each variant carries a stable machine code (see [`ValidationError::code`])
/// which is also the serde tag.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum ValidationError {
    /// The active or passive card id is missing.
    #[error("active and passive card ids are required")]
    MissingCard,

    /// The pair cannot form an action set.
    #[error("invalid card pair: {reason:?}")]
    InvalidCardPair {
        /// What is wrong with the pair.
        reason: PairProblem,
    },

    /// A submitted id is not in the catalog.
    #[error("unknown card id '{id}'")]
    UnknownCard {
        /// The unknown id.
        id: String,
    },

    /// The movement card is not in the deck, or the ability card not in hand.
    #[error("{card_type} card '{id}' is not available")]
    CardUnavailable {
        /// The unavailable id.
        id: String,
        /// Which family was checked.
        card_type: CardType,
    },

    /// The movement card was used since the last refresh.
    #[error("movement card '{id}' is exhausted")]
    CardExhausted {
        /// The exhausted id.
        id: String,
    },

    /// No rotation was selected.
    #[error("a rotation selection is required")]
    RotationMissing,

    /// The rotation is unknown or outside the active card's restriction.
    #[error("rotation '{rotation}' is not allowed for '{card_id}'")]
    RotationInvalid {
        /// The submitted label.
        rotation: String,
        /// The active card.
        card_id: String,
    },

    /// The active card has an empty action template.
    #[error("active card '{card_id}' has no actions")]
    NoActionList {
        /// The active card.
        card_id: String,
    },

    /// The active card has no refresh step.
    #[error("active card '{card_id}' has no refresh step")]
    NoRefresh {
        /// The active card.
        card_id: String,
    },
}

impl ValidationError {
    /// The stable machine code for this failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCard => "missing-card",
            Self::InvalidCardPair { .. } => "invalid-card-pair",
            Self::UnknownCard { .. } => "unknown-card",
            Self::CardUnavailable { .. } => "card-unavailable",
            Self::CardExhausted { .. } => "card-exhausted",
            Self::RotationMissing => "rotation-missing",
            Self::RotationInvalid { .. } => "rotation-invalid",
            Self::NoActionList { .. } => "no-action-list",
            Self::NoRefresh { .. } => "no-refresh",
        }
    }
}

// =============================================================================
// List Building
// =============================================================================

/// Failure to build an action list from a card pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A card id did not resolve in the catalog.
    #[error("unknown card id '{id}'")]
    UnknownCard {
        /// The unknown id.
        id: String,
    },

    /// Active and passive cards share a family.
    #[error("active and passive cards are both {card_type} cards")]
    SameCardType {
        /// The shared family.
        card_type: CardType,
    },
}

// =============================================================================
// Interaction Intake
// =============================================================================

/// A rejected interaction resolution. No state changes when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    /// No interaction has this id.
    #[error("interaction '{id}' not found")]
    NotFound {
        /// The requested id.
        id: String,
    },

    /// The interaction already carries a resolution.
    #[error("interaction '{id}' is already resolved")]
    AlreadyResolved {
        /// The requested id.
        id: String,
    },

    /// The submitter is neither the actor nor the addressed target.
    #[error("interaction '{id}' does not belong to '{user}'")]
    NotOwner {
        /// The requested id.
        id: String,
        /// The submitter.
        user: String,
    },

    /// The resolution payload is for a different interaction kind.
    #[error("interaction '{id}' expects a {expected:?} resolution")]
    PayloadMismatch {
        /// The requested id.
        id: String,
        /// The kind the interaction has.
        expected: InteractionKind,
    },

    /// A discard or draw did not supply exactly the required cards.
    #[error("interaction '{id}' requires {expected} cards, got {actual}")]
    CountMismatch {
        /// The requested id.
        id: String,
        /// Required count.
        expected: usize,
        /// Supplied count.
        actual: usize,
    },

    /// A throw direction outside `0..6`.
    #[error("direction index {index} is out of range")]
    DirectionOutOfRange {
        /// The supplied index.
        index: i64,
    },

    /// A platform target that was not among the offered hexes.
    #[error("hex {hex} was not offered by interaction '{id}'")]
    HexNotOffered {
        /// The requested id.
        id: String,
        /// The supplied hex.
        hex: Hex,
    },

    /// A restored movement card that is not exhausted in the deck.
    #[error("card '{card_id}' cannot be restored by interaction '{id}'")]
    CardNotOffered {
        /// The requested id.
        id: String,
        /// The supplied card.
        card_id: String,
    },
}

// =============================================================================
// Loading
// =============================================================================

/// Failure to load a card catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The document is not valid catalog JSON.
    #[error("failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// Two cards share an id.
    #[error("duplicate card id '{id}'")]
    DuplicateCard {
        /// The repeated id.
        id: String,
    },

    /// A rotation restriction is neither `*` nor `min-max`.
    #[error("invalid rotation restriction '{restriction}'")]
    InvalidRotation {
        /// The raw restriction.
        restriction: String,
    },
}

/// Failure to load an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid configuration JSON.
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Match
// =============================================================================

/// A rejected call on a [`crate::session::Match`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// No character or deck answers to this user.
    #[error("unknown user '{user}'")]
    UnknownUser {
        /// The user key.
        user: String,
    },

    /// The action set failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The interaction answer was rejected.
    #[error(transparent)]
    Interaction(#[from] InteractionError),

    /// A decision is outstanding; no new action sets are accepted.
    #[error("interaction '{id}' is still pending")]
    DecisionPending {
        /// The oldest pending interaction.
        id: String,
    },

    /// A hand trigger was answered before the one ranked ahead of it.
    #[error("hand trigger '{id}' waits for '{active}'")]
    TriggerOutOfTurn {
        /// The answered trigger.
        id: String,
        /// The trigger that is up.
        active: String,
    },
}
