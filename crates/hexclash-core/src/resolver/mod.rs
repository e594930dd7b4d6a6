//! Beat resolution: replays a match timeline and writes resolved board state.
//!
//! A resolution pass walks the timeline from beat 0. Beats of the calculated
//! prefix are replayed to rebuild character state, then new beats are
//! resolved until one is not ready (someone is still open) or an
//! interaction needs a player decision.
//!
//! # Architecture
//!
//! Each beat runs in phases:
//! 1. Rewind returns and rotations are applied
//! 2. Scheduled parry counters strike
//! 3. Actors act in priority order (ties by roster order), each action token
//!    resolved against the in-progress occupancy and block maps
//! 4. Hand-trigger effects, arrows, fire, and queued draws/discards settle
//!
//! A mid-beat rewrite of an entry in the current beat (stun window, card
//! swap, forced end) replays the beat from a snapshot so that earlier actors
//! see the rewritten entry.
//!
//! # Invariants
//!
//! - A beat is only marked calculated when no interaction at or before it is
//!   pending
//! - Resolution is a pure function of its [`ResolveInput`]: no clock, no
//!   randomness, deterministic iteration order
//! - Every actor writes only its own timeline slots, except for hits, which
//!   write the target's stun window
//!
//! # Available Resolvers
//!
//! - [`Resolver`]: the standard engine over a card catalog and rule registry

mod beat;
mod combat;
mod modifiers;
mod path;
mod special;
mod state;
mod tokens;

pub use path::knockback_distance;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::action::effects::EffectRegistry;
use crate::card::CardCatalog;
use crate::config::EngineConfig;
use crate::deck::DeckState;
use crate::hex::{Board, Hex};
use crate::interaction::Interaction;
use crate::roster::Roster;
use crate::timeline::Timeline;
use crate::token::Token;

// =============================================================================
// Input
// =============================================================================

/// What a player can currently be offered, as reported by the match
/// collaborator that owns the decks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Availability {
    /// The player holds a card with a combo step.
    pub combo: bool,
    /// Hand-trigger cards held.
    pub hand_triggers: BTreeSet<String>,
    /// The player can pay for a guard repeat.
    pub guard_continue: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            combo: false,
            hand_triggers: BTreeSet::new(),
            guard_continue: true,
        }
    }
}

impl Availability {
    /// Reads availability off a deck.
    #[must_use]
    pub fn from_deck(deck: &DeckState, catalog: &CardCatalog) -> Self {
        Self {
            combo: deck.has_combo_card(catalog),
            hand_triggers: deck.hand_trigger_cards(),
            guard_continue: deck.can_continue_guard(),
        }
    }

    /// Returns true if the player holds `card_id` as a hand trigger.
    #[must_use]
    pub fn holds_trigger(&self, card_id: &str) -> bool {
        self.hand_triggers.contains(card_id)
    }
}

/// Everything one resolution pass reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveInput {
    /// Characters in registration order.
    pub roster: Roster,
    /// The match timeline.
    pub timeline: Timeline,
    /// Interactions raised by earlier passes.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Tokens at the start of the match.
    #[serde(default)]
    pub tokens: Vec<Token>,
    /// Per-user availability. Missing users get the default.
    #[serde(default)]
    pub availability: BTreeMap<String, Availability>,
}

impl ResolveInput {
    /// Creates an input without interactions, tokens, or availability.
    #[must_use]
    pub fn new(roster: Roster, timeline: Timeline) -> Self {
        Self {
            roster,
            timeline,
            ..Self::default()
        }
    }

    /// Sets the interactions.
    #[must_use]
    pub fn with_interactions(mut self, interactions: Vec<Interaction>) -> Self {
        self.interactions = interactions;
        self
    }

    /// Sets the initial tokens.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<Token>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets one user's availability.
    #[must_use]
    pub fn with_availability(mut self, user_id: &str, availability: Availability) -> Self {
        self.availability.insert(user_id.to_string(), availability);
        self
    }
}

// =============================================================================
// Output
// =============================================================================

/// What one actor did in one beat, for playback and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorStep {
    /// The beat.
    pub beat_index: usize,
    /// The acting character, or the owner of an acting token.
    pub user_id: String,
    /// The acting token, for token steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// The action label.
    pub action: String,
    /// Where the actor started.
    pub origin: Hex,
    /// Where the actor ended.
    pub destination: Hex,
    /// Every hex the actor entered.
    pub path: Vec<Hex>,
    /// Hexes attacked.
    pub attack_hexes: Vec<Hex>,
    /// Characters hit.
    pub targets: Vec<String>,
    /// Characters whose block stopped an attack.
    pub blocked_by: Vec<String>,
}

impl ActorStep {
    pub(crate) fn new(beat_index: usize, user_id: &str, action: &str, origin: Hex) -> Self {
        Self {
            beat_index,
            user_id: user_id.to_string(),
            token_id: None,
            action: action.to_string(),
            origin,
            destination: origin,
            path: Vec::new(),
            attack_hexes: Vec::new(),
            targets: Vec::new(),
            blocked_by: Vec::new(),
        }
    }
}

/// The result of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// The timeline with resolved state written back.
    pub timeline: Timeline,
    /// Tokens after the last calculated beat.
    pub tokens: Vec<Token>,
    /// Every interaction, old and new.
    pub interactions: Vec<Interaction>,
    /// Last beat marked calculated in this pass.
    pub last_calculated: Option<usize>,
    /// Beat at which resolution stopped for a decision.
    pub halt_index: Option<usize>,
    /// Actor steps of every calculated beat.
    pub steps: Vec<ActorStep>,
}

impl Resolution {
    /// Interactions waiting for a decision.
    pub fn pending(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter(|interaction| interaction.is_pending())
    }

    /// Returns true if nothing is waiting for a decision.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Steps of one beat.
    pub fn steps_at(&self, beat_index: usize) -> impl Iterator<Item = &ActorStep> {
        self.steps.iter().filter(move |step| step.beat_index == beat_index)
    }
}

// =============================================================================
// Resolver Trait
// =============================================================================

/// Resolves a match timeline.
///
/// A resolver owns no match state: every call receives the full timeline
/// and returns a new one, so one resolver can serve many matches, also from
/// several threads.
///
/// # Implementation Guidelines
///
/// 1. **Determinism**: The same input must give the same resolution. Iterate
///    in roster or map order, never in hash order.
///
/// 2. **Idempotence**: Resolving a resolution's own timeline and
///    interactions again must not change calculated beats.
///
/// 3. **Fail soft**: Unknown actors and unparsable tokens are logged and
///    skipped. Resolution never errors.
///
/// # Example
///
/// ```
/// use hexclash_core::resolver::{ResolveInput, Resolution, TimelineResolver};
///
/// struct Passthrough;
///
/// impl TimelineResolver for Passthrough {
///     fn resolve(&self, input: ResolveInput) -> Resolution {
///         Resolution {
///             timeline: input.timeline,
///             tokens: input.tokens,
///             interactions: input.interactions,
///             last_calculated: None,
///             halt_index: None,
///             steps: Vec::new(),
///         }
///     }
/// }
/// ```
pub trait TimelineResolver: Send + Sync {
    /// Runs one resolution pass.
    ///
    /// # Arguments
    ///
    /// * `input` - Roster, timeline, interactions, tokens, and availability
    fn resolve(&self, input: ResolveInput) -> Resolution;
}

// =============================================================================
// Standard Resolver
// =============================================================================

/// The standard engine.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    catalog: &'a CardCatalog,
    effects: &'a EffectRegistry,
    config: &'a EngineConfig,
    board: Board,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over a catalog, rule registry, and configuration.
    #[must_use]
    pub fn new(catalog: &'a CardCatalog, effects: &'a EffectRegistry, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            effects,
            config,
            board: config.board(),
        }
    }

    /// The board.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// The card catalog.
    #[must_use]
    pub fn catalog(&self) -> &CardCatalog {
        self.catalog
    }

    pub(crate) fn effects(&self) -> &EffectRegistry {
        self.effects
    }
}

impl TimelineResolver for Resolver<'_> {
    fn resolve(&self, input: ResolveInput) -> Resolution {
        let resolution = beat::Pass::new(self, input).run();
        tracing::info!(
            beats = resolution.timeline.len(),
            last_calculated = ?resolution.last_calculated,
            halt = ?resolution.halt_index,
            pending = resolution.pending().count(),
            "timeline resolved"
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_is_object_safe() {
        fn _accepts_boxed(_resolver: Box<dyn TimelineResolver>) {}
        fn _accepts_slice(_resolvers: &[Box<dyn TimelineResolver>]) {}
    }

    #[test]
    fn availability_defaults_allow_guard_only() {
        let availability = Availability::default();
        assert!(!availability.combo);
        assert!(availability.guard_continue);
        assert!(availability.hand_triggers.is_empty());
        let parsed: Availability = serde_json::from_str(r#"{ "handTriggers": ["vengeance"] }"#).unwrap();
        assert!(parsed.holds_trigger("vengeance"));
        assert!(parsed.guard_continue);
    }

    #[test]
    fn availability_reads_the_deck() {
        let catalog = CardCatalog::standard().unwrap();
        let deck = DeckState::new(
            vec!["step".into()],
            vec!["vengeance".into(), "jab".into(), "guard".into(), "spike".into()],
        );
        let availability = Availability::from_deck(&deck, &catalog);
        assert!(availability.holds_trigger("vengeance"));
        assert!(availability.guard_continue);
    }
}
