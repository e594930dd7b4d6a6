//! Test helper functions for setting up matches and reading results.
//!
//! The standard duel puts Alice at (-1, 0) facing 180 and Bob at (1, 0)
//! facing 0. Facing 180 moves forward along +q, so the two face each other
//! across the centre hex.

use crate::action::ActionEntry;
use crate::engine::Engine;
use crate::hex::Hex;
use crate::resolver::{ResolveInput, Resolution};
use crate::roster::{Character, Roster};
use crate::timeline::{BeatEntry, Timeline};

// =============================================================================
// Engine
// =============================================================================

/// The standard engine.
pub fn fixture() -> Engine {
    Engine::standard().expect("embedded catalog loads")
}

/// Installs a test subscriber once. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// =============================================================================
// Scenario Setup
// =============================================================================

/// Alice and Bob facing each other, two hexes apart.
pub fn duel_roster() -> Roster {
    roster_at(Hex::new(-1, 0), Hex::new(1, 0))
}

/// Alice at `alice` facing +q, Bob at `bob` facing -q.
pub fn roster_at(alice: Hex, bob: Hex) -> Roster {
    Roster::new(vec![Character::new("alice", alice, 180), Character::new("bob", bob, 0)])
}

/// Seeds a one-beat timeline and writes each non-empty list as an action set.
pub fn input_for(roster: Roster, alice: &[ActionEntry], bob: &[ActionEntry]) -> ResolveInput {
    let board = crate::hex::Board::standard();
    let mut timeline = Timeline::seed(&roster, &board, 1);
    if !alice.is_empty() {
        timeline.apply_action_set(&roster, &board, "alice", alice);
    }
    if !bob.is_empty() {
        timeline.apply_action_set(&roster, &board, "bob", bob);
    }
    ResolveInput::new(roster, timeline)
}

/// [`input_for`] on the standard duel.
pub fn two_player_input(alice: &[ActionEntry], bob: &[ActionEntry]) -> ResolveInput {
    input_for(duel_roster(), alice, bob)
}

/// Builds a card pair or panics.
pub fn build(engine: &Engine, active: &str, passive: &str, rotation: &str) -> Vec<ActionEntry> {
    engine
        .build(active, passive, rotation)
        .unwrap_or_else(|error| panic!("{active}/{passive}/{rotation}: {error}"))
}

// =============================================================================
// Inspection
// =============================================================================

/// A character's entry at a beat, or panics.
pub fn beat<'a>(resolution: &'a Resolution, index: usize, user_id: &str) -> &'a BeatEntry {
    resolution
        .timeline
        .entry(index, user_id)
        .unwrap_or_else(|| panic!("no entry for {user_id} at beat {index}"))
}

/// A character's location at a beat.
pub fn location(resolution: &Resolution, index: usize, user_id: &str) -> Hex {
    beat(resolution, index, user_id).location
}

/// A character's accumulated damage at a beat.
pub fn damage(resolution: &Resolution, index: usize, user_id: &str) -> i32 {
    beat(resolution, index, user_id).total_damage
}
