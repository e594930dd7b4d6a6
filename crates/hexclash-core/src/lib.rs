//! # Hexclash Core
//!
//! Beat resolution engine for Hexclash, a two-player card duel on a hex
//! board.
//!
//! Each round a player picks a movement card, an ability card, and a
//! rotation. The pair expands into an action set: one action per beat. All
//! characters' actions for a beat resolve together, in priority order, and
//! resolution may stop at an interaction that needs a player's decision.
//!
//! ## Architecture
//!
//! - **Action lists** ([`action`]): card pair + rotation into beat entries,
//!   rewritten by card-text rules
//! - **Timeline** ([`timeline`]): beats of per-character entries with the
//!   resolved board state written back
//! - **Resolver** ([`resolver`]): replays the timeline beat by beat
//! - **Interactions** ([`interaction`]): decision points and the gate that
//!   validates answers
//! - **Collaborators** ([`deck`], [`session`], [`outcome`]): hands, match
//!   intake, and match end
//!
//! ## Usage
//!
//! ```
//! use hexclash_core::engine::Engine;
//! use hexclash_core::hex::Hex;
//! use hexclash_core::resolver::ResolveInput;
//! use hexclash_core::roster::{Character, Roster};
//! use hexclash_core::timeline::Timeline;
//!
//! let engine = Engine::standard().unwrap();
//! let roster = Roster::new(vec![Character::new("alice", Hex::new(0, 0), 180)]);
//! let board = engine.config().board();
//! let mut timeline = Timeline::seed(&roster, &board, 1);
//! let list = engine.build("step", "fumikomi", "0").unwrap();
//! timeline.apply_action_set(&roster, &board, "alice", &list);
//!
//! let resolution = engine.resolve(ResolveInput::new(roster, timeline));
//! let beat = resolution.timeline.entry(0, "alice").unwrap();
//! assert_eq!(beat.location, Hex::new(1, 0));
//! assert!(beat.calculated);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod card;
pub mod config;
pub mod deck;
pub mod engine;
pub mod error;
pub mod hex;
pub mod interaction;
pub mod outcome;
pub mod resolver;
pub mod roster;
pub mod session;
pub mod timeline;
pub mod token;

pub use engine::Engine;
pub use error::{BuildError, CatalogError, ConfigError, InteractionError, MatchError, ValidationError};
pub use session::Match;

#[cfg(test)]
mod tests;
