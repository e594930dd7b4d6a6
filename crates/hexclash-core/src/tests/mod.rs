//! Cross-module tests of the resolution pipeline.
//!
//! - `integration.rs`: hits, blocks, throws, parries, arrows, and fire
//!   through a full resolution pass
//! - `card_simulations.rs`: every catalog pairing built and resolved
//! - `determinism.rs`: seeded random matches resolve identically
//! - `properties.rs`: property tests over geometry and the gate
//! - `helpers.rs`: engine and scenario setup

mod determinism;
pub(crate) mod helpers;
mod integration;
