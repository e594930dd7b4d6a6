//! The engine: catalog, card-text rules, and configuration in one place.
//!
//! An [`Engine`] is immutable once built. Every match borrows it, and
//! [`Engine::resolve_batch`] resolves independent matches in parallel.
//!
//! # Determinism
//!
//! Parallelism is only across matches. Each resolution is sequential, and the
//! batch returns results in input order, so a batch gives exactly the
//! resolutions of resolving each input alone.
//!
//! # Example
//!
//! ```
//! use hexclash_core::engine::Engine;
//!
//! let engine = Engine::standard().unwrap();
//! let list = engine.build("step", "fumikomi", "0").unwrap();
//! assert_eq!(list.len(), 2);
//! ```

use rayon::prelude::*;

use crate::action::effects::EffectRegistry;
use crate::action::{build_action_list, ActionEntry};
use crate::card::CardCatalog;
use crate::config::EngineConfig;
use crate::error::{BuildError, CatalogError};
use crate::resolver::{Resolution, ResolveInput, Resolver, TimelineResolver};

/// Owns everything a resolution pass reads besides the match itself.
#[derive(Debug)]
pub struct Engine {
    catalog: CardCatalog,
    effects: EffectRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine from its parts.
    #[must_use]
    pub fn new(catalog: CardCatalog, effects: EffectRegistry, config: EngineConfig) -> Self {
        Self {
            catalog,
            effects,
            config,
        }
    }

    /// The reference catalog, every standard card rule, default config.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the embedded catalog fails to load.
    pub fn standard() -> Result<Self, CatalogError> {
        Ok(Self::new(CardCatalog::standard()?, EffectRegistry::standard(), EngineConfig::default()))
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The card catalog.
    #[must_use]
    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    /// The card-text rules.
    #[must_use]
    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A resolver borrowing this engine.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.catalog, &self.effects, &self.config)
    }

    /// Builds the action set for a card pair and rotation.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for an unknown id or two cards of one type.
    pub fn build(&self, active_id: &str, passive_id: &str, rotation: &str) -> Result<Vec<ActionEntry>, BuildError> {
        build_action_list(&self.catalog, &self.effects, active_id, passive_id, rotation)
    }

    /// Runs one resolution pass.
    #[must_use]
    pub fn resolve(&self, input: ResolveInput) -> Resolution {
        self.resolver().resolve(input)
    }

    /// Resolves independent matches in parallel.
    ///
    /// Results come back in input order.
    #[must_use]
    pub fn resolve_batch(&self, inputs: Vec<ResolveInput>) -> Vec<Resolution> {
        let resolver = self.resolver();
        let count = inputs.len();
        let resolutions: Vec<Resolution> = inputs.into_par_iter().map(|input| resolver.resolve(input)).collect();
        tracing::debug!(matches = count, "batch resolved");
        resolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::two_player_input;

    #[test]
    fn standard_engine_loads() {
        let engine = Engine::standard().unwrap();
        assert!(!engine.catalog().is_empty());
        assert_eq!(engine.config().knockback_divisor, 10);
    }

    #[test]
    fn build_rejects_unknown_cards() {
        let engine = Engine::standard().unwrap();
        assert!(matches!(
            engine.build("no-such-card", "fumikomi", "0"),
            Err(BuildError::UnknownCard { .. })
        ));
    }

    #[test]
    fn batch_matches_sequential_resolution() {
        let engine = Engine::standard().unwrap();
        let step = engine.build("step", "fumikomi", "0").unwrap();
        let inputs: Vec<ResolveInput> = (0..8)
            .map(|i| {
                if i % 2 == 0 {
                    two_player_input(&step, &[])
                } else {
                    two_player_input(&[], &step)
                }
            })
            .collect();
        let sequential: Vec<Resolution> = inputs.iter().cloned().map(|input| engine.resolve(input)).collect();
        let parallel = engine.resolve_batch(inputs);
        assert_eq!(sequential, parallel);
    }
}
