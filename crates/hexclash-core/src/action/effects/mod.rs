//! Card-text effect pipeline.
//!
//! Card text rewrites the raw action list built from a card template. Rules
//! are grouped in four categories, applied in a fixed order:
//!
//! 1. **Active movement**: text of the active card when it is a movement card
//! 2. **Active ability**: text of the active card when it is an ability card
//! 3. **Passive movement**: passive text of a movement card
//! 4. **Passive ability**: passive text of an ability card
//!
//! Each category is a lookup keyed by card id; a card without a rule in a
//! category is a no-op for it.
//!
//! # Invariants
//!
//! - Rules find their targets by scanning labels, never by fixed index, so
//!   they stay correct after earlier rules changed the list length.
//! - A rule that changes nothing returns `None`, and [`EffectRegistry::apply`]
//!   hands back the borrowed input. `Cow::Borrowed` therefore means "no card
//!   text applied".
//!
//! # Example
//!
//! ```
//! use std::borrow::Cow;
//! use hexclash_core::action::effects::{EffectContext, EffectRegistry};
//! use hexclash_core::action::ActionEntry;
//! use hexclash_core::card::CardCatalog;
//!
//! let catalog = CardCatalog::standard().unwrap();
//! let registry = EffectRegistry::standard();
//! let ctx = EffectContext {
//!     active: catalog.get("step").unwrap(),
//!     passive: catalog.get("fumikomi").unwrap(),
//!     rotation: "0",
//! };
//! let list = vec![ActionEntry::new("m"), ActionEntry::new("E")];
//! assert!(matches!(registry.apply(&list, &ctx), Cow::Borrowed(_)));
//! ```

mod active_ability;
mod active_movement;
mod passive_ability;
mod passive_movement;

pub use active_ability::{AerialStrikeActive, CounterAttackActive, SmokeBombActive, WhirlwindActive};
pub use active_movement::NinjaRollActive;
pub use passive_ability::{
    ChasePassive, CounterAttackPassive, CrossSlashPassive, FlyingKneePassive, GuardPassive, JabPassive,
    PushKickPassive, SmashAttackPassive, SmokeBombPassive, WhirlwindPassive,
};
pub use passive_movement::FlechePassive;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::ActionEntry;
use crate::card::{Card, CardType};

/// The four rule categories, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectCategory {
    /// Active text of a movement card.
    ActiveMovement,
    /// Active text of an ability card.
    ActiveAbility,
    /// Passive text of a movement card.
    PassiveMovement,
    /// Passive text of an ability card.
    PassiveAbility,
}

impl EffectCategory {
    /// Every category in application order.
    pub const ORDER: [Self; 4] = [
        Self::ActiveMovement,
        Self::ActiveAbility,
        Self::PassiveMovement,
        Self::PassiveAbility,
    ];

    /// The card this category reads, if its type matches.
    fn subject<'a>(self, ctx: &EffectContext<'a>) -> Option<&'a Card> {
        let (card, card_type) = match self {
            Self::ActiveMovement => (ctx.active, CardType::Movement),
            Self::ActiveAbility => (ctx.active, CardType::Ability),
            Self::PassiveMovement => (ctx.passive, CardType::Movement),
            Self::PassiveAbility => (ctx.passive, CardType::Ability),
        };
        (card.card_type == card_type).then_some(card)
    }
}

/// Inputs shared by every rule.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    /// The active card.
    pub active: &'a Card,
    /// The passive card.
    pub passive: &'a Card,
    /// The selected rotation label.
    pub rotation: &'a str,
}

/// A single card-text rule.
///
/// Rules are pure: they read the list and context and either return a
/// rewritten list or `None` for "unchanged".
pub trait CardEffect: Send + Sync {
    /// The card id this rule belongs to.
    fn card_id(&self) -> &'static str;

    /// Which category the rule runs in.
    fn category(&self) -> EffectCategory;

    /// Applies the rule.
    ///
    /// # Arguments
    ///
    /// * `list` - The action list produced by earlier rules
    /// * `ctx` - The card pair and rotation being built
    ///
    /// # Returns
    ///
    /// The rewritten list, or `None` if the rule changed nothing.
    fn apply(&self, list: &[ActionEntry], ctx: &EffectContext<'_>) -> Option<Vec<ActionEntry>>;
}

/// Registry of card-text rules by category and card id.
#[derive(Default)]
pub struct EffectRegistry {
    rules: BTreeMap<EffectCategory, HashMap<&'static str, Arc<dyn CardEffect>>>,
}

impl EffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Registers a rule under its own category and card id, replacing any
    /// earlier rule for the same pair.
    pub fn register(&mut self, effect: Arc<dyn CardEffect>) {
        self.rules
            .entry(effect.category())
            .or_default()
            .insert(effect.card_id(), effect);
    }

    /// Looks up the rule for a category and card id.
    #[must_use]
    pub fn effect_for(&self, category: EffectCategory, card_id: &str) -> Option<&Arc<dyn CardEffect>> {
        self.rules.get(&category).and_then(|rules| rules.get(card_id))
    }

    /// Total number of registered rules.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.rules.values().map(HashMap::len).sum()
    }

    /// Returns true if no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registration_count() == 0
    }

    /// Runs all four categories over `list`.
    ///
    /// Returns `Cow::Borrowed(list)` when no rule changed anything.
    #[must_use]
    pub fn apply<'l>(&self, list: &'l [ActionEntry], ctx: &EffectContext<'_>) -> Cow<'l, [ActionEntry]> {
        let mut current = Cow::Borrowed(list);
        for category in EffectCategory::ORDER {
            let Some(card) = category.subject(ctx) else {
                continue;
            };
            let Some(effect) = self.effect_for(category, &card.id) else {
                continue;
            };
            if let Some(next) = effect.apply(&current, ctx) {
                tracing::debug!(card = %card.id, ?category, "card text applied");
                current = Cow::Owned(next);
            }
        }
        current
    }

    /// The standard rule set for the reference catalog.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(NinjaRollActive));

        registry.register(Arc::new(CounterAttackActive));
        registry.register(Arc::new(AerialStrikeActive));
        registry.register(Arc::new(SmokeBombActive));
        registry.register(Arc::new(WhirlwindActive));

        registry.register(Arc::new(FlechePassive));

        registry.register(Arc::new(ChasePassive));
        registry.register(Arc::new(CounterAttackPassive));
        registry.register(Arc::new(CrossSlashPassive));
        registry.register(Arc::new(FlyingKneePassive));
        registry.register(Arc::new(GuardPassive));
        registry.register(Arc::new(JabPassive));
        registry.register(Arc::new(PushKickPassive));
        registry.register(Arc::new(SmashAttackPassive));
        registry.register(Arc::new(SmokeBombPassive));
        registry.register(Arc::new(WhirlwindPassive));

        registry
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("category_count", &self.rules.len())
            .field("registration_count", &self.registration_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use crate::action::{ActionEntry, RotationSource};
    use crate::card::{Card, CardType, RotationRestriction};

    /// Builds a card with the given id, type, and template.
    pub fn card(id: &str, card_type: CardType, actions: &[&str]) -> Card {
        Card {
            id: id.to_string(),
            name: id.to_string(),
            card_type,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            rotations: RotationRestriction::Any,
            priority: 20,
            damage: 4,
            kbf: 2,
            active_text: None,
            passive_text: None,
        }
    }

    /// Builds a raw list the way the builder does before card text runs.
    pub fn raw_list(active: &Card, passive: &Card, rotation: &str) -> Vec<ActionEntry> {
        active
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let (rotation, source) = if index == 0 {
                    (rotation, Some(RotationSource::Selected))
                } else {
                    ("", None)
                };
                ActionEntry::new(action.as_str())
                    .with_rotation(rotation, source)
                    .with_attack(active.priority, active.damage, active.kbf)
                    .with_cards(&active.id, &passive.id)
            })
            .collect()
    }

    /// The labels of a list.
    pub fn labels(list: &[ActionEntry]) -> Vec<&str> {
        list.iter().map(|entry| entry.action.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{card, raw_list};
    use super::*;

    #[test]
    fn standard_registry_has_every_rule() {
        let registry = EffectRegistry::standard();
        assert_eq!(registry.registration_count(), 16);
        assert!(registry
            .effect_for(EffectCategory::PassiveAbility, "smoke-bomb")
            .is_some());
        assert!(registry
            .effect_for(EffectCategory::ActiveAbility, "smoke-bomb")
            .is_some());
        assert!(registry.effect_for(EffectCategory::PassiveMovement, "step").is_none());
    }

    #[test]
    fn unknown_cards_preserve_identity() {
        let registry = EffectRegistry::standard();
        let active = card("step", CardType::Movement, &["m", "E"]);
        let passive = card("fumikomi", CardType::Ability, &["a", "E"]);
        let list = raw_list(&active, &passive, "0");
        let ctx = EffectContext {
            active: &active,
            passive: &passive,
            rotation: "0",
        };
        assert!(matches!(registry.apply(&list, &ctx), Cow::Borrowed(_)));
    }

    #[test]
    fn categories_require_matching_card_type() {
        // jab as an *active* card must not trigger its passive rule
        let registry = EffectRegistry::standard();
        let active = card("jab", CardType::Ability, &["[a]", "E"]);
        let passive = card("step", CardType::Movement, &["m", "E"]);
        let list = raw_list(&active, &passive, "0");
        let ctx = EffectContext {
            active: &active,
            passive: &passive,
            rotation: "0",
        };
        let result = registry.apply(&list, &ctx);
        assert_eq!(result[0].priority, 20);
    }

    #[test]
    fn passive_rule_changes_list() {
        let registry = EffectRegistry::standard();
        let active = card("step", CardType::Movement, &["m", "E"]);
        let passive = card("jab", CardType::Ability, &["[a]", "E"]);
        let list = raw_list(&active, &passive, "0");
        let ctx = EffectContext {
            active: &active,
            passive: &passive,
            rotation: "0",
        };
        let result = registry.apply(&list, &ctx);
        assert!(matches!(result, Cow::Owned(_)));
        assert!(result.iter().all(|entry| entry.priority == 50));
    }

    #[test]
    fn empty_registry_is_empty() {
        let registry = EffectRegistry::new();
        assert!(registry.is_empty());
        assert!(format!("{registry:?}").contains("registration_count"));
    }
}
