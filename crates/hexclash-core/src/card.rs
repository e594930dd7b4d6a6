//! Card definitions and the read-only card catalog.
//!
//! Cards are immutable and looked up by id. A catalog is loaded from a JSON
//! document with separate `movement` and `ability` lists:
//!
//! ```json
//! {
//!   "movement": [{ "id": "step", "actions": ["m", "E"], "rotations": "*", "priority": 30 }],
//!   "ability": [{ "id": "jab", "actions": ["[a]", "E"], "rotations": "0-1", "priority": 40, "damage": 2, "kbf": 1 }]
//! }
//! ```
//!
//! Missing ids become `"{type}-{index}"`, missing rotations mean unrestricted,
//! and missing numeric fields default to zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{normalize_label, ActionKind};
use crate::error::CatalogError;
use crate::hex::{rotation_magnitude, ROTATION_LABELS};

/// The built-in reference catalog.
const STANDARD_CATALOG_JSON: &str = include_str!("../data/cards.json");

/// Ids of active cards that always throw.
const ACTIVE_THROW_CARD_IDS: [&str; 2] = ["hip-throw", "tackle"];
/// Ids of passive cards that always grant throws.
const PASSIVE_THROW_CARD_IDS: [&str; 1] = ["leap"];
/// Cards whose throw is decided during resolution rather than at build time.
const THROW_IGNORED_CARD_IDS: [&str; 1] = ["grappling-hook"];

// =============================================================================
// Card Types
// =============================================================================

/// The two card families. Every action set pairs one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardType {
    /// Movement cards (deck-resident, exhausted on use).
    Movement,
    /// Ability cards (drawn into the hand).
    Ability,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movement => write!(f, "movement"),
            Self::Ability => write!(f, "ability"),
        }
    }
}

/// Which slot of an action set a card occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardRole {
    /// The card whose action template drives the set.
    Active,
    /// The card whose passive text modifies the set.
    Passive,
}

/// The rotations a card allows its owner to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RotationRestriction {
    /// Any rotation label.
    #[default]
    Any,
    /// Labels whose step magnitude is within `min..=max`.
    Range {
        /// Smallest allowed magnitude.
        min: u32,
        /// Largest allowed magnitude.
        max: u32,
    },
}

impl RotationRestriction {
    /// Parses `"*"` (or an empty string) and `"min-max"` restrictions.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidRotation`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Any);
        }
        let invalid = || CatalogError::InvalidRotation {
            restriction: trimmed.to_string(),
        };
        let (min, max) = trimmed.split_once('-').ok_or_else(invalid)?;
        let min = min.trim().parse().map_err(|_| invalid())?;
        let max = max.trim().parse().map_err(|_| invalid())?;
        Ok(Self::Range { min, max })
    }

    /// Returns true if the rotation label is a known label within this range.
    #[must_use]
    pub fn allows(&self, label: &str) -> bool {
        if !ROTATION_LABELS.contains(&label) {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Range { min, max } => {
                rotation_magnitude(label).is_some_and(|magnitude| (*min..=*max).contains(&magnitude))
            }
        }
    }

    /// The allowed labels in clockwise order.
    #[must_use]
    pub fn allowed_labels(&self) -> Vec<&'static str> {
        ROTATION_LABELS
            .iter()
            .copied()
            .filter(|label| self.allows(label))
            .collect()
    }
}

impl TryFrom<String> for RotationRestriction {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RotationRestriction> for String {
    fn from(value: RotationRestriction) -> Self {
        match value {
            RotationRestriction::Any => "*".to_string(),
            RotationRestriction::Range { min, max } => format!("{min}-{max}"),
        }
    }
}

/// An immutable card definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Unique card id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Card family.
    #[serde(rename = "type")]
    pub card_type: CardType,
    /// Action template, one label per beat. Bracketed labels anchor card text.
    pub actions: Vec<String>,
    /// Rotation restriction for the selected rotation.
    pub rotations: RotationRestriction,
    /// Resolution priority; higher resolves first.
    pub priority: i32,
    /// Base attack damage.
    pub damage: i32,
    /// Base knockback factor.
    pub kbf: i32,
    /// Text applied while the card is active.
    pub active_text: Option<String>,
    /// Text applied while the card is passive.
    pub passive_text: Option<String>,
}

impl Card {
    /// Returns true if this card makes attacks of its action set throws.
    ///
    /// # Arguments
    ///
    /// * `role` - Whether the card is the active or passive half of the set
    #[must_use]
    pub fn grants_throw(&self, role: CardRole) -> bool {
        if THROW_IGNORED_CARD_IDS.contains(&self.id.as_str()) {
            return false;
        }
        match role {
            CardRole::Active => {
                ACTIVE_THROW_CARD_IDS.contains(&self.id.as_str())
                    || mentions_throw(self.active_text.as_deref())
                    || mentions_throw(self.passive_text.as_deref())
            }
            CardRole::Passive => {
                PASSIVE_THROW_CARD_IDS.contains(&self.id.as_str())
                    || mentions_throw(self.passive_text.as_deref())
            }
        }
    }

    /// Index of the beat at which the owner may refresh: the last `E`, or the
    /// last beat when the template has none.
    #[must_use]
    pub fn refresh_offset(&self) -> Option<usize> {
        if self.actions.is_empty() {
            return None;
        }
        Some(
            self.actions
                .iter()
                .rposition(|action| action.trim() == "E")
                .unwrap_or(self.actions.len() - 1),
        )
    }
}

/// Whole-word, case-insensitive match of `throw`.
fn mentions_throw(text: Option<&str>) -> bool {
    text.is_some_and(|text| {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|word| word.eq_ignore_ascii_case("throw"))
    })
}

/// Returns true if an action label contains an attack (`a`) or charge (`c`).
#[must_use]
pub fn label_has_attack(action: &str) -> bool {
    action
        .split('-')
        .map(normalize_label)
        .filter_map(|token| token.chars().last())
        .filter_map(ActionKind::from_char)
        .any(ActionKind::is_attack)
}

// =============================================================================
// Catalog
// =============================================================================

/// Raw card record as it appears in catalog JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCard {
    id: Option<String>,
    name: Option<String>,
    actions: Vec<String>,
    rotations: Option<String>,
    priority: i32,
    damage: i32,
    kbf: i32,
    active_text: Option<String>,
    passive_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCatalog {
    movement: Vec<RawCard>,
    ability: Vec<RawCard>,
}

/// Read-only table of card definitions keyed by id.
///
/// # Example
///
/// ```
/// use hexclash_core::card::{CardCatalog, CardType};
///
/// let catalog = CardCatalog::standard().unwrap();
/// let step = catalog.get("step").unwrap();
/// assert_eq!(step.card_type, CardType::Movement);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCatalog {
    cards: BTreeMap<String, Card>,
    movement: Vec<String>,
    ability: Vec<String>,
}

impl CardCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, duplicate ids, or invalid rotation restrictions.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for (card_type, cards) in [
            (CardType::Movement, raw.movement),
            (CardType::Ability, raw.ability),
        ] {
            for (index, raw_card) in cards.into_iter().enumerate() {
                catalog.insert(normalize_card(raw_card, card_type, index)?)?;
            }
        }
        Ok(catalog)
    }

    /// The built-in reference catalog.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded data is corrupt.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::from_json(STANDARD_CATALOG_JSON)
    }

    /// Adds a card.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateCard`] if the id is already present.
    pub fn insert(&mut self, card: Card) -> Result<(), CatalogError> {
        if self.cards.contains_key(&card.id) {
            return Err(CatalogError::DuplicateCard { id: card.id });
        }
        match card.card_type {
            CardType::Movement => self.movement.push(card.id.clone()),
            CardType::Ability => self.ability.push(card.id.clone()),
        }
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    /// Looks up a card by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.get(id)
    }

    /// Movement card ids in catalog order.
    #[must_use]
    pub fn movement_ids(&self) -> &[String] {
        &self.movement
    }

    /// Ability card ids in catalog order.
    #[must_use]
    pub fn ability_ids(&self) -> &[String] {
        &self.ability
    }

    /// Iterates over every card in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    /// Number of cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Returns true if the catalog has no cards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn normalize_card(raw: RawCard, card_type: CardType, index: usize) -> Result<Card, CatalogError> {
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{card_type}-{index}"));
    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| id.clone());
    let rotations = RotationRestriction::parse(raw.rotations.as_deref().unwrap_or("*"))?;
    let actions = raw
        .actions
        .into_iter()
        .map(|action| action.trim().to_string())
        .filter(|action| !action.is_empty())
        .collect();
    Ok(Card {
        id,
        name,
        card_type,
        actions,
        rotations,
        priority: raw.priority,
        damage: raw.damage,
        kbf: raw.kbf,
        active_text: raw.active_text,
        passive_text: raw.passive_text,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod rotation_restriction {
        use super::*;

        #[test]
        fn any_allows_known_labels_only() {
            let any = RotationRestriction::parse("*").unwrap();
            assert!(any.allows("R2"));
            assert!(!any.allows("R4"));
            assert!(!any.allows(""));
        }

        #[test]
        fn range_filters_by_magnitude() {
            let range = RotationRestriction::parse("0-1").unwrap();
            assert_eq!(range.allowed_labels(), vec!["0", "R1", "L1"]);
            assert!(!range.allows("3"));
        }

        #[test]
        fn malformed_range_is_rejected() {
            assert!(matches!(
                RotationRestriction::parse("two"),
                Err(CatalogError::InvalidRotation { .. })
            ));
        }
    }

    mod catalog {
        use super::*;

        #[test]
        fn defaults_are_filled_in() {
            let catalog = CardCatalog::from_json(
                r#"{ "movement": [{ "actions": [" m ", "", "E"] }], "ability": [] }"#,
            )
            .unwrap();
            let card = catalog.get("movement-0").unwrap();
            assert_eq!(card.name, "movement-0");
            assert_eq!(card.actions, vec!["m", "E"]);
            assert_eq!(card.rotations, RotationRestriction::Any);
            assert_eq!(card.damage, 0);
        }

        #[test]
        fn duplicate_ids_fail() {
            let result = CardCatalog::from_json(
                r#"{ "movement": [{ "id": "x" }], "ability": [{ "id": "x" }] }"#,
            );
            assert!(matches!(result, Err(CatalogError::DuplicateCard { .. })));
        }

        #[test]
        fn bad_json_fails() {
            assert!(matches!(
                CardCatalog::from_json("{"),
                Err(CatalogError::Json(_))
            ));
        }

        #[test]
        fn standard_catalog_loads() {
            let catalog = CardCatalog::standard().unwrap();
            assert!(catalog.get("step").is_some());
            assert!(catalog.get("smoke-bomb").is_some());
            assert!(!catalog.movement_ids().is_empty());
            assert!(!catalog.ability_ids().is_empty());
        }
    }

    mod throws {
        use super::*;

        fn card(id: &str, active: Option<&str>, passive: Option<&str>) -> Card {
            Card {
                id: id.to_string(),
                name: id.to_string(),
                card_type: CardType::Ability,
                actions: vec!["a".to_string()],
                rotations: RotationRestriction::Any,
                priority: 0,
                damage: 0,
                kbf: 0,
                active_text: active.map(str::to_string),
                passive_text: passive.map(str::to_string),
            }
        }

        #[test]
        fn ids_and_text_grant_throws() {
            assert!(card("hip-throw", None, None).grants_throw(CardRole::Active));
            assert!(card("leap", None, None).grants_throw(CardRole::Passive));
            assert!(card("x", Some("Throw the target."), None).grants_throw(CardRole::Active));
            assert!(!card("x", Some("Throw the target."), None).grants_throw(CardRole::Passive));
            assert!(!card("x", Some("Throwing knives"), None).grants_throw(CardRole::Active));
        }

        #[test]
        fn grappling_hook_never_throws_at_build_time() {
            let hook = card("grappling-hook", Some("throw"), Some("throw"));
            assert!(!hook.grants_throw(CardRole::Active));
        }

        #[test]
        fn attack_labels_are_detected() {
            assert!(label_has_attack("m-[a]"));
            assert!(label_has_attack("2c"));
            assert!(!label_has_attack("Bb"));
            assert!(!label_has_attack("W"));
        }
    }

    #[test]
    fn refresh_offset_prefers_last_e() {
        let mut c = blank_card();
        c.actions = vec!["m".into(), "E".into(), "a".into()];
        assert_eq!(c.refresh_offset(), Some(1));
        c.actions = vec!["m".into(), "a".into()];
        assert_eq!(c.refresh_offset(), Some(1));
        c.actions.clear();
        assert_eq!(c.refresh_offset(), None);
    }

    fn blank_card() -> Card {
        Card {
            id: "c".into(),
            name: "c".into(),
            card_type: CardType::Movement,
            actions: Vec::new(),
            rotations: RotationRestriction::Any,
            priority: 0,
            damage: 0,
            kbf: 0,
            active_text: None,
            passive_text: None,
        }
    }
}
