//! Match roster: the characters taking part, in registration order.
//!
//! Registration order is the priority tie-break and the order in which every
//! beat keeps its entries.

use serde::{Deserialize, Serialize};

use crate::config::CharacterPowers;
use crate::hex::{normalize_degrees, Hex};

/// A character at the start of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    /// Owning user id.
    pub user_id: String,
    /// Display name. Entries may refer to a character by either name.
    pub username: String,
    /// Catalog id of the character.
    #[serde(default)]
    pub character_id: String,
    /// Starting hex.
    pub position: Hex,
    /// Starting facing in degrees.
    #[serde(default)]
    pub facing: i32,
    /// Character-specific modifiers.
    #[serde(default)]
    pub powers: CharacterPowers,
}

impl Character {
    /// Creates a character whose username equals its user id.
    #[must_use]
    pub fn new(user_id: &str, position: Hex, facing: i32) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            character_id: String::new(),
            position,
            facing: normalize_degrees(facing),
            powers: CharacterPowers::default(),
        }
    }

    /// Sets the powers.
    #[must_use]
    pub fn with_powers(mut self, powers: CharacterPowers) -> Self {
        self.powers = powers;
        self
    }

    /// Returns true if `key` is this character's user id or username.
    #[must_use]
    pub fn answers_to(&self, key: &str) -> bool {
        self.user_id == key || self.username == key
    }
}

/// The ordered list of characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    characters: Vec<Character>,
}

impl Roster {
    /// Creates a roster in registration order.
    #[must_use]
    pub fn new(characters: Vec<Character>) -> Self {
        Self { characters }
    }

    /// Characters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    /// Looks up a character by user id or username.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Character> {
        self.characters.iter().find(|character| character.answers_to(key))
    }

    /// Registration index of a user id or username.
    #[must_use]
    pub fn order_of(&self, key: &str) -> Option<usize> {
        self.characters.iter().position(|character| character.answers_to(key))
    }

    /// Resolves a user id or username to the user id.
    #[must_use]
    pub fn user_id(&self, key: &str) -> Option<&str> {
        self.get(key).map(|character| character.user_id.as_str())
    }

    /// User ids in registration order.
    #[must_use]
    pub fn user_ids(&self) -> Vec<&str> {
        self.characters.iter().map(|character| character.user_id.as_str()).collect()
    }

    /// Number of characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Returns true if the roster has no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl FromIterator<Character> for Roster {
    fn from_iter<I: IntoIterator<Item = Character>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
