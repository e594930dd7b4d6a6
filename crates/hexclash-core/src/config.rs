//! Engine configuration and per-character powers.
//!
//! Every constant the resolver depends on lives in [`EngineConfig`]. The
//! defaults reproduce the standard game; a partial JSON document overrides
//! only the fields it names.
//!
//! # Example
//!
//! ```
//! use hexclash_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "throwDistance": 3 }"#).unwrap();
//! assert_eq!(config.throw_distance, 3);
//! assert_eq!(config.knockback_divisor, 10);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hex::{default_land, Board, Hex};

/// Tunable constants of the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Land hexes; everything else is abyss.
    pub land: Vec<Hex>,
    /// Divisor of `damage * kbf` in the knockback formula.
    pub knockback_divisor: i32,
    /// Hexes a throw carries its target.
    pub throw_distance: u32,
    /// Damage of an arrow hit.
    pub arrow_damage: i32,
    /// Knockback factor of an arrow hit.
    pub arrow_kbf: i32,
    /// Arrows at this distance from land or more are removed.
    pub arrow_land_distance_limit: i32,
    /// Damage a fire hex deals each beat.
    pub fire_damage: i32,
    /// Stun beats for a rewind return onto an occupied anchor.
    pub rewind_blocked_stun: u32,
    /// Default ability hand size.
    pub max_hand_size: usize,
    /// Distance from land that loses the match.
    pub distance_loss_threshold: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            land: default_land(),
            knockback_divisor: 10,
            throw_distance: 2,
            arrow_damage: 4,
            arrow_kbf: 1,
            arrow_land_distance_limit: 5,
            fire_damage: 1,
            rewind_blocked_stun: 3,
            max_hand_size: 4,
            distance_loss_threshold: 4,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        if config.land.is_empty() {
            config.land = default_land();
        }
        if config.knockback_divisor <= 0 {
            tracing::warn!(divisor = config.knockback_divisor, "non-positive knockback divisor replaced");
            config.knockback_divisor = 10;
        }
        Ok(config)
    }

    /// The board described by `land`.
    #[must_use]
    pub fn board(&self) -> Board {
        Board::new(self.land.iter().copied())
    }
}

/// Character-specific modifiers supplied by the catalog.
///
/// All fields default to zero or false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CharacterPowers {
    /// Extra damage on every attack this character makes.
    pub attack_damage_bonus: i32,
    /// Damage subtracted from every hit this character takes.
    pub damage_reduction: i32,
    /// Extra knockback on this character's hits per 10 damage taken by the
    /// attacking character.
    pub knockback_bonus_per_ten_damage: i32,
    /// Fire hexes deal no damage to this character.
    pub fire_damage_immune: bool,
    /// Cards drawn whenever this character is knocked back.
    pub draw_on_knockback: u32,
    /// Reduces discards opponents force on this character.
    pub opponent_discard_reduction: u32,
    /// Overrides the ability hand size.
    pub max_hand_size: Option<usize>,
}

impl CharacterPowers {
    /// Extra knockback for a hit with `kbf` by an attacker with `damage` taken.
    ///
    /// Zero for non-positive factors.
    #[must_use]
    pub fn knockback_bonus(&self, damage: i32, kbf: i32) -> i32 {
        if kbf <= 0 || self.knockback_bonus_per_ten_damage <= 0 {
            return 0;
        }
        self.knockback_bonus_per_ten_damage * (damage.max(0) / 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_standard_board() {
        let config = EngineConfig::default();
        assert_eq!(config.land.len(), 13);
        assert_eq!(config.board().land().len(), 13);
        assert_eq!(config.arrow_damage, 4);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "arrowDamage": 6, "land": [] }"#).unwrap();
        assert_eq!(config.arrow_damage, 6);
        assert_eq!(config.land.len(), 13);
        assert_eq!(config.fire_damage, 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn knockback_bonus_tiers() {
        let powers = CharacterPowers {
            knockback_bonus_per_ten_damage: 2,
            ..CharacterPowers::default()
        };
        assert_eq!(powers.knockback_bonus(9, 2), 0);
        assert_eq!(powers.knockback_bonus(25, 2), 4);
        assert_eq!(powers.knockback_bonus(25, 0), 0);
        assert_eq!(CharacterPowers::default().knockback_bonus(50, 3), 0);
    }
}
