//! Action entries and the labels they carry.
//!
//! An action set is the multi-beat sequence produced from one active card,
//! one passive card, and a rotation. Each beat of the set is an
//! [`ActionEntry`]. Entries are built by [`builder::build_action_list`], which
//! runs the card-text pipeline in [`effects`].
//!
//! # Labels
//!
//! An action label is a `-`-separated list of sub-tokens (see [`token`]).
//! Some labels are special:
//!
//! | Label        | Meaning                                       |
//! |--------------|-----------------------------------------------|
//! | `E`          | Open: no action submitted yet                 |
//! | `F`          | Focus: open, and records a rewind anchor      |
//! | `W`          | Wait                                          |
//! | `DamageIcon` | Stunned wait written by a hit                 |
//! | `CO`         | Combo check                                   |
//! | `X1`         | Card-specific marker (swap, arrow, platform)  |
//!
//! A label wrapped in `[...]` is *bracketed*: it anchors the card's text.

pub mod builder;
pub mod effects;
pub mod token;
pub mod transform;

pub use builder::{build_action_list, ActionListBuilder, SWAP_CARD_ID};
pub use token::{parse_action_tokens, parse_path, ActionKind, ActionToken, PathStep};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::interaction::InteractionKind;

/// The open action.
pub const OPEN_ACTION: &str = "E";
/// The focus action (open, records a rewind anchor).
pub const FOCUS_ACTION: &str = "F";
/// The wait action.
pub const WAIT_ACTION: &str = "W";
/// The combo-check action.
pub const COMBO_ACTION: &str = "CO";
/// The label a declined combo check becomes.
pub const SKIPPED_COMBO_ACTION: &str = "Co";
/// The stunned wait written by hits.
pub const DAMAGE_ICON_ACTION: &str = "DamageIcon";
/// The card-specific marker.
pub const MARKER_ACTION: &str = "X1";

// =============================================================================
// Entry Types
// =============================================================================

/// Who chose an entry's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationSource {
    /// The player picked it at submission.
    Selected,
    /// Card text imposed it.
    Forced,
}

bitflags! {
    /// Per-entry flags written by resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntryFlags: u8 {
        /// First entry of an action set continued from a combo.
        const COMBO_STARTER = 1 << 0;
        /// A combo check that was declined or unavailable.
        const COMBO_SKIPPED = 1 << 1;
        /// A stun window that deals no knockback.
        const STUN_ONLY = 1 << 2;
    }
}

/// One beat of an action set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    /// The action label.
    pub action: String,
    /// Rotation label, normally only set on the first entry of a set.
    #[serde(default)]
    pub rotation: String,
    /// Who chose the rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_source: Option<RotationSource>,
    /// Resolution priority.
    #[serde(default)]
    pub priority: i32,
    /// Attack damage.
    #[serde(default)]
    pub damage: i32,
    /// Attack knockback factor.
    #[serde(default)]
    pub kbf: i32,
    /// Active card id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    /// Passive card id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_card_id: Option<String>,
    /// Interaction this entry raises when it hits (throws only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<InteractionKind>,
    /// Flags written by resolution.
    #[serde(default, skip_serializing_if = "EntryFlags::is_empty")]
    pub flags: EntryFlags,
}

impl ActionEntry {
    /// Creates a bare entry with the given label.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// An open placeholder.
    #[must_use]
    pub fn open() -> Self {
        Self::new(OPEN_ACTION)
    }

    /// Sets the rotation and its source.
    #[must_use]
    pub fn with_rotation(mut self, rotation: impl Into<String>, source: Option<RotationSource>) -> Self {
        self.rotation = rotation.into();
        self.rotation_source = source;
        self
    }

    /// Sets the active and passive card ids.
    #[must_use]
    pub fn with_cards(mut self, card_id: &str, passive_card_id: &str) -> Self {
        self.card_id = Some(card_id.to_string());
        self.passive_card_id = Some(passive_card_id.to_string());
        self
    }

    /// Sets priority, damage, and knockback factor.
    #[must_use]
    pub fn with_attack(mut self, priority: i32, damage: i32, kbf: i32) -> Self {
        self.priority = priority;
        self.damage = damage;
        self.kbf = kbf;
        self
    }

    /// The label with any brackets removed.
    #[must_use]
    pub fn label(&self) -> &str {
        normalize_label(&self.action)
    }

    /// Returns true if this entry anchors card text.
    #[must_use]
    pub fn is_bracketed(&self) -> bool {
        is_bracketed(&self.action)
    }

    /// Returns true for `E` and `F`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        is_open_action(&self.action)
    }

    /// Returns true for everything but `E`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        is_active_action(&self.action)
    }

    /// Returns true if this entry's passive card is `card_id`.
    #[must_use]
    pub fn has_passive(&self, card_id: &str) -> bool {
        self.passive_card_id.as_deref() == Some(card_id)
    }

    /// Returns true if this entry's active card is `card_id`.
    #[must_use]
    pub fn has_active(&self, card_id: &str) -> bool {
        self.card_id.as_deref() == Some(card_id)
    }
}

// =============================================================================
// Label Helpers
// =============================================================================

/// Strips surrounding whitespace and brackets from a label.
#[must_use]
pub fn normalize_label(action: &str) -> &str {
    let trimmed = action.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .map_or(trimmed, str::trim)
}

/// Returns true if a label is wrapped in brackets.
#[must_use]
pub fn is_bracketed(action: &str) -> bool {
    let trimmed = action.trim();
    trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']')
}

/// Wraps a label in brackets when `bracketed` is set.
#[must_use]
pub fn wrap_label(label: &str, bracketed: bool) -> String {
    if bracketed {
        format!("[{label}]")
    } else {
        label.to_string()
    }
}

/// Returns true if a normalized label equals `expected`, ignoring case.
#[must_use]
pub fn label_is(action: &str, expected: &str) -> bool {
    normalize_label(action).eq_ignore_ascii_case(expected)
}

/// `E` and `F` leave a beat open for a new submission.
#[must_use]
pub fn is_open_action(action: &str) -> bool {
    label_is(action, OPEN_ACTION) || label_is(action, FOCUS_ACTION)
}

/// Every label except `E` counts as an active beat for passive modifiers.
#[must_use]
pub fn is_active_action(action: &str) -> bool {
    !label_is(action, OPEN_ACTION)
}

/// Labels with no sub-tokens: empty, `W`, `DamageIcon`, and `CO`.
#[must_use]
pub fn is_wait_action(action: &str) -> bool {
    let label = normalize_label(action);
    label.is_empty()
        || label.eq_ignore_ascii_case(WAIT_ACTION)
        || label.eq_ignore_ascii_case(DAMAGE_ICON_ACTION)
        || label.eq_ignore_ascii_case(COMBO_ACTION)
}

/// Returns true for the combo-check label.
#[must_use]
pub fn is_combo_action(action: &str) -> bool {
    label_is(action, COMBO_ACTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_brackets() {
        assert_eq!(normalize_label(" [2m] "), "2m");
        assert_eq!(normalize_label("a"), "a");
        assert_eq!(normalize_label("[a"), "[a");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn special_labels() {
        assert!(is_open_action("E"));
        assert!(is_open_action("[F]"));
        assert!(!is_open_action("W"));
        assert!(is_wait_action("DamageIcon"));
        assert!(is_wait_action("CO"));
        assert!(is_wait_action(""));
        assert!(!is_wait_action("Co-m"));
        assert!(is_active_action("F"));
        assert!(!is_active_action("[E]"));
    }

    #[test]
    fn flags_serialize_compactly() {
        let mut entry = ActionEntry::new("m");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("flags").is_none());
        entry.flags.insert(EntryFlags::COMBO_SKIPPED);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("flags").is_some());
    }
}
