//! Action token grammar.
//!
//! A label such as `m-[2a]` splits on `-` into sub-tokens. The last character
//! of each sub-token is its kind; everything before it is a path:
//!
//! - `F`, `B`, `L`, `R`, `BL`, `BR` each optionally followed by a count
//! - a bare number means `F` repeated that many times
//! - an empty path means a single `F`
//!
//! Parsing never fails: unknown kinds are kept and ignored by the resolver,
//! unknown direction letters walk forward.

use serde::{Deserialize, Serialize};

use super::{is_wait_action, normalize_label};
use crate::hex::LocalDirection;

/// The kind of a sub-token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Walk the path, stopping before occupied hexes.
    Move,
    /// Teleport to the path's end if it is free.
    Jump,
    /// Strike the path's end.
    Attack,
    /// Walk the path, then strike its end.
    Charge,
    /// Register a directional block.
    Block,
}

impl ActionKind {
    /// Parses a kind character, ignoring case.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'm' => Some(Self::Move),
            'j' => Some(Self::Jump),
            'a' => Some(Self::Attack),
            'c' => Some(Self::Charge),
            'b' => Some(Self::Block),
            _ => None,
        }
    }

    /// Attacks and charges strike their destination.
    #[must_use]
    pub fn is_attack(self) -> bool {
        matches!(self, Self::Attack | Self::Charge)
    }

    /// Moves and charges walk their path.
    #[must_use]
    pub fn walks(self) -> bool {
        matches!(self, Self::Move | Self::Charge)
    }
}

/// One direction with a repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Direction relative to facing.
    pub direction: LocalDirection,
    /// Number of hexes.
    pub distance: u32,
}

impl PathStep {
    const FORWARD: Self = Self {
        direction: LocalDirection::F,
        distance: 1,
    };
}

/// A parsed sub-token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionToken {
    /// What the sub-token does.
    pub kind: ActionKind,
    /// The raw path text.
    pub path: String,
    /// The parsed path.
    pub steps: Vec<PathStep>,
    /// Whether the sub-token was bracketed.
    pub bracketed: bool,
}

impl ActionToken {
    /// A path with no left, right, or backward component.
    #[must_use]
    pub fn is_center_path(&self) -> bool {
        !self
            .path
            .chars()
            .any(|c| matches!(c.to_ascii_uppercase(), 'L' | 'R' | 'B'))
    }
}

/// Parses a direction path into steps.
///
/// # Example
///
/// ```
/// use hexclash_core::action::parse_path;
/// use hexclash_core::hex::LocalDirection;
///
/// let steps = parse_path("2BL");
/// assert_eq!(steps.len(), 1);
/// assert_eq!(steps[0].direction, LocalDirection::BL);
/// assert_eq!(parse_path("3")[0].distance, 3);
/// ```
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathStep> {
    let upper: Vec<char> = path.to_ascii_uppercase().chars().collect();
    let mut steps = Vec::new();
    let mut index = 0;
    let read_number = |index: &mut usize| -> String {
        let start = *index;
        while *index < upper.len() && upper[*index].is_ascii_digit() {
            *index += 1;
        }
        upper[start..*index].iter().collect()
    };
    while index < upper.len() {
        if upper[index].is_ascii_digit() {
            let number = read_number(&mut index);
            let Ok(distance) = number.parse::<u32>() else {
                continue;
            };
            // A count directly before a letter is a prefix the letter ignores.
            let followed_by_letter = upper.get(index).is_some_and(char::is_ascii_alphabetic);
            if distance > 0 && !followed_by_letter {
                steps.push(PathStep {
                    direction: LocalDirection::F,
                    distance,
                });
            }
            continue;
        }
        let mut label = upper[index].to_string();
        if upper[index] == 'B' && matches!(upper.get(index + 1), Some('L' | 'R')) {
            label.push(upper[index + 1]);
            index += 1;
        }
        index += 1;
        let number = read_number(&mut index);
        let distance = number.parse::<u32>().ok().filter(|d| *d > 0).unwrap_or(1);
        steps.push(PathStep {
            direction: LocalDirection::from_label(&label),
            distance,
        });
    }
    if steps.is_empty() {
        steps.push(PathStep::FORWARD);
    }
    steps
}

/// Splits an action label into sub-tokens.
///
/// Wait labels (`W`, `DamageIcon`, `CO`, empty) have none. Sub-tokens whose
/// kind character is not one of `m j a c b` are dropped.
#[must_use]
pub fn parse_action_tokens(action: &str) -> Vec<ActionToken> {
    let trimmed = action.trim();
    if is_wait_action(trimmed) {
        return Vec::new();
    }
    trimmed
        .split('-')
        .filter_map(|raw| {
            let bracketed = super::is_bracketed(raw);
            let token = normalize_label(raw);
            let last = token.chars().last()?;
            let kind = ActionKind::from_char(last)?;
            let path = &token[..token.len() - last.len_utf8()];
            Some(ActionToken {
                kind,
                path: path.to_string(),
                steps: parse_path(path),
                bracketed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(direction: LocalDirection, distance: u32) -> PathStep {
        PathStep { direction, distance }
    }

    mod paths {
        use super::*;

        #[test]
        fn empty_path_is_one_forward() {
            assert_eq!(parse_path(""), vec![step(LocalDirection::F, 1)]);
        }

        #[test]
        fn bare_number_is_forward() {
            assert_eq!(parse_path("3"), vec![step(LocalDirection::F, 3)]);
        }

        #[test]
        fn letters_take_trailing_counts() {
            assert_eq!(
                parse_path("L2R"),
                vec![step(LocalDirection::L, 2), step(LocalDirection::R, 1)]
            );
        }

        #[test]
        fn back_diagonals_combine() {
            assert_eq!(
                parse_path("BLBR2"),
                vec![step(LocalDirection::BL, 1), step(LocalDirection::BR, 2)]
            );
        }

        #[test]
        fn number_before_letter_is_ignored() {
            assert_eq!(parse_path("2B"), vec![step(LocalDirection::B, 1)]);
        }

        #[test]
        fn unknown_letters_walk_forward() {
            assert_eq!(parse_path("Q"), vec![step(LocalDirection::F, 1)]);
        }
    }

    mod tokens {
        use super::*;

        #[test]
        fn waits_have_no_tokens() {
            assert!(parse_action_tokens("W").is_empty());
            assert!(parse_action_tokens("[CO]").is_empty());
            assert!(parse_action_tokens("DamageIcon").is_empty());
        }

        #[test]
        fn compound_label_splits() {
            let tokens = parse_action_tokens("m-[2a]-Bb");
            assert_eq!(tokens.len(), 3);
            assert_eq!(tokens[0].kind, ActionKind::Move);
            assert!(!tokens[0].bracketed);
            assert_eq!(tokens[1].kind, ActionKind::Attack);
            assert_eq!(tokens[1].path, "2");
            assert!(tokens[1].bracketed);
            assert_eq!(tokens[2].kind, ActionKind::Block);
            assert_eq!(tokens[2].steps, vec![step(LocalDirection::B, 1)]);
        }

        #[test]
        fn unknown_kinds_are_dropped() {
            assert!(parse_action_tokens("X1").is_empty());
            assert!(parse_action_tokens("E").is_empty());
        }

        #[test]
        fn centre_paths() {
            let tokens = parse_action_tokens("a-La-2a");
            assert!(tokens[0].is_center_path());
            assert!(!tokens[1].is_center_path());
            assert!(tokens[2].is_center_path());
        }
    }
}
