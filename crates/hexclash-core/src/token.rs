//! Board tokens: fire hexes, arrows, ethereal platforms, and focus anchors.
//!
//! The [`TokenRegistry`] is the only board state besides the timeline that
//! survives from one beat to the next. It is rebuilt from the match's initial
//! tokens at the start of every resolution pass and mutated only by the
//! resolver.
//!
//! # Invariants
//!
//! - Fire tokens only exist on land. Fire in the abyss is ephemeral: it burns
//!   for the current beat and is never stored as a token.
//! - Platform tokens only exist in the abyss, at most one per hex.
//! - Each owner has at most one focus anchor.
//! - Token ids are `"{type}:{counter}"` with a counter that never repeats
//!   within a pass.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hex::{normalize_degrees, Board, Hex, Terrain};

/// The kind of a board token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// Burns occupants each beat.
    FireHex,
    /// Flies forward one hex per beat.
    Arrow,
    /// Off-land standing spot.
    EtherealPlatform,
    /// Rewind return point.
    FocusAnchor,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FireHex => "fire-hex",
            Self::Arrow => "arrow",
            Self::EtherealPlatform => "ethereal-platform",
            Self::FocusAnchor => "focus-anchor",
        })
    }
}

/// A token on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Unique id.
    pub id: String,
    /// What the token is.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Where it is.
    pub position: Hex,
    /// Facing in degrees (arrows only; zero otherwise).
    #[serde(default)]
    pub facing: i32,
    /// The user who placed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Source card, for focus anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
}

/// Tokens of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
    counter: usize,
    ephemeral_fire: BTreeSet<Hex>,
}

impl TokenRegistry {
    /// Creates a registry from the match's initial tokens.
    ///
    /// Fire in the abyss and platforms on land are dropped. The id counter
    /// starts after the surviving tokens.
    #[must_use]
    pub fn new(initial: &[Token], board: &Board) -> Self {
        let tokens: Vec<Token> = initial
            .iter()
            .filter(|token| match token.kind {
                TokenKind::FireHex => board.terrain(token.position) == Terrain::Land,
                TokenKind::EtherealPlatform => board.terrain(token.position) == Terrain::Abyss,
                _ => true,
            })
            .cloned()
            .collect();
        let counter = tokens.len();
        Self {
            tokens,
            counter,
            ephemeral_fire: BTreeSet::new(),
        }
    }

    fn next_id(&mut self, kind: TokenKind) -> String {
        let id = format!("{kind}:{}", self.counter);
        self.counter += 1;
        id
    }

    fn push(&mut self, kind: TokenKind, position: Hex, facing: i32, owner: Option<&str>, card_id: Option<&str>) {
        let id = self.next_id(kind);
        self.tokens.push(Token {
            id,
            kind,
            position,
            facing,
            owner: owner.map(str::to_string),
            card_id: card_id.map(str::to_string),
        });
    }

    // =========================================================================
    // Fire
    // =========================================================================

    /// Ignites a hex. Returns false if it was already burning.
    pub fn add_fire(&mut self, hex: Hex, owner: Option<&str>, board: &Board) -> bool {
        if board.is_land(hex) {
            if self.has(TokenKind::FireHex, hex) {
                return false;
            }
            self.push(TokenKind::FireHex, hex, 0, owner, None);
            true
        } else {
            self.ephemeral_fire.insert(hex)
        }
    }

    /// Puts out abyss fire from the previous beat.
    pub fn reset_ephemeral_fire(&mut self) {
        self.ephemeral_fire.clear();
    }

    /// Returns true if the hex burns this beat.
    #[must_use]
    pub fn is_burning(&self, hex: Hex) -> bool {
        self.ephemeral_fire.contains(&hex) || self.has(TokenKind::FireHex, hex)
    }

    /// Returns true if anything burns this beat.
    #[must_use]
    pub fn any_fire(&self) -> bool {
        !self.ephemeral_fire.is_empty() || self.tokens.iter().any(|token| token.kind == TokenKind::FireHex)
    }

    // =========================================================================
    // Arrows
    // =========================================================================

    /// Places an arrow.
    pub fn add_arrow(&mut self, hex: Hex, facing: i32, owner: Option<&str>) {
        self.push(TokenKind::Arrow, hex, normalize_degrees(facing), owner, None);
    }

    /// Ids of the arrows currently on the board.
    #[must_use]
    pub fn arrow_ids(&self) -> BTreeSet<String> {
        self.tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Arrow)
            .map(|token| token.id.clone())
            .collect()
    }

    /// Removes every arrow in `ids` and returns them in board order.
    pub fn take_arrows(&mut self, ids: &BTreeSet<String>) -> Vec<Token> {
        let (taken, kept): (Vec<Token>, Vec<Token>) = std::mem::take(&mut self.tokens)
            .into_iter()
            .partition(|token| token.kind == TokenKind::Arrow && ids.contains(&token.id));
        self.tokens = kept;
        taken
    }

    /// Puts an arrow back after it moved.
    pub fn restore(&mut self, token: Token) {
        self.tokens.push(token);
    }

    // =========================================================================
    // Platforms
    // =========================================================================

    /// Places a platform on an abyss hex. Land and duplicates are ignored.
    pub fn add_platform(&mut self, hex: Hex, owner: Option<&str>, board: &Board) {
        if board.terrain(hex) != Terrain::Abyss || self.has(TokenKind::EtherealPlatform, hex) {
            return;
        }
        self.push(TokenKind::EtherealPlatform, hex, 0, owner, None);
    }

    /// Removes the platform on a hex, if any.
    pub fn remove_platform(&mut self, hex: Hex) {
        if let Some(index) = self
            .tokens
            .iter()
            .rposition(|token| token.kind == TokenKind::EtherealPlatform && token.position == hex)
        {
            self.tokens.remove(index);
        }
    }

    /// Returns true if a platform stands on the hex.
    #[must_use]
    pub fn has_platform(&self, hex: Hex) -> bool {
        self.has(TokenKind::EtherealPlatform, hex)
    }

    // =========================================================================
    // Focus Anchors
    // =========================================================================

    /// Places `owner`'s focus anchor, replacing any previous one.
    pub fn set_focus_anchor(&mut self, hex: Hex, owner: &str, card_id: &str) {
        self.remove_focus_anchor(owner);
        self.push(TokenKind::FocusAnchor, hex, 0, Some(owner), Some(card_id));
    }

    /// Removes `owner`'s focus anchor.
    pub fn remove_focus_anchor(&mut self, owner: &str) {
        self.tokens
            .retain(|token| !(token.kind == TokenKind::FocusAnchor && token.owner.as_deref() == Some(owner)));
    }

    /// Owners that currently have an anchor.
    #[must_use]
    pub fn focus_owners(&self) -> BTreeSet<String> {
        self.tokens
            .iter()
            .filter(|token| token.kind == TokenKind::FocusAnchor)
            .filter_map(|token| token.owner.clone())
            .collect()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn has(&self, kind: TokenKind, hex: Hex) -> bool {
        self.tokens.iter().any(|token| token.kind == kind && token.position == hex)
    }

    /// All tokens in placement order.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Consumes the registry, returning the tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, position: Hex) -> Token {
        Token {
            id: format!("{kind}:seed"),
            kind,
            position,
            facing: 0,
            owner: None,
            card_id: None,
        }
    }

    mod construction {
        use super::*;

        #[test]
        fn drops_misplaced_tokens() {
            let board = Board::standard();
            let initial = vec![
                token(TokenKind::FireHex, Hex::new(0, 0)),
                token(TokenKind::FireHex, Hex::new(6, 0)),
                token(TokenKind::EtherealPlatform, Hex::new(0, 0)),
                token(TokenKind::EtherealPlatform, Hex::new(6, 0)),
            ];
            let registry = TokenRegistry::new(&initial, &board);
            assert_eq!(registry.len(), 2);
        }

        #[test]
        fn ids_continue_after_initial_tokens() {
            let board = Board::standard();
            let mut registry = TokenRegistry::new(&[token(TokenKind::FireHex, Hex::ZERO)], &board);
            registry.add_arrow(Hex::new(1, 0), 180, Some("alice"));
            assert_eq!(registry.tokens()[1].id, "arrow:1");
        }
    }

    mod fire {
        use super::*;

        #[test]
        fn land_fire_is_a_token() {
            let board = Board::standard();
            let mut registry = TokenRegistry::default();
            assert!(registry.add_fire(Hex::ZERO, Some("alice"), &board));
            assert!(!registry.add_fire(Hex::ZERO, Some("alice"), &board));
            assert_eq!(registry.len(), 1);
            assert!(registry.is_burning(Hex::ZERO));
        }

        #[test]
        fn abyss_fire_is_ephemeral() {
            let board = Board::standard();
            let mut registry = TokenRegistry::default();
            assert!(registry.add_fire(Hex::new(5, 0), None, &board));
            assert!(registry.is_empty());
            assert!(registry.is_burning(Hex::new(5, 0)));
            registry.reset_ephemeral_fire();
            assert!(!registry.is_burning(Hex::new(5, 0)));
        }
    }

    #[test]
    fn platforms_only_in_abyss() {
        let board = Board::standard();
        let mut registry = TokenRegistry::default();
        registry.add_platform(Hex::ZERO, None, &board);
        registry.add_platform(Hex::new(4, 0), None, &board);
        registry.add_platform(Hex::new(4, 0), None, &board);
        assert_eq!(registry.len(), 1);
        assert!(registry.has_platform(Hex::new(4, 0)));
        registry.remove_platform(Hex::new(4, 0));
        assert!(registry.is_empty());
    }

    #[test]
    fn one_anchor_per_owner() {
        let mut registry = TokenRegistry::default();
        registry.set_focus_anchor(Hex::ZERO, "alice", "rewind");
        registry.set_focus_anchor(Hex::new(1, 0), "alice", "rewind");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tokens()[0].position, Hex::new(1, 0));
        registry.remove_focus_anchor("alice");
        assert!(registry.focus_owners().is_empty());
    }

    #[test]
    fn take_arrows_leaves_others() {
        let board = Board::standard();
        let mut registry = TokenRegistry::default();
        registry.add_arrow(Hex::ZERO, 180, None);
        registry.add_fire(Hex::new(1, 0), None, &board);
        let ids = registry.arrow_ids();
        let taken = registry.take_arrows(&ids);
        assert_eq!(taken.len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
