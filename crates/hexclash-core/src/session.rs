//! A match: the timeline, decks, and interactions of one game.
//!
//! [`Match`] is the thin collaborator around the resolver. It validates
//! action sets against decks, writes them into the timeline, takes
//! interaction answers through the gate, and re-resolves after every change.
//! Card movements that follow from resolution (draws, trigger costs, land
//! refreshes) are applied to the decks here, and simultaneous hand triggers
//! are ranked so that only the first in line can be answered.
//!
//! # Architecture
//!
//! ```text
//! submit_action ──► validate_submission ──► Timeline::apply_action_set ─┐
//! submit_interaction ──► gate::submit ──► deck costs ────────────────────┤
//!                                                                       ▼
//!                 resolve ──► draws ──► land refresh ──► trigger order ──► outcome
//! ```
//!
//! # Invariants
//!
//! - A rejected call changes nothing
//! - A draw is applied to a deck once per card counted, even when later
//!   passes grow the same draw interaction
//! - A draw that must restore movement cards into a small hand waits for the
//!   player to name them

use std::collections::BTreeMap;

use crate::deck::{draw_requirements, refresh_on_land, validate_submission, ActionSubmission, DeckState};
use crate::engine::Engine;
use crate::error::MatchError;
use crate::hex::{Board, Hex};
use crate::interaction::{
    active_hand_trigger, rank_hand_triggers, submit, Interaction, InteractionDetail, InteractionKind,
    InteractionResolution, InteractionSubmission, TriggerStanding,
};
use crate::outcome::{evaluate_outcome, MatchOutcome};
use crate::resolver::{Availability, Resolution, ResolveInput};
use crate::roster::Roster;
use crate::timeline::Timeline;
use crate::token::{Token, TokenKind};

/// One game in progress.
#[derive(Debug)]
pub struct Match<'e> {
    engine: &'e Engine,
    board: Board,
    roster: Roster,
    timeline: Timeline,
    interactions: Vec<Interaction>,
    initial_tokens: Vec<Token>,
    decks: BTreeMap<String, DeckState>,
    drawn: BTreeMap<String, u32>,
    resolution: Option<Resolution>,
}

impl<'e> Match<'e> {
    /// Starts a match with one open beat per character.
    #[must_use]
    pub fn new(engine: &'e Engine, roster: Roster, decks: BTreeMap<String, DeckState>) -> Self {
        let board = engine.config().board();
        let timeline = Timeline::seed(&roster, &board, 1);
        Self {
            engine,
            board,
            roster,
            timeline,
            interactions: Vec::new(),
            initial_tokens: Vec::new(),
            decks,
            drawn: BTreeMap::new(),
            resolution: None,
        }
    }

    /// Sets the tokens on the board before the first beat.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<Token>) -> Self {
        self.initial_tokens = tokens;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The characters.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The timeline as of the last resolution.
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Every interaction raised so far.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Interactions waiting for an answer.
    pub fn pending(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter(|interaction| interaction.is_pending())
    }

    /// A player's deck.
    #[must_use]
    pub fn deck(&self, user: &str) -> Option<&DeckState> {
        let user_id = self.roster.user_id(user)?;
        self.decks.get(user_id)
    }

    /// The last resolution, if any.
    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Tokens on the board after the last calculated beat.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        self.resolution
            .as_ref()
            .map_or(self.initial_tokens.as_slice(), |resolution| resolution.tokens.as_slice())
    }

    /// The decided outcome, if the match is over.
    #[must_use]
    pub fn outcome(&self) -> Option<MatchOutcome> {
        evaluate_outcome(
            &self.timeline,
            &self.roster,
            &self.decks,
            &self.board,
            self.engine.config().distance_loss_threshold,
        )
    }

    // =========================================================================
    // Intake
    // =========================================================================

    fn user_id(&self, user: &str) -> Result<String, MatchError> {
        self.roster
            .user_id(user)
            .filter(|user_id| self.decks.contains_key(*user_id))
            .map(str::to_string)
            .ok_or_else(|| MatchError::UnknownUser { user: user.to_string() })
    }

    /// Validates and writes an action set, then resolves.
    ///
    /// Returns the beat the set starts at.
    ///
    /// # Errors
    ///
    /// - [`MatchError::UnknownUser`] for a user without character or deck
    /// - [`MatchError::DecisionPending`] while any interaction is pending
    /// - [`MatchError::Validation`] for a rejected card pair or rotation
    pub fn submit_action(&mut self, user: &str, submission: &ActionSubmission) -> Result<usize, MatchError> {
        let user_id = self.user_id(user)?;
        if let Some(pending) = self.pending().next() {
            return Err(MatchError::DecisionPending { id: pending.id.clone() });
        }
        let deck = self
            .decks
            .get(&user_id)
            .ok_or_else(|| MatchError::UnknownUser { user: user.to_string() })?;
        let validated = validate_submission(submission, deck, self.engine.catalog(), self.engine.effects())?;
        let start = self
            .timeline
            .apply_action_set(&self.roster, &self.board, &user_id, &validated.action_list)
            .ok_or_else(|| MatchError::UnknownUser { user: user.to_string() })?;
        if let Some(deck) = self.decks.get_mut(&user_id) {
            deck.apply_card_use(&validated);
        }
        tracing::debug!(actor = %user_id, start, active = %validated.active_card_id, "action set accepted");
        self.resolve();
        Ok(start)
    }

    /// Answers an interaction, pays its card costs, then resolves.
    ///
    /// # Errors
    ///
    /// - [`MatchError::UnknownUser`] for a user without character or deck
    /// - [`MatchError::Interaction`] when the gate rejects the answer
    /// - [`MatchError::TriggerOutOfTurn`] for a hand trigger ranked behind another
    /// - [`MatchError::Validation`] when the paid cards are not in hand
    pub fn submit_interaction(
        &mut self,
        user: &str,
        id: &str,
        submission: InteractionSubmission,
    ) -> Result<(), MatchError> {
        let user_id = self.user_id(user)?;
        let mut interactions = self.interactions.clone();
        let resolved = submit(&mut interactions, &user_id, id, submission, self.decks.get(&user_id))?.clone();
        if resolved.kind() == InteractionKind::HandTrigger {
            if let Some(active) = active_hand_trigger(&self.interactions).filter(|active| active.id != resolved.id) {
                return Err(MatchError::TriggerOutOfTurn {
                    id: resolved.id,
                    active: active.id.clone(),
                });
            }
        }

        let owner = match resolved.resolution {
            Some(InteractionResolution::Discard { .. }) => resolved.target.clone(),
            _ => resolved.actor.clone(),
        };
        let drawn = self.drawn.get(&resolved.id).copied().unwrap_or(0);
        let mut deck = self.decks.get(&owner).cloned();
        if let Some(deck) = deck.as_mut() {
            pay_costs(deck, &resolved, drawn)?;
        }

        self.interactions = interactions;
        if let Some(deck) = deck {
            self.decks.insert(owner, deck);
        }
        if let InteractionDetail::Draw { count, .. } = resolved.detail {
            self.drawn.insert(resolved.id.clone(), count);
        }
        tracing::debug!(actor = %user_id, interaction = id, "interaction answered");
        self.resolve();
        Ok(())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Re-resolves the timeline and settles deck effects.
    pub fn resolve(&mut self) -> &Resolution {
        let catalog = self.engine.catalog();
        let availability: BTreeMap<String, Availability> = self
            .decks
            .iter()
            .map(|(user_id, deck)| (user_id.clone(), Availability::from_deck(deck, catalog)))
            .collect();
        let input = ResolveInput {
            roster: self.roster.clone(),
            timeline: self.timeline.clone(),
            interactions: self.interactions.clone(),
            tokens: self.initial_tokens.clone(),
            availability,
        };
        let mut resolution = self.engine.resolve(input);
        self.timeline = resolution.timeline.clone();
        self.interactions = resolution.interactions.clone();
        self.apply_draws();
        self.refresh(&resolution.tokens);
        self.rank_triggers();
        resolution.interactions = self.interactions.clone();
        self.resolution.insert(resolution)
    }

    /// Draws the cards each draw interaction added since the last pass.
    ///
    /// A draw that restores movement cards into a small hand is handed back
    /// to the player instead, and drawn once they name the cards.
    fn apply_draws(&mut self) {
        for interaction in &mut self.interactions {
            let InteractionDetail::Draw { count, .. } = interaction.detail else {
                continue;
            };
            let drawn = self.drawn.get(&interaction.id).copied().unwrap_or(0);
            if count <= drawn || interaction.is_pending() {
                continue;
            }
            let Some(deck) = self.decks.get_mut(&interaction.actor) else {
                continue;
            };
            let required = draw_requirements(deck, (count - drawn) as usize);
            if required.requires_selection {
                let restore = u32::try_from(required.restore).unwrap_or(u32::MAX);
                interaction.require_movement_selection(restore);
            }
            if interaction.is_pending() {
                tracing::debug!(actor = %interaction.actor, id = %interaction.id, "draw waits for movement");
                continue;
            }
            deck.draw((count - drawn) as usize);
            self.drawn.insert(interaction.id.clone(), count);
        }
    }

    /// Orders pending hand triggers by their actors' standing at the
    /// trigger beat.
    fn rank_triggers(&mut self) {
        let mut standings = BTreeMap::new();
        for interaction in self
            .interactions
            .iter()
            .filter(|interaction| interaction.kind() == InteractionKind::HandTrigger && interaction.is_pending())
        {
            if standings.contains_key(&interaction.actor) {
                continue;
            }
            let entry = self.timeline.last_entry_before(interaction.beat_index + 1, &interaction.actor);
            let hand_size = self
                .decks
                .get(&interaction.actor)
                .map_or(0, |deck| deck.movement_hand().len() + deck.ability_hand.len());
            let location = entry
                .map(|entry| entry.location)
                .or_else(|| self.roster.get(&interaction.actor).map(|character| character.position));
            let standing = TriggerStanding {
                damage: entry.map_or(0, |entry| entry.total_damage),
                hand_size,
                location,
            };
            standings.insert(interaction.actor.clone(), standing);
        }
        if !standings.is_empty() {
            rank_hand_triggers(&mut self.interactions, &standings, &self.board);
        }
    }

    fn refresh(&mut self, tokens: &[Token]) {
        let platforms: Vec<Hex> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::EtherealPlatform)
            .map(|token| token.position)
            .collect();
        let refreshed = refresh_on_land(
            &mut self.decks,
            &self.timeline,
            &self.roster,
            &self.board,
            &platforms,
            &self.interactions,
            self.engine.config().max_hand_size,
        );
        for refresh in refreshed {
            let Some(platform) = refresh.platform else {
                continue;
            };
            let haven = self.interactions.iter_mut().find(|interaction| {
                interaction.haven_target() == Some(platform)
                    && matches!(
                        interaction.detail,
                        InteractionDetail::HavenPlatform {
                            consumed_beat: None,
                            ..
                        }
                    )
            });
            if let Some(InteractionDetail::HavenPlatform { consumed_beat, .. }) =
                haven.map(|interaction| &mut interaction.detail)
            {
                *consumed_beat = Some(refresh.beat_index);
                tracing::debug!(actor = %refresh.user_id, beat = refresh.beat_index, "platform consumed");
            }
        }
    }
}

/// Moves the cards an answered interaction costs or brings.
///
/// `drawn` is how much of a draw interaction the deck has already taken.
fn pay_costs(deck: &mut DeckState, interaction: &Interaction, drawn: u32) -> Result<(), MatchError> {
    match &interaction.resolution {
        Some(InteractionResolution::Draw { movement_card_ids }) => {
            if let InteractionDetail::Draw { count, .. } = interaction.detail {
                deck.draw_restoring(count.saturating_sub(drawn) as usize, movement_card_ids);
            }
        }
        Some(InteractionResolution::Discard {
            ability_card_ids,
            movement_card_ids,
        }) => deck.discard(ability_card_ids, movement_card_ids)?,
        Some(InteractionResolution::HandTrigger {
            used: true,
            ability_card_ids,
            movement_card_ids,
        }) => {
            deck.discard(ability_card_ids, movement_card_ids)?;
            if let InteractionDetail::HandTrigger { draw_count, .. } = interaction.detail {
                if draw_count > 0 {
                    deck.draw(draw_count as usize);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InteractionError;
    use crate::interaction::{hand_trigger_id, HandTriggerKind};
    use crate::roster::Character;

    fn decks() -> BTreeMap<String, DeckState> {
        let movement = vec!["step".to_string(), "dash".to_string(), "advance".to_string(), "leap".to_string()];
        let abilities = ["jab", "guard", "parry", "spike", "trip", "absorb"]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        BTreeMap::from([
            ("alice".to_string(), DeckState::new(movement.clone(), abilities.clone())),
            ("bob".to_string(), DeckState::new(movement, abilities)),
        ])
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Character::new("alice", Hex::new(-1, 0), 0),
            Character::new("bob", Hex::new(2, 0), 180),
        ])
    }

    fn submission(active: &str, passive: &str) -> ActionSubmission {
        ActionSubmission {
            active_card_id: active.into(),
            passive_card_id: passive.into(),
            rotation: "0".into(),
        }
    }

    #[test]
    fn unknown_user_is_rejected() {
        let engine = Engine::standard().unwrap();
        let mut game = Match::new(&engine, roster(), decks());
        let error = game.submit_action("carol", &submission("step", "jab")).unwrap_err();
        assert_eq!(error, MatchError::UnknownUser { user: "carol".into() });
    }

    #[test]
    fn invalid_submission_changes_nothing() {
        let engine = Engine::standard().unwrap();
        let mut game = Match::new(&engine, roster(), decks());
        let before = game.timeline().clone();
        let error = game.submit_action("alice", &submission("step", "dash")).unwrap_err();
        assert!(matches!(error, MatchError::Validation(_)));
        assert_eq!(game.timeline(), &before);
        assert!(game.deck("alice").unwrap().exhausted.is_empty());
    }

    #[test]
    fn both_sets_resolve_the_first_beat() {
        let engine = Engine::standard().unwrap();
        let mut game = Match::new(&engine, roster(), decks());
        assert_eq!(game.submit_action("alice", &submission("step", "jab")), Ok(0));
        assert!(!game.timeline().is_calculated(0));
        assert!(game.deck("alice").unwrap().exhausted.contains("step"));

        assert_eq!(game.submit_action("bob", &submission("step", "jab")), Ok(0));
        assert!(game.timeline().is_calculated(0));
        // Alice stepped onto land and refreshes; Bob stepped into the abyss.
        let alice = game.deck("alice").unwrap();
        assert!(alice.exhausted.is_empty());
        assert_eq!(alice.last_refresh_index, Some(1));
        assert!(game.deck("bob").unwrap().exhausted.contains("step"));
        assert!(game.outcome().is_none());
    }

    #[test]
    fn answers_go_through_the_gate() {
        let engine = Engine::standard().unwrap();
        let mut game = Match::new(&engine, roster(), decks());
        let error = game
            .submit_interaction("alice", "throw:0:alice:bob", InteractionSubmission::Combo { continue_combo: true })
            .unwrap_err();
        assert!(matches!(error, MatchError::Interaction(_)));
    }

    fn iron_will(actor: &str, other: &str) -> Interaction {
        Interaction::pending(
            0,
            actor,
            other,
            InteractionDetail::HandTrigger {
                card_id: "iron-will".into(),
                trigger: HandTriggerKind::Hit,
                order: None,
                attack_hexes: Vec::new(),
                draw_count: 0,
                damage: 2,
            },
        )
        .with_id(hand_trigger_id("iron-will", 0, actor, other))
    }

    fn declined() -> InteractionSubmission {
        InteractionSubmission::HandTrigger {
            used: false,
            movement_card_ids: Vec::new(),
        }
    }

    #[test]
    fn simultaneous_triggers_are_answered_in_rank_order() {
        let engine = Engine::standard().unwrap();
        let mut decks = decks();
        if let Some(deck) = decks.get_mut("alice") {
            deck.discard(&["jab".to_string()], &[]).unwrap();
        }
        let mut game = Match::new(&engine, roster(), decks);
        game.interactions = vec![iron_will("bob", "alice"), iron_will("alice", "bob")];
        game.resolve();

        // Equal damage; Alice holds fewer cards and goes first.
        let order = |id: &str| match game.interactions().iter().find(|interaction| interaction.id == id) {
            Some(Interaction {
                detail: InteractionDetail::HandTrigger { order, .. },
                ..
            }) => *order,
            _ => None,
        };
        let alice = hand_trigger_id("iron-will", 0, "alice", "bob");
        let bob = hand_trigger_id("iron-will", 0, "bob", "alice");
        assert_eq!(order(&alice), Some(1));
        assert_eq!(order(&bob), Some(2));

        let error = game.submit_interaction("bob", &bob, declined()).unwrap_err();
        assert_eq!(
            error,
            MatchError::TriggerOutOfTurn {
                id: bob.clone(),
                active: alice.clone(),
            }
        );
        assert!(game.pending().any(|interaction| interaction.id == bob));

        game.submit_interaction("alice", &alice, declined()).unwrap();
        game.submit_interaction("bob", &bob, declined()).unwrap();
        assert_eq!(game.pending().count(), 0);
    }

    #[test]
    fn small_hand_draws_wait_for_movement_picks() {
        let engine = Engine::standard().unwrap();
        let mut decks = decks();
        if let Some(deck) = decks.get_mut("alice") {
            deck.discard(&["jab".to_string(), "guard".to_string()], &[]).unwrap();
        }
        // Both already refreshed at the open beat.
        for deck in decks.values_mut() {
            deck.last_refresh_index = Some(0);
        }
        let mut game = Match::new(&engine, roster(), decks);
        game.interactions.push(Interaction::resolved(
            0,
            "alice",
            "alice",
            InteractionDetail::Draw {
                count: 1,
                movement_count: 0,
            },
            InteractionResolution::Draw {
                movement_card_ids: Vec::new(),
            },
        ));
        game.resolve();

        let pending = game.pending().next().cloned().unwrap();
        assert_eq!(pending.id, "draw:0:alice:alice");
        assert!(matches!(pending.detail, InteractionDetail::Draw { movement_count: 1, .. }));
        assert_eq!(game.deck("alice").unwrap().ability_hand.len(), 2);
        assert!(matches!(
            game.submit_action("bob", &submission("step", "jab")),
            Err(MatchError::DecisionPending { .. })
        ));

        let pick = |ids: &[&str]| InteractionSubmission::Draw {
            movement_card_ids: ids.iter().map(ToString::to_string).collect(),
        };
        let error = game.submit_interaction("alice", &pending.id, pick(&["step"])).unwrap_err();
        assert!(matches!(error, MatchError::Interaction(InteractionError::CardNotOffered { .. })));

        game.submit_interaction("alice", &pending.id, pick(&["advance"])).unwrap();
        let alice = game.deck("alice").unwrap();
        assert_eq!(alice.ability_hand, vec!["parry", "spike", "trip"]);
        assert_eq!(alice.movement_hand(), vec!["step", "dash", "advance"]);

        game.resolve();
        assert_eq!(game.deck("alice").unwrap().ability_hand.len(), 3);
        assert_eq!(game.pending().count(), 0);
    }
}
