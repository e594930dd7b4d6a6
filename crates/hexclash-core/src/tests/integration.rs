//! Integration tests for full resolution passes.
//!
//! Scenarios use hand-made entries so that only the rule under test runs:
//! - Movement against the in-progress occupancy
//! - Hits, knockback, and the stun window
//! - Blocks and parry counters
//! - Throws that stop for a direction
//! - Arrow and fire tokens

use crate::action::ActionEntry;
use crate::config::CharacterPowers;
use crate::hex::Hex;
use crate::interaction::{submit, InteractionKind, InteractionSubmission};
use crate::resolver::{ResolveInput, TimelineResolver};
use crate::roster::{Character, Roster};
use crate::timeline::Timeline;
use crate::token::{Token, TokenKind};

use super::helpers::{beat, damage, fixture, init_tracing, input_for, location, roster_at, two_player_input};

fn wait() -> ActionEntry {
    ActionEntry::new("W")
}

fn attack(label: &str, priority: i32, damage: i32, kbf: i32) -> ActionEntry {
    ActionEntry::new(label).with_attack(priority, damage, kbf)
}

// =============================================================================
// Readiness
// =============================================================================

#[test]
fn beat_waits_until_everyone_has_acted() {
    init_tracing();
    let engine = fixture();
    let resolution = engine.resolve(two_player_input(&[ActionEntry::new("m")], &[]));

    assert_eq!(resolution.last_calculated, None);
    assert!(!resolution.timeline.is_calculated(0));
    assert_eq!(location(&resolution, 0, "alice"), Hex::new(-1, 0));
    assert!(resolution.steps.is_empty());
}

#[test]
fn resolution_stops_at_the_first_open_beat() {
    let engine = fixture();
    let resolution = engine.resolve(two_player_input(&[ActionEntry::new("m")], &[wait()]));

    assert_eq!(resolution.last_calculated, Some(0));
    assert!(resolution.timeline.is_calculated(0));
    assert!(resolution.is_complete());
    assert_eq!(resolution.halt_index, None);
}

// =============================================================================
// Movement
// =============================================================================

mod movement {
    use super::*;

    #[test]
    fn forward_follows_facing() {
        let engine = fixture();
        let resolution = engine.resolve(two_player_input(&[ActionEntry::new("m")], &[ActionEntry::new("m")]));
        assert_eq!(location(&resolution, 0, "alice"), Hex::new(0, 0));
        // Bob resolves after Alice and finds the centre taken.
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(1, 0));
    }

    #[test]
    fn higher_priority_moves_first() {
        let engine = fixture();
        let alice = [attack("m", 5, 0, 0)];
        let bob = [attack("m", 10, 0, 0)];
        let resolution = engine.resolve(two_player_input(&alice, &bob));
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(0, 0));
        assert_eq!(location(&resolution, 0, "alice"), Hex::new(-1, 0));
    }

    #[test]
    fn walk_stops_before_an_occupant() {
        let engine = fixture();
        let resolution = engine.resolve(two_player_input(&[ActionEntry::new("3m")], &[wait()]));
        assert_eq!(location(&resolution, 0, "alice"), Hex::new(0, 0));
        let step = resolution.steps_at(0).find(|step| step.user_id == "alice").unwrap();
        assert_eq!(step.path, vec![Hex::new(0, 0)]);
        assert_eq!(step.blocked_by, vec!["bob".to_string()]);
    }

    #[test]
    fn jump_skips_over_occupants() {
        let engine = fixture();
        let roster = roster_at(Hex::new(-1, 0), Hex::new(0, 0));
        let resolution = engine.resolve(input_for(roster, &[ActionEntry::new("2j")], &[wait()]));
        assert_eq!(location(&resolution, 0, "alice"), Hex::new(1, 0));
    }

    #[test]
    fn terrain_follows_the_location() {
        let engine = fixture();
        let roster = roster_at(Hex::new(1, 0), Hex::new(-2, 0));
        let resolution = engine.resolve(input_for(roster, &[ActionEntry::new("2m")], &[wait()]));
        let alice = beat(&resolution, 0, "alice");
        assert_eq!(alice.location, Hex::new(3, 0));
        assert_eq!(alice.terrain, crate::hex::Terrain::Abyss);
    }
}

// =============================================================================
// Hits
// =============================================================================

mod hits {
    use super::*;

    fn adjacent() -> Roster {
        roster_at(Hex::new(0, 0), Hex::new(1, 0))
    }

    #[test]
    fn hit_deals_damage_and_knocks_back() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 1)], &[wait()]));

        assert_eq!(damage(&resolution, 0, "bob"), 3);
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(2, 0));
        let bob = beat(&resolution, 0, "bob");
        assert_eq!(bob.consequences.len(), 1);
        assert_eq!(bob.consequences[0].damage_delta, 3);
        assert_eq!(bob.consequences[0].knockback_distance, 1);
        let step = resolution.steps_at(0).find(|step| step.user_id == "alice").unwrap();
        assert_eq!(step.targets, vec!["bob".to_string()]);
        assert_eq!(step.attack_hexes, vec![Hex::new(1, 0)]);
    }

    #[test]
    fn hit_writes_a_stun_window() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 1)], &[wait()]));

        // One hex of knockback: two stunned beats, then open.
        assert!(beat(&resolution, 0, "bob").entry.label().eq_ignore_ascii_case("DamageIcon"));
        assert!(beat(&resolution, 1, "bob").entry.label().eq_ignore_ascii_case("DamageIcon"));
        assert!(beat(&resolution, 2, "bob").entry.is_open());
        assert!(resolution.timeline.entry(3, "bob").is_none());
    }

    #[test]
    fn zero_kbf_neither_moves_nor_stuns() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 2, 0)], &[wait()]));

        assert_eq!(damage(&resolution, 0, "bob"), 2);
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(1, 0));
        assert_eq!(beat(&resolution, 0, "bob").entry.label(), "W");
    }

    #[test]
    fn attack_on_an_empty_hex_hits_nobody() {
        let engine = fixture();
        let resolution = engine.resolve(two_player_input(&[attack("a", 10, 3, 1)], &[wait()]));

        assert_eq!(damage(&resolution, 0, "bob"), 0);
        let step = resolution.steps_at(0).find(|step| step.user_id == "alice").unwrap();
        assert!(step.targets.is_empty());
        assert_eq!(step.attack_hexes, vec![Hex::new(0, 0)]);
    }

    #[test]
    fn attacker_powers_raise_damage() {
        let engine = fixture();
        let roster = Roster::new(vec![
            Character::new("alice", Hex::new(0, 0), 180).with_powers(CharacterPowers {
                attack_damage_bonus: 2,
                ..CharacterPowers::default()
            }),
            Character::new("bob", Hex::new(1, 0), 0).with_powers(CharacterPowers {
                damage_reduction: 1,
                ..CharacterPowers::default()
            }),
        ]);
        let resolution = engine.resolve(input_for(roster, &[attack("a", 10, 3, 0)], &[wait()]));
        assert_eq!(damage(&resolution, 0, "bob"), 4);
    }

    #[test]
    fn re_resolving_keeps_calculated_beats() {
        let engine = fixture();
        let first = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 1)], &[wait()]));
        let again = engine.resolve(
            ResolveInput::new(adjacent(), first.timeline.clone()).with_interactions(first.interactions.clone()),
        );
        assert_eq!(again.timeline, first.timeline);
        assert_eq!(again.last_calculated, first.last_calculated);
    }
}

// =============================================================================
// Blocks
// =============================================================================

mod blocks {
    use super::*;

    fn adjacent() -> Roster {
        roster_at(Hex::new(0, 0), Hex::new(1, 0))
    }

    #[test]
    fn facing_block_stops_the_attack() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 1)], &[attack("b", 20, 0, 0)]));

        assert_eq!(damage(&resolution, 0, "bob"), 0);
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(1, 0));
        let step = resolution.steps_at(0).find(|step| step.user_id == "alice").unwrap();
        assert_eq!(step.blocked_by, vec!["bob".to_string()]);
        assert!(step.targets.is_empty());
    }

    #[test]
    fn block_registered_too_late_does_nothing() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 20, 3, 1)], &[attack("b", 10, 0, 0)]));
        assert_eq!(damage(&resolution, 0, "bob"), 3);
    }

    #[test]
    fn block_facing_away_does_nothing() {
        let engine = fixture();
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 0)], &[attack("Bb", 20, 0, 0)]));
        assert_eq!(damage(&resolution, 0, "bob"), 3);
    }

    #[test]
    fn parry_counters_next_beat() {
        let engine = fixture();
        let parry = attack("[b]", 20, 0, 0).with_cards("parry", "step");
        let resolution = engine.resolve(input_for(adjacent(), &[attack("a", 10, 3, 1)], &[parry]));

        let counter = resolution
            .interactions
            .iter()
            .find(|interaction| interaction.kind() == InteractionKind::Parry)
            .expect("parry recorded");
        assert_eq!(counter.beat_index, 1);
        assert_eq!(counter.actor, "bob");
        assert_eq!(counter.target, "alice");
        assert!(!counter.is_pending());

        // Double damage, kbf 2 at 6 damage: one hex away from Bob.
        assert_eq!(resolution.last_calculated, Some(1));
        assert_eq!(damage(&resolution, 1, "alice"), 6);
        assert_eq!(location(&resolution, 1, "alice"), Hex::new(-1, 0));
        assert!(beat(&resolution, 1, "bob").entry.is_open());
    }

    #[test]
    fn throws_pass_through_a_facing_block() {
        let engine = fixture();
        let throw = attack("a", 10, 2, 1).with_cards("hip-throw", "step");
        let first = engine.resolve(input_for(adjacent(), &[throw], &[attack("b", 20, 0, 0)]));
        assert_eq!(first.pending().count(), 1);

        let mut interactions = first.interactions.clone();
        submit(
            &mut interactions,
            "alice",
            "throw:0:alice:bob",
            InteractionSubmission::Throw { direction_index: 2 },
            None,
        )
        .unwrap();
        let second = engine.resolve(ResolveInput::new(adjacent(), first.timeline.clone()).with_interactions(interactions));

        assert!(second.is_complete());
        assert_eq!(damage(&second, 0, "bob"), 2);
        assert_eq!(location(&second, 0, "bob"), Hex::new(1, -2));
    }

    #[test]
    fn throw_immune_passive_ignores_the_throw() {
        let engine = fixture();
        let throw = attack("a", 10, 2, 1).with_cards("hip-throw", "step");
        let guard = attack("b", 20, 0, 0).with_cards("step", "tackle");
        let resolution = engine.resolve(input_for(adjacent(), &[throw], &[guard]));

        assert_eq!(resolution.pending().count(), 0);
        assert!(!resolution
            .interactions
            .iter()
            .any(|interaction| interaction.kind() == InteractionKind::Throw));
        assert_eq!(resolution.last_calculated, Some(0));
        assert_eq!(damage(&resolution, 0, "bob"), 0);
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(1, 0));
    }
}

// =============================================================================
// Throws
// =============================================================================

mod throws {
    use super::*;

    #[test]
    fn throw_waits_for_a_direction_then_lands() {
        init_tracing();
        let engine = fixture();
        let roster = roster_at(Hex::new(0, 0), Hex::new(1, 0));
        let throw = attack("a", 10, 2, 1).with_cards("hip-throw", "step");
        let first = engine.resolve(input_for(roster.clone(), &[throw], &[wait()]));

        assert_eq!(first.halt_index, Some(0));
        assert_eq!(first.last_calculated, None);
        let pending: Vec<_> = first.pending().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "throw:0:alice:bob");
        assert_eq!(damage(&first, 0, "bob"), 0);

        let mut interactions = first.interactions.clone();
        submit(
            &mut interactions,
            "alice",
            "throw:0:alice:bob",
            InteractionSubmission::Throw { direction_index: 2 },
            None,
        )
        .unwrap();
        let second = engine.resolve(ResolveInput::new(roster, first.timeline.clone()).with_interactions(interactions));

        assert!(second.is_complete());
        assert_eq!(second.last_calculated, Some(0));
        assert_eq!(damage(&second, 0, "bob"), 2);
        // Two hexes along direction 2, the (0, -1) axis.
        assert_eq!(location(&second, 0, "bob"), Hex::new(1, -2));
        assert_eq!(beat(&second, 0, "bob").consequences[0].knockback_distance, 2);
    }

    #[test]
    fn only_the_thrower_may_answer() {
        let engine = fixture();
        let roster = roster_at(Hex::new(0, 0), Hex::new(1, 0));
        let throw = attack("a", 10, 2, 1).with_cards("hip-throw", "step");
        let mut interactions = engine.resolve(input_for(roster, &[throw], &[wait()])).interactions;
        let error = submit(
            &mut interactions,
            "bob",
            "throw:0:alice:bob",
            InteractionSubmission::Throw { direction_index: 2 },
            None,
        )
        .unwrap_err();
        assert!(matches!(error, crate::error::InteractionError::NotOwner { .. }));
        assert!(interactions[0].is_pending());
    }
}

// =============================================================================
// Tokens
// =============================================================================

mod tokens {
    use super::*;

    fn token(id: &str, kind: TokenKind, position: Hex, facing: i32, owner: Option<&str>) -> Token {
        Token {
            id: id.to_string(),
            kind,
            position,
            facing,
            owner: owner.map(str::to_string),
            card_id: None,
        }
    }

    #[test]
    fn arrow_hits_the_first_character_ahead() {
        let engine = fixture();
        let roster = roster_at(Hex::new(-2, 0), Hex::new(1, 0));
        let board = engine.config().board();
        let mut timeline = Timeline::seed(&roster, &board, 1);
        timeline.apply_action_set(&roster, &board, "alice", &[wait()]);
        timeline.apply_action_set(&roster, &board, "bob", &[wait()]);
        let arrow = token("arrow:0", TokenKind::Arrow, Hex::new(0, 0), 180, Some("alice"));
        let resolution = engine.resolve(ResolveInput::new(roster, timeline).with_tokens(vec![arrow]));

        assert_eq!(damage(&resolution, 0, "bob"), engine.config().arrow_damage);
        assert_eq!(location(&resolution, 0, "bob"), Hex::new(2, 0));
        assert!(resolution.tokens.iter().all(|token| token.kind != TokenKind::Arrow));
        let flight = resolution.steps_at(0).find(|step| step.token_id.is_some()).unwrap();
        assert_eq!(flight.targets, vec!["bob".to_string()]);
        // Arrow stuns start after the current action.
        assert_eq!(beat(&resolution, 0, "bob").entry.label(), "W");
    }

    #[test]
    fn arrow_flies_on_when_nobody_is_ahead() {
        let engine = fixture();
        let arrow = token("arrow:0", TokenKind::Arrow, Hex::new(0, 1), 180, Some("alice"));
        let input = two_player_input(&[wait()], &[wait()]).with_tokens(vec![arrow]);
        let resolution = engine.resolve(input);
        let arrow = resolution
            .tokens
            .iter()
            .find(|token| token.kind == TokenKind::Arrow)
            .expect("arrow still flying");
        assert_eq!(arrow.position, Hex::new(1, 1));
    }

    #[test]
    fn fire_burns_standing_characters() {
        let engine = fixture();
        let roster = Roster::new(vec![
            Character::new("alice", Hex::new(-1, 0), 180).with_powers(CharacterPowers {
                fire_damage_immune: true,
                ..CharacterPowers::default()
            }),
            Character::new("bob", Hex::new(1, 0), 0),
        ]);
        let fires = vec![
            token("fire-hex:0", TokenKind::FireHex, Hex::new(-1, 0), 0, None),
            token("fire-hex:1", TokenKind::FireHex, Hex::new(1, 0), 0, None),
        ];
        let resolution = engine.resolve(input_for(roster, &[wait()], &[wait()]).with_tokens(fires));

        assert_eq!(damage(&resolution, 0, "bob"), engine.config().fire_damage);
        assert_eq!(damage(&resolution, 0, "alice"), 0);
        assert_eq!(
            resolution.tokens.iter().filter(|token| token.kind == TokenKind::FireHex).count(),
            2
        );
    }

    #[test]
    fn fire_in_the_abyss_is_dropped() {
        let engine = fixture();
        let fire = token("fire-hex:0", TokenKind::FireHex, Hex::new(5, 0), 0, None);
        let resolution = engine.resolve(two_player_input(&[wait()], &[wait()]).with_tokens(vec![fire]));
        assert!(resolution.tokens.is_empty());
    }
}

// =============================================================================
// Resolver Seam
// =============================================================================

#[test]
fn resolver_serves_as_a_trait_object() {
    let engine = fixture();
    let resolver: Box<dyn TimelineResolver + '_> = Box::new(engine.resolver());
    let resolution = resolver.resolve(two_player_input(&[ActionEntry::new("m")], &[wait()]));
    assert_eq!(location(&resolution, 0, "alice"), Hex::new(0, 0));
}
