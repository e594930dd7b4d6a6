//! Board tokens during the action phase: arrows, fire, and platforms.
//!
//! # Invariants
//!
//! - An arrow that hits something is consumed in the same beat
//! - Arrows advance once per beat, after every actor has acted, and only
//!   arrows present when the beat started move

use std::collections::BTreeSet;

use tracing::debug;

use super::beat::Pass;
use super::modifiers::{
    dodges_on_wait, has_hammer, kbf_reduction, ABSORB, BURNING_STRIKE, IRON_WILL, REFLEX_DODGE, SINKING_SHOT,
};
use super::path::knockback_distance;
use super::special::{DiscardSource, TriggerOffer};
use super::ActorStep;
use crate::action::is_bracketed;
use crate::hex::{direction_index, Hex, LocalDirection};
use crate::interaction::{hand_trigger_id, Interaction, InteractionDetail};
use crate::timeline::HitWindow;

/// Discard forced by a used sinking shot.
const SINKING_SHOT_DISCARD: u32 = 2;

const ARROW_ACTION: &str = "arrow";

impl Pass<'_> {
    // =========================================================================
    // Arrows
    // =========================================================================

    /// Looses an arrow. A character standing on the spawn hex is hit at once.
    pub(super) fn spawn_arrow(&mut self, hex: Hex, facing: i32, owner: &str) {
        let occupant = self
            .scratch
            .occupancy
            .occupant(hex)
            .filter(|occupant| *occupant != owner)
            .map(str::to_string);
        match occupant {
            Some(target) => {
                let forward = LocalDirection::F.to_axial(facing);
                self.arrow_hit(&target, Some(owner), forward);
            }
            None => self.state.tokens.add_arrow(hex, facing, Some(owner)),
        }
    }

    /// Moves every arrow in `ids` one hex forward.
    pub(super) fn advance_arrows(&mut self, ids: &BTreeSet<String>) {
        if ids.is_empty() {
            return;
        }
        let limit = self.config().arrow_land_distance_limit;
        for mut arrow in self.state.tokens.take_arrows(ids) {
            let forward = LocalDirection::F.to_axial(arrow.facing);
            let next = arrow.position + forward;
            let owner = arrow.owner.clone().unwrap_or_default();
            let mut step = ActorStep::new(self.index, &owner, ARROW_ACTION, arrow.position);
            step.token_id = Some(arrow.id.clone());
            step.destination = next;
            step.path.push(next);
            step.attack_hexes.push(next);

            let target = self.scratch.occupancy.occupant(next).map(str::to_string);
            if let Some(target) = target {
                step.targets.push(target.clone());
                self.beat_steps.push(step);
                self.arrow_hit(&target, arrow.owner.as_deref(), forward);
                continue;
            }
            self.beat_steps.push(step);
            let out_of_range = self
                .board()
                .distance_to_land(next)
                .is_none_or(|distance| distance >= limit);
            if out_of_range {
                debug!(arrow = %arrow.id, "arrow left the board");
                continue;
            }
            arrow.position = next;
            self.state.tokens.restore(arrow);
        }
    }

    /// An arrow reaches a character travelling along `forward`.
    fn arrow_hit(&mut self, target: &str, owner: Option<&str>, forward: Hex) {
        let index = self.index;
        if !self.state.states.contains_key(target) {
            return;
        }
        let mut target_entry = self.entry(target);
        if dodges_on_wait(target_entry.as_ref()) {
            let before = self.signature(target);
            if let Some(swapped) = self.swap_cards(target) {
                self.register_blocks(target, &swapped);
                target_entry = Some(swapped);
                self.rerun_if_changed(target, &before, Some(target), None);
            }
        }

        let position = self.char_state(target).position;
        let block = self.scratch.block_at(position, direction_index(-forward)).cloned();
        if let Some(block) = block {
            if target_entry.as_ref().is_some_and(|entry| entry.has_active(REFLEX_DODGE)) {
                self.state.reflex_avoided.insert(target.to_string());
            }
            if block.card_id.as_deref() == Some(ABSORB) && is_bracketed(&block.action) {
                let damage = u32::try_from(self.config().arrow_damage).unwrap_or(0);
                self.queue_draw(target, damage);
            }
            debug!(target, beat = index, "arrow blocked");
            return;
        }

        if let Some(owner) = owner {
            let id = hand_trigger_id(SINKING_SHOT, index, owner, target);
            self.offer_trigger(
                TriggerOffer {
                    card_id: SINKING_SHOT,
                    actor: owner,
                    target,
                    source: Some(owner),
                    attack_hexes: Vec::new(),
                    draw_count: 0,
                },
                id,
            );
        }
        let iron_will_id = hand_trigger_id(IRON_WILL, index, target, owner.unwrap_or(target));
        let offered = self.offer_trigger(
            TriggerOffer {
                card_id: IRON_WILL,
                actor: target,
                target,
                source: owner,
                attack_hexes: Vec::new(),
                draw_count: 0,
            },
            iron_will_id.clone(),
        );
        let iron_will = self.state.find(&iron_will_id);
        let iron_will_pending = iron_will.is_some_and(Interaction::is_pending);
        let iron_will_used = iron_will.is_some_and(Interaction::trigger_used);
        if offered || iron_will_pending {
            self.state.halt_at(index);
            return;
        }

        let hammer = has_hammer(target_entry.as_ref());
        let before = self.signature(target);
        let damage = self.hit_damage(None, target, self.config().arrow_damage, target_entry.as_ref());
        self.add_damage(target, damage);
        let kbf = if iron_will_used {
            0
        } else {
            (self.config().arrow_kbf - kbf_reduction(target_entry.as_ref())).max(0)
        };
        let distance = knockback_distance(self.char_state(target).damage, kbf, self.config().knockback_divisor);
        let knocked = if distance > 0 {
            self.knock(target, forward, distance)
        } else {
            0
        };
        self.end_focus_on_hit(target, kbf > 0, knocked);
        self.stun(
            target,
            HitWindow {
                knocked_steps: knocked,
                preserve_action: true,
                ..HitWindow::default()
            },
        );
        self.rerun_if_changed(target, &before, owner, None);
        self.record_hit(target, damage, knocked);
        if let Some(owner) = owner {
            self.hammer_recoil(owner, target, hammer);
        }
        self.after_knockback(target, position, knocked);
        debug!(target, owner, damage, knocked, "arrow hit");
    }

    // =========================================================================
    // Fire
    // =========================================================================

    /// Ignites the hexes a burning-strike walk left behind last beat.
    pub(super) fn apply_delayed_fire(&mut self, index: usize) {
        let Some(fires) = self.state.delayed_fire.remove(&index) else {
            return;
        };
        let board = self.board();
        for (hex, owner) in fires {
            self.state.tokens.add_fire(hex, Some(&owner), board);
        }
    }

    /// Burns every character standing in fire.
    pub(super) fn burn(&mut self, index: usize) {
        if !self.state.tokens.any_fire() {
            return;
        }
        let fire_damage = self.config().fire_damage;
        for user_id in self.user_ids() {
            let Some(state) = self.state.states.get(&user_id) else {
                continue;
            };
            if !self.state.tokens.is_burning(state.position) || self.powers(&user_id).fire_damage_immune {
                continue;
            }
            self.add_damage(&user_id, fire_damage);
            self.record_hit(&user_id, fire_damage, 0);
            debug!(actor = %user_id, beat = index, "burned");
        }
    }

    /// Offers burning strike to every actor whose attacks landed this beat.
    pub(super) fn offer_burning_strikes(&mut self, index: usize) {
        let records: Vec<(String, Vec<Hex>)> = self
            .scratch
            .burning
            .iter()
            .filter(|(_, record)| record.has_hit)
            .map(|(user_id, record)| {
                let hexes: BTreeSet<Hex> = record.hexes.iter().copied().collect();
                (user_id.clone(), hexes.into_iter().collect())
            })
            .collect();
        for (user_id, attack_hexes) in records {
            let id = hand_trigger_id(BURNING_STRIKE, index, &user_id, &user_id);
            self.offer_trigger(
                TriggerOffer {
                    card_id: BURNING_STRIKE,
                    actor: &user_id,
                    target: &user_id,
                    source: None,
                    attack_hexes,
                    draw_count: 0,
                },
                id,
            );
        }
    }

    // =========================================================================
    // Hand-Trigger Effects
    // =========================================================================

    /// Applies hand triggers used at `index` whose effect lands on the board.
    pub(super) fn apply_trigger_effects(&mut self, index: usize) {
        let used: Vec<(String, String, String, Vec<Hex>)> = self
            .state
            .interactions
            .iter()
            .filter(|interaction| interaction.beat_index == index && interaction.trigger_used())
            .filter_map(|interaction| match &interaction.detail {
                InteractionDetail::HandTrigger {
                    card_id, attack_hexes, ..
                } => Some((
                    card_id.clone(),
                    interaction.actor.clone(),
                    interaction.target.clone(),
                    attack_hexes.clone(),
                )),
                _ => None,
            })
            .collect();
        let board = self.board();
        for (card_id, actor, target, attack_hexes) in used {
            match card_id.as_str() {
                BURNING_STRIKE => {
                    for hex in attack_hexes {
                        self.state.tokens.add_fire(hex, Some(&actor), board);
                    }
                }
                SINKING_SHOT => {
                    self.queue_discard(&target, SINKING_SHOT_DISCARD, DiscardSource::Opponent, true);
                }
                _ => {}
            }
        }
    }

    // =========================================================================
    // Platforms
    // =========================================================================

    /// Removes haven platforms consumed at `index`.
    pub(super) fn expire_platforms(&mut self, index: usize) {
        let expired: Vec<Hex> = self
            .state
            .interactions
            .iter()
            .filter(|interaction| !interaction.is_pending())
            .filter(|interaction| {
                matches!(
                    interaction.detail,
                    InteractionDetail::HavenPlatform {
                        consumed_beat: Some(beat),
                        ..
                    } if beat == index
                )
            })
            .filter_map(Interaction::haven_target)
            .collect();
        for hex in expired {
            self.state.tokens.remove_platform(hex);
        }
    }
}
