//! The actor step: one character's action for one beat.
//!
//! # Architecture
//!
//! [`Pass::act`] first applies the entry-level card rules (swaps, markers,
//! draws, offers), then resolves each sub-token of the label from the
//! actor's starting hex:
//!
//! - `b` registers a block on the actor's hex facing the path's direction
//! - `a`/`c` strike the path's end: throw, smoke-bomb stun, or a normal hit
//! - `m`/`c` walk the path against the in-progress occupancy
//! - `j` lands on the path's end if it is free
//!
//! # Invariants
//!
//! - A character moves only through `Occupancy::relocate`, so occupancy
//!   always mirrors the state map within a beat
//! - A disabled character does not act for the rest of the beat

use tracing::debug;

use super::beat::Pass;
use super::modifiers::{
    converts_knockback, dodges_on_wait, gigantic_staff_label, has_hammer, healing_reduction, hit_discard,
    is_behind, is_entry_throw, is_throw_immune, kbf_reduction, starts_action_set, blocked_move_discard, ThrowContext,
    ABSORB, BOW_SHOT, BURNING_STRIKE, CROSS_SLASH, GIGANTIC_STAFF, GRAPPLING_HOOK, GUARD, HAMMER_RECOIL, HAVEN,
    HEALING_AMOUNT, HEALING_HARMONY, IRON_WILL, IRON_WILL_DRAW, JAB, PARRY, REFLEX_DODGE, SMOKE_BOMB,
    SMOKE_BOMB_STUN, STAB, STAB_BONUS, VENGEANCE,
};
use super::path::{attack_direction, knock_walk, knockback_distance, plan_hook_path, plan_path, PathPlan};
use super::special::{DiscardSource, TriggerOffer};
use super::state::{BlockSource, ParryCounter};
use super::ActorStep;
use crate::action::{
    is_combo_action, label_is, parse_action_tokens, ActionEntry, ActionKind, ActionToken, EntryFlags,
    DAMAGE_ICON_ACTION, MARKER_ACTION, WAIT_ACTION,
};
use crate::hex::{axial_direction, direction_index, rotation_magnitude, Hex, LocalDirection, Terrain};
use crate::interaction::{
    hand_trigger_id, interaction_id, FocusEndReason, Interaction, InteractionDetail, InteractionKind,
    InteractionResolution,
};
use crate::timeline::{HitConsequence, HitWindow};

/// What an attack sub-token is aimed at.
struct Strike<'a> {
    entry: &'a ActionEntry,
    token: &'a ActionToken,
    origin: Hex,
    destination: Hex,
    last_step: Option<Hex>,
    /// Direction from the target back towards the attacker.
    direction: Option<usize>,
}

impl Pass<'_> {
    // =========================================================================
    // Shared Hit Helpers
    // =========================================================================

    /// Adds damage to a character (negative heals, floored at zero).
    pub(super) fn add_damage(&mut self, user_id: &str, amount: i32) {
        let mut state = self.char_state(user_id);
        state.damage = (state.damage + amount).max(0);
        self.set_state(user_id, state);
    }

    /// Records a hit on the character's current-beat entry.
    pub(super) fn record_hit(&mut self, user_id: &str, damage_delta: i32, knockback_distance: u32) {
        let state = self.char_state(user_id);
        let board = self.board();
        self.timeline.record_consequence(
            self.index,
            user_id,
            HitConsequence {
                damage_delta,
                knockback_distance,
            },
            &state,
            board,
        );
    }

    /// Damage a hit deals after every modifier.
    pub(super) fn hit_damage(&self, attacker: Option<&str>, target: &str, base: i32, target_entry: Option<&ActionEntry>) -> i32 {
        let bonus = attacker.map_or(0, |attacker| self.powers(attacker).attack_damage_bonus);
        let reduction = healing_reduction(target_entry) + self.powers(target).damage_reduction;
        (base + bonus - reduction).max(0)
    }

    /// Pushes a character along `direction`, stopping before occupants.
    /// Returns the hexes moved.
    pub(super) fn knock(&mut self, user_id: &str, direction: Hex, distance: u32) -> u32 {
        let mut state = self.char_state(user_id);
        let (end, moved) = knock_walk(&self.scratch.occupancy, user_id, state.position, direction, distance);
        self.move_to(user_id, &mut state, end);
        moved
    }

    fn move_to(&mut self, user_id: &str, state: &mut crate::timeline::CharacterState, to: Hex) {
        if to == state.position {
            return;
        }
        self.scratch.occupancy.relocate(user_id, state.position, to);
        state.position = to;
        self.set_state(user_id, *state);
    }

    /// Hammer passive: the attacker takes recoil damage.
    pub(super) fn hammer_recoil(&mut self, attacker: &str, target: &str, hammer: bool) {
        if !hammer || attacker == target || !self.state.states.contains_key(attacker) {
            return;
        }
        self.add_damage(attacker, HAMMER_RECOIL);
        self.record_hit(attacker, HAMMER_RECOIL, 0);
    }

    /// Stun and knockback end a live rewind focus.
    pub(super) fn end_focus_on_hit(&mut self, user_id: &str, stunned: bool, knocked: u32) {
        if stunned || knocked > 0 {
            let reason = if stunned {
                FocusEndReason::Stun
            } else {
                FocusEndReason::Knockback
            };
            self.state.end_focus(user_id, self.index, reason);
        }
    }

    /// Knocked from land into the abyss: vengeance offer and knockback draws.
    pub(super) fn after_knockback(&mut self, user_id: &str, from: Hex, knocked: u32) {
        if knocked == 0 {
            return;
        }
        let board = self.board();
        let to = self.char_state(user_id).position;
        if board.terrain(from) == Terrain::Land && board.terrain(to) == Terrain::Abyss {
            let id = hand_trigger_id(VENGEANCE, self.index, user_id, user_id);
            self.offer_trigger(
                TriggerOffer {
                    card_id: VENGEANCE,
                    actor: user_id,
                    target: user_id,
                    source: None,
                    attack_hexes: Vec::new(),
                    draw_count: knocked,
                },
                id,
            );
        }
        let draws = self.powers(user_id).draw_on_knockback;
        if draws > 0 {
            self.queue_draw(user_id, draws);
        }
    }

    /// Registers every block sub-token of `entry` at the character's hex.
    pub(super) fn register_blocks(&mut self, user_id: &str, entry: &ActionEntry) {
        let state = self.char_state(user_id);
        for token in parse_action_tokens(&entry.action) {
            if token.kind != ActionKind::Block {
                continue;
            }
            let plan = plan_path(state.position, &token.steps, state.facing);
            self.register_block(user_id, entry, state.position, plan.last_step, state.facing);
        }
    }

    fn register_block(&mut self, user_id: &str, entry: &ActionEntry, hex: Hex, last_step: Option<Hex>, facing: i32) {
        let vector = last_step.unwrap_or_else(|| LocalDirection::F.to_axial(facing));
        let Some(direction) = direction_index(vector) else {
            return;
        };
        self.scratch.register_block(
            hex,
            direction,
            BlockSource {
                actor: user_id.to_string(),
                card_id: entry.card_id.clone(),
                passive_card_id: entry.passive_card_id.clone(),
                action: entry.action.clone(),
            },
        );
    }

    /// Marks a landed hit for the attacker's pending combo check.
    fn mark_combo_hit(&mut self, user_id: &str, card_id: Option<&str>) {
        let Some(card_id) = card_id.filter(|card_id| !card_id.is_empty()) else {
            return;
        };
        if let Some(combo) = self.state.combos.get_mut(user_id) {
            if combo.card_id == card_id {
                combo.hit = true;
            }
            return;
        }
        let Some((co_index, combo_card)) = self.find_next_combo(user_id, self.index) else {
            return;
        };
        if combo_card != card_id || self.is_history(co_index) {
            return;
        }
        self.state.combos.insert(
            user_id.to_string(),
            super::state::ComboState {
                co_index,
                hit: true,
                card_id: combo_card,
                throw: false,
            },
        );
    }

    // =========================================================================
    // Parry Counters
    // =========================================================================

    /// Schedules a parry counter for the beat after the block.
    fn queue_parry_counter(&mut self, counter: ParryCounter) {
        let beat = self.index + 1;
        let key = format!("{}:{beat}", counter.defender);
        if !self.state.parry_keys.insert(key) {
            return;
        }
        self.timeline.ensure_len(beat + 1);
        self.state
            .parry_enders
            .entry(beat)
            .or_default()
            .insert(counter.defender.clone());
        if !self.is_history(self.index) {
            let id = interaction_id(InteractionKind::Parry, beat, &counter.defender, &counter.attacker);
            if !self.state.contains(&id) {
                self.state.push(Interaction::resolved(
                    beat,
                    &counter.defender,
                    &counter.attacker,
                    InteractionDetail::Parry {
                        damage: counter.damage,
                        kbf: counter.kbf,
                        direction_index: counter.direction,
                    },
                    InteractionResolution::Parry,
                ));
            }
        }
        debug!(defender = %counter.defender, attacker = %counter.attacker, beat, "parry counter scheduled");
        self.state.parry_counters.entry(beat).or_default().push(counter);
    }

    /// Strikes every parry counter due at `index`.
    pub(super) fn strike_parry_counters(&mut self, index: usize) {
        let Some(counters) = self.state.parry_counters.remove(&index) else {
            return;
        };
        let divisor = self.config().knockback_divisor;
        for counter in counters {
            let attacker = counter.attacker.as_str();
            if !self.state.states.contains_key(attacker) {
                continue;
            }
            let attacker_entry = self.entry(attacker);
            let hammer = has_hammer(attacker_entry.as_ref());
            let damage = self.hit_damage(None, attacker, counter.damage, attacker_entry.as_ref());
            self.add_damage(attacker, damage);
            let base_kbf = (counter.kbf - kbf_reduction(attacker_entry.as_ref())).max(0);
            let base_distance = knockback_distance(self.char_state(attacker).damage, base_kbf, divisor);
            let mut distance = base_distance;
            if converts_knockback(attacker_entry.as_ref()) && base_distance > 0 {
                self.queue_discard(attacker, base_distance, DiscardSource::Own, false);
                distance = 0;
            }
            let knocked = match counter.direction.map(axial_direction) {
                Some(direction) if distance > 0 => self.knock(attacker, direction, distance),
                _ => 0,
            };
            let stunned = base_kbf == 1 || (base_kbf > 1 && base_distance > 0);
            self.end_focus_on_hit(attacker, stunned, knocked);
            if stunned {
                let before = self.signature(attacker);
                self.stun(
                    attacker,
                    HitWindow {
                        knocked_steps: knocked,
                        ..HitWindow::default()
                    },
                );
                self.rerun_if_changed(attacker, &before, Some(&counter.defender), None);
            }
            self.record_hit(attacker, damage, knocked);
            self.hammer_recoil(&counter.defender, attacker, hammer);
            self.scratch.disabled.insert(counter.attacker.clone());
            debug!(defender = %counter.defender, attacker, damage, knocked, "parry counter struck");
        }
    }

    // =========================================================================
    // Actor Step
    // =========================================================================

    /// Resolves one character's action at the current beat.
    pub(super) fn act(&mut self, user_id: &str) {
        let index = self.index;
        if self.scratch.disabled.contains(user_id) || !self.state.states.contains_key(user_id) {
            return;
        }
        let Some(mut entry) = self.entry(user_id) else {
            return;
        };
        if let Some(combo) = self.state.combos.get_mut(user_id) {
            if is_entry_throw(&entry, None) {
                combo.throw = true;
            }
        }

        if self.tracking.get(user_id).is_some_and(|tracking| tracking.haven_skip) {
            if entry.label().eq_ignore_ascii_case(WAIT_ACTION) {
                self.timeline.shift_left(user_id, index);
                if let Some(shifted) = self.entry(user_id) {
                    entry = shifted;
                }
                debug!(actor = user_id, beat = index, "haven skipped the first wait");
            }
            if let Some(tracking) = self.tracking.get_mut(user_id) {
                tracking.haven_skip = false;
            }
        }

        if entry.has_active(SMOKE_BOMB) && label_is(&entry.action, MARKER_ACTION) {
            let before = self.signature(user_id);
            if let Some(swapped) = self.swap_cards(user_id) {
                entry = swapped;
                self.rerun_if_changed(user_id, &before, Some(user_id), None);
            }
        }
        if entry.has_active(REFLEX_DODGE)
            && label_is(&entry.action, MARKER_ACTION)
            && self.state.reflex_avoided.contains(user_id)
        {
            self.force_end(user_id, &entry);
            if let Some(ended) = self.entry(user_id) {
                entry = ended;
            }
        }
        if entry.is_open() {
            self.scratch.executed.insert(user_id.to_string());
            return;
        }

        let state = self.char_state(user_id);
        let origin = state.position;
        let is_marker = label_is(&entry.action, MARKER_ACTION);

        if entry.has_active(BOW_SHOT) && is_marker {
            self.spawn_arrow(origin + LocalDirection::F.to_axial(state.facing), state.facing, user_id);
        }
        if entry.has_active(HAVEN) && is_marker && !self.place_platform(user_id, origin) {
            return;
        }
        if entry.has_active(IRON_WILL) && is_marker {
            self.queue_draw(user_id, IRON_WILL_DRAW);
        }
        if entry.has_active(JAB) && entry.is_bracketed() {
            self.queue_draw(user_id, 1);
        }
        if entry.has_active(HEALING_HARMONY) && is_marker {
            self.add_damage(user_id, -HEALING_AMOUNT);
        }
        if entry.has_passive(CROSS_SLASH) && starts_action_set(&entry) {
            self.add_damage(user_id, 1);
            self.record_hit(user_id, 1, 0);
        }
        self.offer_guard_continue(user_id, &entry);

        if is_combo_action(&entry.action) {
            self.check_combo(user_id, &entry);
            return;
        }

        if entry.has_passive(GIGANTIC_STAFF) && self.board().terrain(origin) == Terrain::Abyss {
            let relabeled = gigantic_staff_label(&entry.action);
            if relabeled != entry.action {
                if let Some(slot) = self.timeline.entry_mut(index, user_id) {
                    slot.entry.action.clone_from(&relabeled);
                }
                entry.action = relabeled;
            }
        }

        let mut step = ActorStep::new(index, user_id, &entry.action, origin);
        for token in parse_action_tokens(&entry.action) {
            self.resolve_token(user_id, &entry, &token, origin, &mut step);
        }
        step.destination = self.char_state(user_id).position;
        self.scratch.executed.insert(user_id.to_string());
        self.beat_steps.push(step);
    }

    /// Haven marker: offers the platform, or places the chosen one. Returns
    /// false while the decision is outstanding.
    fn place_platform(&mut self, user_id: &str, origin: Hex) -> bool {
        let index = self.index;
        let id = interaction_id(InteractionKind::HavenPlatform, index, user_id, user_id);
        let touching = origin.touching();
        let Some(existing) = self.state.find(&id) else {
            if self.is_history(index) {
                return true;
            }
            self.state.push(Interaction::pending(
                index,
                user_id,
                user_id,
                InteractionDetail::HavenPlatform {
                    touching,
                    consumed_beat: None,
                },
            ));
            self.state.halt_at(index);
            return false;
        };
        if existing.is_pending() {
            self.state.halt_at(index);
            return false;
        }
        let consumed = matches!(
            existing.detail,
            InteractionDetail::HavenPlatform {
                consumed_beat: Some(beat),
                ..
            } if beat <= index
        );
        if let Some(target) = existing.haven_target().filter(|target| !consumed && touching.contains(target)) {
            let board = self.board();
            self.state.tokens.add_platform(target, Some(user_id), board);
        }
        true
    }

    fn offer_guard_continue(&mut self, user_id: &str, entry: &ActionEntry) {
        let index = self.index;
        let allowed = !self.is_history(index) || self.history_end == Some(index);
        let repeating = self
            .forced_guard_discards
            .get(&index)
            .is_some_and(|users| users.contains(user_id));
        if !entry.has_active(GUARD)
            || !entry.is_bracketed()
            || !allowed
            || repeating
            || !self.availability(user_id).guard_continue
        {
            return;
        }
        let id = interaction_id(InteractionKind::GuardContinue, index, user_id, user_id);
        if !self.state.contains(&id) {
            self.state.push(Interaction::pending(
                index,
                user_id,
                user_id,
                InteractionDetail::GuardContinue {
                    card_id: entry.card_id.clone(),
                    repeat_beat: None,
                },
            ));
        }
        if self.state.find(&id).is_some_and(Interaction::is_pending) {
            self.state.halt_at(index);
        }
    }

    /// A `CO` reached during the action phase: offer or skip.
    fn check_combo(&mut self, user_id: &str, entry: &ActionEntry) {
        let index = self.index;
        if entry.flags.contains(EntryFlags::COMBO_SKIPPED) || self.is_history(index) {
            self.state.combos.remove(user_id);
            return;
        }
        let can_combo = self.state.combos.get(user_id).is_some_and(|combo| {
            combo.co_index == index
                && entry.card_id.as_deref() == Some(combo.card_id.as_str())
                && combo.hit
                && !combo.throw
        }) && self.availability(user_id).combo;
        if !can_combo {
            if let Some(slot) = self.timeline.entry_mut(index, user_id) {
                slot.entry.flags.insert(EntryFlags::COMBO_SKIPPED);
            }
            self.state.combos.remove(user_id);
            return;
        }
        self.raise_combo(user_id, entry.card_id.clone());
        self.state.combos.remove(user_id);
    }

    // =========================================================================
    // Sub-Tokens
    // =========================================================================

    fn resolve_token(&mut self, user_id: &str, entry: &ActionEntry, token: &ActionToken, origin: Hex, step: &mut ActorStep) {
        let facing = self.char_state(user_id).facing;
        let hook_charge = entry.has_active(GRAPPLING_HOOK) && token.kind == ActionKind::Charge && entry.is_bracketed();
        let plan: PathPlan = if hook_charge {
            plan_hook_path(origin, &token.steps, facing, self.board(), &self.scratch.occupancy, user_id)
        } else {
            plan_path(origin, &token.steps, facing)
        };
        let direction = direction_index(origin - plan.destination)
            .or_else(|| plan.last_step.and_then(|last| direction_index(-last)));

        if token.kind == ActionKind::Block {
            self.register_block(user_id, entry, origin, plan.last_step, facing);
            return;
        }
        if token.kind.is_attack() {
            let strike = Strike {
                entry,
                token,
                origin,
                destination: plan.destination,
                last_step: plan.last_step,
                direction,
            };
            self.strike(user_id, &strike, step);
        }
        if token.kind.walks() {
            self.walk(user_id, entry, token, origin, &plan, step);
        }
        if token.kind == ActionKind::Jump {
            let free = self
                .scratch
                .occupancy
                .occupant(plan.destination)
                .is_none_or(|occupant| occupant == user_id);
            if free {
                let mut state = self.char_state(user_id);
                self.move_to(user_id, &mut state, plan.destination);
                step.path.push(plan.destination);
            }
        }
    }

    fn walk(&mut self, user_id: &str, entry: &ActionEntry, token: &ActionToken, origin: Hex, plan: &PathPlan, step: &mut ActorStep) {
        let mut end = origin;
        let mut blocker = None;
        for &hex in &plan.positions {
            if let Some(occupant) = self.scratch.occupancy.occupant(hex).filter(|occupant| *occupant != user_id) {
                blocker = Some(occupant.to_string());
                break;
            }
            end = hex;
            step.path.push(hex);
        }
        if let Some(blocker) = blocker {
            let discard = blocked_move_discard(entry.passive_card_id.as_deref());
            if discard > 0 {
                self.queue_discard(&blocker, discard, DiscardSource::Opponent, false);
            }
            step.blocked_by.push(blocker);
        }
        let mut state = self.char_state(user_id);
        self.move_to(user_id, &mut state, end);
        if token.kind != ActionKind::Move || end == origin {
            return;
        }
        if entry.has_passive(BURNING_STRIKE) {
            self.state
                .delayed_fire
                .entry(self.index + 1)
                .or_default()
                .push((origin, user_id.to_string()));
        }
        if entry.has_passive(BOW_SHOT) {
            let tracking = self.tracking.get(user_id);
            let magnitude = tracking
                .and_then(|tracking| tracking.rotation.as_deref())
                .and_then(rotation_magnitude);
            if matches!(magnitude, Some(1 | 2)) {
                let facing = tracking.and_then(|tracking| tracking.facing).unwrap_or(state.facing);
                self.spawn_arrow(end, facing, user_id);
            }
        }
    }

    fn strike(&mut self, user_id: &str, strike: &Strike<'_>, step: &mut ActorStep) {
        let entry = strike.entry;
        let bracketed = entry.is_bracketed();
        step.attack_hexes.push(strike.destination);
        self.scratch
            .burning
            .entry(user_id.to_string())
            .or_default()
            .hexes
            .push(strike.destination);

        let target = self
            .scratch
            .occupancy
            .occupant(strike.destination)
            .map(str::to_string);
        let Some(target) = target else {
            self.ignite_strike(user_id, strike);
            return;
        };
        let target_position = self.char_state(&target).position;
        let context = ThrowContext {
            kind: strike.token.kind,
            start_terrain: self.tracking.get(user_id).and_then(|tracking| tracking.start_terrain),
            origin: strike.origin,
            target: Some(target_position),
        };
        let is_throw = is_entry_throw(entry, Some(&context));
        let mut target_entry = self.entry(&target);
        let mut block = self.scratch.block_at(strike.destination, strike.direction).cloned();
        let mut blocked_by_block = block.is_some() && !is_throw;

        if !blocked_by_block && dodges_on_wait(target_entry.as_ref()) {
            let before = self.signature(&target);
            if let Some(swapped) = self.swap_cards(&target) {
                self.register_blocks(&target, &swapped);
                target_entry = Some(swapped);
                block = self.scratch.block_at(strike.destination, strike.direction).cloned();
                blocked_by_block = block.is_some() && !is_throw;
                self.rerun_if_changed(&target, &before, Some(&target), None);
            }
        }
        let blocked = blocked_by_block || (is_throw && is_throw_immune(target_entry.as_ref()));
        if !is_throw && !blocked_by_block {
            self.mark_combo_hit(user_id, entry.card_id.as_deref());
        }

        let stab = entry.has_active(STAB) && bracketed && is_behind(strike.origin, &self.char_state(&target));
        let bonus = if stab { STAB_BONUS } else { 0 };
        let damage = entry.damage + bonus;
        let kbf = entry.kbf + bonus;

        if blocked_by_block {
            if target_entry.as_ref().is_some_and(|entry| entry.has_active(REFLEX_DODGE)) {
                self.state.reflex_avoided.insert(target.clone());
            }
            if damage > 0 {
                let (block_card, block_action) = match (&block, &target_entry) {
                    (Some(block), _) => (block.card_id.clone(), block.action.clone()),
                    (None, Some(entry)) => (entry.card_id.clone(), entry.action.clone()),
                    (None, None) => (None, String::new()),
                };
                let block_bracketed = crate::action::is_bracketed(&block_action);
                if block_card.as_deref() == Some(ABSORB) && block_bracketed {
                    self.queue_draw(&target, u32::try_from(damage).unwrap_or(0));
                }
                if block_card.as_deref() == Some(PARRY) && block_bracketed {
                    self.queue_parry_counter(ParryCounter {
                        defender: target.clone(),
                        attacker: user_id.to_string(),
                        damage: (damage * 2).max(0),
                        kbf: (kbf + 1).max(0),
                        direction: strike.direction,
                    });
                }
            }
            debug!(actor = user_id, target = %target, beat = self.index, "attack blocked");
        }
        if blocked {
            step.blocked_by.push(target);
            self.ignite_strike(user_id, strike);
            return;
        }

        step.targets.push(target.clone());
        let preserve_action = self.scratch.executed.contains(&target)
            && !target_entry
                .as_ref()
                .is_some_and(|entry| label_is(&entry.action, DAMAGE_ICON_ACTION));
        let hammer = has_hammer(target_entry.as_ref());
        let hit = Hit {
            target: &target,
            target_entry: target_entry.as_ref(),
            damage,
            kbf,
            preserve_action,
            hammer,
        };
        if entry.has_active(SMOKE_BOMB) && bracketed {
            self.smoke_stun(user_id, strike, &hit);
        } else if is_throw {
            self.throw(user_id, strike, &hit);
        } else {
            self.hit(user_id, strike, &hit);
        }
    }

    /// Burning strike ignites the struck hex when no hit lands.
    fn ignite_strike(&mut self, user_id: &str, strike: &Strike<'_>) {
        if strike.entry.has_active(BURNING_STRIKE) && strike.entry.is_bracketed() && strike.token.kind == ActionKind::Attack {
            let board = self.board();
            self.state.tokens.add_fire(strike.destination, Some(user_id), board);
        }
    }

    fn smoke_stun(&mut self, user_id: &str, strike: &Strike<'_>, hit: &Hit<'_>) {
        let target = hit.target;
        self.state.end_focus(target, self.index, FocusEndReason::Stun);
        let before = self.signature(target);
        let rotation = self
            .tracking
            .get(user_id)
            .and_then(|tracking| tracking.rotation.clone())
            .filter(|rotation| !rotation.is_empty())
            .unwrap_or_else(|| self.find_action_set_rotation(user_id, self.index));
        let stun = SMOKE_BOMB_STUN.saturating_sub(rotation_magnitude(&rotation).unwrap_or(0));
        self.stun(
            target,
            HitWindow {
                knocked_steps: stun.saturating_sub(1),
                preserve_action: hit.preserve_action,
                icon_count: Some(stun),
                stun_only: stun > 0,
                ..HitWindow::default()
            },
        );
        self.rerun_if_changed(target, &before, Some(user_id), Some(strike.entry.priority));
        self.hammer_recoil(user_id, target, hit.hammer);
        self.scratch.disabled.insert(target.to_string());
        debug!(actor = user_id, target, stun, "smoke bomb stun");
    }

    fn throw(&mut self, user_id: &str, strike: &Strike<'_>, hit: &Hit<'_>) {
        let index = self.index;
        let target = hit.target;
        let id = interaction_id(InteractionKind::Throw, index, user_id, target);
        let existing = self.state.find(&id);
        let exists = existing.is_some();
        let Some(direction) = existing.and_then(Interaction::throw_direction) else {
            if !exists {
                self.state.push(Interaction::pending(
                    index,
                    user_id,
                    target,
                    InteractionDetail::Throw {
                        damage: hit.damage,
                        kbf: hit.kbf,
                    },
                ));
            }
            self.scratch.disabled.insert(target.to_string());
            self.state.halt_at(index);
            return;
        };

        let before = self.signature(target);
        let damage = self.hit_damage(Some(user_id), target, hit.damage, hit.target_entry);
        self.add_damage(target, damage);
        if let Some(record) = self.scratch.burning.get_mut(user_id) {
            record.has_hit = true;
        }
        let from = self.char_state(target).position;
        let knocked = self.knock(target, axial_direction(direction), self.config().throw_distance);
        self.end_focus_on_hit(target, false, knocked);
        self.stun(
            target,
            HitWindow {
                knocked_steps: knocked,
                preserve_action: hit.preserve_action,
                ..HitWindow::default()
            },
        );
        self.rerun_if_changed(target, &before, Some(user_id), Some(strike.entry.priority));
        self.record_hit(target, damage, knocked);
        self.hammer_recoil(user_id, target, hit.hammer);
        self.scratch.disabled.insert(target.to_string());
        self.after_knockback(target, from, knocked);
        debug!(actor = user_id, target, direction, knocked, "throw landed");
    }

    fn hit(&mut self, user_id: &str, strike: &Strike<'_>, hit: &Hit<'_>) {
        let index = self.index;
        let target = hit.target;
        let entry = strike.entry;
        if let Some(record) = self.scratch.burning.get_mut(user_id) {
            record.has_hit = true;
        }

        let iron_will_id = hand_trigger_id(IRON_WILL, index, target, user_id);
        let offered = self.offer_trigger(
            TriggerOffer {
                card_id: IRON_WILL,
                actor: target,
                target,
                source: Some(user_id),
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

        if let Some(rule) = hit_discard(entry.card_id.as_deref()) {
            if entry.is_bracketed() && (!rule.center_only || strike.token.is_center_path()) {
                self.queue_discard(target, rule.count, DiscardSource::Opponent, true);
            }
        }

        let from = self.char_state(target).position;
        let damage = self.hit_damage(Some(user_id), target, hit.damage, hit.target_entry);
        self.add_damage(target, damage);
        if entry.has_active(BURNING_STRIKE) && entry.is_bracketed() && strike.token.kind == ActionKind::Attack {
            let board = self.board();
            self.state.tokens.add_fire(strike.destination, Some(user_id), board);
        }

        let mut knockback = attack_direction(strike.origin, strike.destination, strike.last_step);
        if entry.has_passive(GRAPPLING_HOOK) && strike.token.kind == ActionKind::Attack {
            knockback = self.grapple_flip(strike.origin, knockback, target);
        }

        let base_kbf = (hit.kbf - kbf_reduction(hit.target_entry)).max(0);
        let kbf = if iron_will_used { 0 } else { base_kbf };
        let attacker_damage = self.char_state(user_id).damage;
        let bonus = u32::try_from(self.powers(user_id).knockback_bonus(attacker_damage, kbf)).unwrap_or(0);
        let base_distance =
            knockback_distance(self.char_state(target).damage, kbf, self.config().knockback_divisor) + bonus;
        let mut distance = base_distance;
        if converts_knockback(hit.target_entry) && base_distance > 0 {
            self.queue_discard(target, base_distance, DiscardSource::Own, true);
            distance = 0;
        }
        let knocked = match knockback {
            Some(direction) if distance > 0 => self.knock(target, direction, distance),
            _ => 0,
        };

        let stunned = kbf == 1 || (kbf > 1 && base_distance > 0);
        self.end_focus_on_hit(target, stunned, knocked);
        if stunned {
            let before = self.signature(target);
            self.stun(
                target,
                HitWindow {
                    knocked_steps: knocked,
                    preserve_action: hit.preserve_action,
                    ..HitWindow::default()
                },
            );
            self.rerun_if_changed(target, &before, Some(user_id), Some(entry.priority));
        }
        self.record_hit(target, damage, knocked);
        self.hammer_recoil(user_id, target, hit.hammer);
        if stunned {
            self.scratch.disabled.insert(target.to_string());
        }
        self.after_knockback(target, from, knocked);
        debug!(actor = user_id, target, damage, knocked, stunned, "hit landed");
    }

    /// Grappling-hook passive: pulls the target to the hex behind the
    /// attacker and knocks it the other way.
    fn grapple_flip(&mut self, origin: Hex, attack: Option<Hex>, target: &str) -> Option<Hex> {
        let back = -attack?;
        let flip = origin + back;
        let free = self
            .scratch
            .occupancy
            .occupant(flip)
            .is_none_or(|occupant| occupant == target);
        if free {
            let mut state = self.char_state(target);
            self.move_to(target, &mut state, flip);
        }
        Some(back)
    }
}

/// The target side of a landed strike.
struct Hit<'a> {
    target: &'a str,
    target_entry: Option<&'a ActionEntry>,
    damage: i32,
    kbf: i32,
    preserve_action: bool,
    hammer: bool,
}
