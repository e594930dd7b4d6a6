//! Timeline rewrites and decision bookkeeping shared by the beat phases.
//!
//! Everything here mutates either the working timeline (swaps, forced ends,
//! rewind returns) or the interaction list (offers, draws, discards). Each
//! rewrite of the current beat goes through [`Pass::rerun_if_changed`] so
//! the beat is replayed with the new entry.

use std::collections::BTreeMap;

use tracing::debug;

use super::beat::Pass;
use super::modifiers::{is_discard_immune, HAVEN, REWIND};
use super::state::RerunRequest;
use crate::action::{
    is_open_action, label_is, ActionEntry, ActionListBuilder, RotationSource, FOCUS_ACTION, OPEN_ACTION,
};
use crate::hex::{normalize_degrees, rotation_degrees, Hex, Terrain};
use crate::interaction::{
    interaction_id, FocusEndReason, HandTriggerDefinition, Interaction, InteractionDetail, InteractionKind,
    InteractionResolution,
};
use crate::timeline::{BeatEntry, HitWindow};

/// Who made a character discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DiscardSource {
    /// The character's own card text.
    Own,
    /// An opponent's hit or trigger.
    Opponent,
}

/// A hand-trigger offer about to be raised.
#[derive(Debug, Clone)]
pub(super) struct TriggerOffer<'a> {
    pub card_id: &'static str,
    pub actor: &'a str,
    pub target: &'a str,
    pub source: Option<&'a str>,
    pub attack_hexes: Vec<Hex>,
    pub draw_count: u32,
}

impl Pass<'_> {
    // =========================================================================
    // Reruns
    // =========================================================================

    /// Identity of a character's entry at the current beat.
    pub(super) fn signature(&self, user_id: &str) -> String {
        self.timeline
            .entry(self.index, user_id)
            .map_or_else(|| "__missing__".to_string(), BeatEntry::signature)
    }

    /// Requests a replay of the current beat if `changed`'s entry no longer
    /// matches `before`.
    pub(super) fn rerun_if_changed(
        &mut self,
        changed: &str,
        before: &str,
        cause: Option<&str>,
        cause_priority: Option<i32>,
    ) {
        if self.signature(changed) == before {
            return;
        }
        let cause = cause.unwrap_or(changed);
        let cause_entry = self.entry(cause);
        let cause_priority = cause_priority
            .or_else(|| cause_entry.as_ref().map(|entry| entry.priority))
            .or_else(|| self.entry(changed).map(|entry| entry.priority))
            .unwrap_or(0);
        let cause_order = self
            .roster
            .order_of(cause)
            .or_else(|| self.roster.order_of(changed))
            .unwrap_or(usize::MAX);
        let cause_key = format!(
            "{cause}|{}|{}|{}|{cause_priority}",
            cause_entry.as_ref().and_then(|entry| entry.card_id.as_deref()).unwrap_or_default(),
            cause_entry
                .as_ref()
                .and_then(|entry| entry.passive_card_id.as_deref())
                .unwrap_or_default(),
            cause_entry.as_ref().map_or(OPEN_ACTION, |entry| entry.action.as_str()),
        );
        if self.rerun_causes.contains(&cause_key) {
            return;
        }
        self.scratch.request_rerun(RerunRequest {
            changed: changed.to_string(),
            cause: cause.to_string(),
            cause_priority,
            cause_order,
            cause_key,
        });
    }

    // =========================================================================
    // Set Rewrites
    // =========================================================================

    /// The rotation of the action set covering `index`: the selected one, else
    /// the first forced one.
    pub(super) fn find_action_set_rotation(&self, user_id: &str, index: usize) -> String {
        let open_at = |beat: usize| {
            self.timeline
                .entry(beat, user_id)
                .is_none_or(|slot| is_open_action(&slot.entry.action))
        };
        let mut start = 0;
        for beat in (0..=index).rev() {
            if open_at(beat) {
                start = beat + 1;
                break;
            }
        }
        let end = (index.max(start)..self.timeline.len())
            .find(|beat| open_at(*beat))
            .unwrap_or_else(|| self.timeline.len().saturating_sub(1));
        let mut fallback = String::new();
        for beat in start..=end {
            let Some(slot) = self.timeline.entry(beat, user_id) else {
                continue;
            };
            let rotation = slot.entry.rotation.trim();
            if rotation.is_empty() {
                continue;
            }
            if slot.entry.rotation_source == Some(RotationSource::Selected) {
                return rotation.to_string();
            }
            if fallback.is_empty() {
                fallback = rotation.to_string();
            }
        }
        fallback
    }

    /// Rebuilds the character's set from the current beat with active and
    /// passive swapped. Returns the new entry, or `None` if nothing changed.
    pub(super) fn swap_cards(&mut self, user_id: &str) -> Option<ActionEntry> {
        let source = self.entry(user_id)?;
        let catalog = self.resolver.catalog();
        let next_active = catalog.get(source.passive_card_id.as_deref()?)?;
        let next_passive = catalog.get(source.card_id.as_deref()?)?;
        if next_active.card_type == next_passive.card_type {
            return None;
        }
        let rotation = source.rotation.trim().to_string();
        let mut list = ActionListBuilder::new(catalog, self.resolver.effects()).build_cards(
            next_active,
            next_passive,
            &rotation,
            false,
        );
        if list.is_empty() {
            return None;
        }
        if !list.last().is_some_and(|entry| label_is(&entry.action, OPEN_ACTION)) {
            list.push(ActionEntry::open());
        }
        if let Some(first) = list.first_mut() {
            first.rotation.clone_from(&rotation);
            first.rotation_source = match source.rotation_source {
                Some(tag) => Some(tag),
                None if rotation.is_empty() => None,
                None => first.rotation_source,
            };
        }

        let mut state = self.char_state(user_id);
        let board = self.board();
        let swapped = self
            .timeline
            .apply_list_from(user_id, self.index, &list, &state, board, true, false)?;
        let delta = rotation_degrees(&swapped.rotation);
        if delta != 0 && !self.scratch.rotated.contains(user_id) {
            state.facing = normalize_degrees(state.facing + delta);
            self.set_state(user_id, state);
            self.scratch.rotated.insert(user_id.to_string());
        }
        let start_terrain = board.terrain(state.position);
        let rotation = self.find_action_set_rotation(user_id, self.index);
        let tracking = self.tracking.entry(user_id.to_string()).or_default();
        tracking.start_terrain = Some(start_terrain);
        tracking.haven_skip = swapped.has_passive(HAVEN) && start_terrain == Terrain::Abyss;
        tracking.facing = Some(state.facing);
        if !rotation.is_empty() {
            tracking.rotation = Some(rotation);
        }
        debug!(actor = user_id, beat = self.index, card = ?swapped.card_id, "cards swapped mid-set");
        Some(swapped)
    }

    /// Ends the character's action set at the current beat.
    pub(super) fn force_end(&mut self, user_id: &str, source: &ActionEntry) {
        let before = self.signature(user_id);
        let mut end = ActionEntry::open();
        end.card_id.clone_from(&source.card_id);
        end.passive_card_id.clone_from(&source.passive_card_id);
        let state = self.char_state(user_id);
        let board = self.board();
        if self
            .timeline
            .apply_list_from(user_id, self.index, &[end], &state, board, false, false)
            .is_some()
        {
            debug!(actor = user_id, beat = self.index, "action set ended early");
            self.rerun_if_changed(user_id, &before, None, None);
        }
    }

    /// Writes a stun window for the character from the current beat.
    pub(super) fn stun(&mut self, user_id: &str, window: HitWindow) {
        let state = self.char_state(user_id);
        let board = self.board();
        self.timeline.apply_hit_timeline(user_id, self.index, &state, board, window);
    }

    // =========================================================================
    // Rewind
    // =========================================================================

    /// The rewind card's actions after its focus, played on a return.
    pub(super) fn rewind_return_list(&self) -> Vec<ActionEntry> {
        let card = self.resolver.catalog().get(REWIND);
        let trailing: Vec<&str> = card
            .map(|card| {
                card.actions
                    .iter()
                    .position(|action| label_is(action, FOCUS_ACTION))
                    .map(|focus| card.actions[focus + 1..].iter().map(String::as_str).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        let actions = if trailing.is_empty() { vec![OPEN_ACTION] } else { trailing };
        let (priority, damage, kbf) = card.map_or((0, 0, 0), |card| (card.priority, card.damage, card.kbf));
        actions
            .into_iter()
            .map(|action| {
                let mut entry = ActionEntry::new(action).with_attack(priority, damage, kbf);
                entry.card_id = Some(REWIND.to_string());
                entry
            })
            .collect()
    }

    /// The character's entries from `start` already equal `list`.
    fn matches_window(&self, user_id: &str, start: usize, list: &[ActionEntry]) -> bool {
        !list.is_empty()
            && list.iter().enumerate().all(|(offset, expected)| {
                self.timeline.entry(start + offset, user_id).is_some_and(|slot| {
                    slot.entry.action == expected.action
                        && expected
                            .card_id
                            .as_ref()
                            .is_none_or(|card_id| slot.entry.card_id.as_ref() == Some(card_id))
                })
            })
    }

    /// The player already committed a non-rewind action inside the window.
    fn has_committed_non_rewind(&self, user_id: &str, start: usize, len: usize) -> bool {
        (start..start + len).any(|beat| {
            self.timeline.entry(beat, user_id).is_some_and(|slot| {
                !is_open_action(&slot.entry.action)
                    && slot
                        .entry
                        .card_id
                        .as_deref()
                        .is_some_and(|card_id| !card_id.is_empty() && card_id != REWIND)
            })
        })
    }

    /// Plays accepted rewind returns due at `index`.
    pub(super) fn apply_rewind_returns(&mut self, index: usize) {
        let due: Vec<(String, String, Hex, bool)> = self
            .state
            .interactions
            .iter()
            .filter(|interaction| {
                interaction.kind() == InteractionKind::RewindReturn
                    && interaction.beat_index == index
                    && interaction.returns_to_anchor() == Some(true)
                    && !self.state.applied_returns.contains(&interaction.id)
            })
            .filter_map(|interaction| match &interaction.detail {
                InteractionDetail::RewindReturn { anchor, applied, .. } => Some((
                    interaction.id.clone(),
                    interaction.actor.clone(),
                    *anchor,
                    *applied,
                )),
                _ => None,
            })
            .collect();
        let board = self.board();
        for (id, user_id, anchor, applied) in due {
            if !self.state.states.contains_key(&user_id) {
                continue;
            }
            let blocked = self.occupancy().blocks(anchor, &user_id);
            if blocked {
                let state = self.char_state(&user_id);
                let window = HitWindow {
                    knocked_steps: 0,
                    icon_count: Some(self.config().rewind_blocked_stun),
                    stun_only: true,
                    preserve_after_end: applied,
                    ..HitWindow::default()
                };
                self.timeline.apply_hit_timeline(&user_id, index, &state, board, window);
                debug!(actor = %user_id, beat = index, "rewind anchor occupied");
            } else {
                let mut state = self.char_state(&user_id);
                state.position = anchor;
                self.set_state(&user_id, state);
                let list = self.rewind_return_list();
                let replay = !applied
                    || (!self.matches_window(&user_id, index, &list)
                        && !self.has_committed_non_rewind(&user_id, index, list.len()));
                if replay {
                    self.timeline
                        .apply_list_from(&user_id, index, &list, &state, board, false, applied);
                }
                debug!(actor = %user_id, beat = index, "rewind return played");
            }
            self.state.end_focus(&user_id, index, FocusEndReason::Returned);
            if let Some(InteractionDetail::RewindReturn { applied, .. }) =
                self.state.find_mut(&id).map(|interaction| &mut interaction.detail)
            {
                *applied = true;
            }
            self.state.applied_returns.insert(id);
        }
    }

    /// Records a focus anchor for a character holding the rewind card's `F`.
    pub(super) fn ensure_focus(&mut self, user_id: &str, index: usize, entry: Option<&ActionEntry>) {
        if !entry.is_some_and(|entry| entry.has_active(REWIND)) || self.state.active_focus(user_id).is_some() {
            return;
        }
        let id = interaction_id(InteractionKind::RewindFocus, index, user_id, user_id);
        if self.state.contains(&id) || self.is_history(index) {
            return;
        }
        let anchor = self.char_state(user_id).position;
        self.state.push(Interaction::resolved(
            index,
            user_id,
            user_id,
            InteractionDetail::RewindFocus {
                card_id: REWIND.to_string(),
                anchor,
                active: true,
                ended_beat: None,
                end_reason: None,
            },
            InteractionResolution::RewindFocus,
        ));
        self.state.tokens.set_focus_anchor(anchor, user_id, REWIND);
    }

    /// Offers a return to an open character with a live focus.
    pub(super) fn ensure_return(&mut self, user_id: &str, index: usize) {
        let Some((card_id, anchor)) = self.state.active_focus(user_id).and_then(|focus| match &focus.detail {
            InteractionDetail::RewindFocus { card_id, anchor, .. } => Some((card_id.clone(), *anchor)),
            _ => None,
        }) else {
            return;
        };
        let id = interaction_id(InteractionKind::RewindReturn, index, user_id, user_id);
        if let Some(existing) = self.state.find(&id) {
            if existing.is_pending() {
                self.state.halt_at(index);
            }
            return;
        }
        if self.is_history(index) {
            return;
        }
        self.state.push(Interaction::pending(
            index,
            user_id,
            user_id,
            InteractionDetail::RewindReturn {
                card_id,
                anchor,
                applied: false,
            },
        ));
        self.state.halt_at(index);
    }

    // =========================================================================
    // Offers
    // =========================================================================

    /// Offers a combo continuation and halts.
    pub(super) fn raise_combo(&mut self, user_id: &str, card_id: Option<String>) {
        let index = self.index;
        let id = interaction_id(InteractionKind::Combo, index, user_id, user_id);
        if !self.state.contains(&id) {
            self.state
                .push(Interaction::pending(index, user_id, user_id, InteractionDetail::Combo { card_id }));
        }
        self.state.halt_at(index);
    }

    /// Raises a hand-trigger offer if the actor holds the card and has not
    /// been offered it at this beat. Returns true if one was raised.
    pub(super) fn offer_trigger(&mut self, offer: TriggerOffer<'_>, id: String) -> bool {
        let index = self.index;
        let key = crate::interaction::hand_trigger_key(offer.card_id, index, offer.actor);
        if self.is_history(index)
            || !self.availability(offer.actor).holds_trigger(offer.card_id)
            || self.state.hand_keys.contains(&key)
            || self.state.contains(&id)
        {
            return false;
        }
        let Some(definition) = HandTriggerDefinition::for_card(offer.card_id) else {
            return false;
        };
        let damage = self.char_state(offer.actor).damage;
        let mut interaction = Interaction::pending(
            index,
            offer.actor,
            offer.target,
            InteractionDetail::HandTrigger {
                card_id: offer.card_id.to_string(),
                trigger: definition.trigger,
                order: None,
                attack_hexes: offer.attack_hexes,
                draw_count: offer.draw_count,
                damage,
            },
        )
        .with_id(id);
        if let Some(source) = offer.source {
            interaction = interaction.with_source(source);
        }
        self.state.push(interaction);
        self.state.hand_keys.insert(key);
        self.state.halt_at(index);
        true
    }

    // =========================================================================
    // Draws and Discards
    // =========================================================================

    /// Adds to the character's draw at the current beat.
    pub(super) fn queue_draw(&mut self, user_id: &str, count: u32) {
        let index = self.index;
        if count == 0 || self.is_history(index) {
            return;
        }
        let id = interaction_id(InteractionKind::Draw, index, user_id, user_id);
        let first_touch = self.state.touched_draws.insert(id.clone());
        if let Some(existing) = self.state.find_mut(&id) {
            if let InteractionDetail::Draw { count: total, .. } = &mut existing.detail {
                *total = if first_touch { count } else { *total + count };
            }
            return;
        }
        self.state.push(Interaction::resolved(
            index,
            user_id,
            user_id,
            InteractionDetail::Draw {
                count,
                movement_count: 0,
            },
            InteractionResolution::Draw {
                movement_card_ids: Vec::new(),
            },
        ));
    }

    /// Queues a discard for the character at the current beat.
    ///
    /// Opponent-caused discards skip discard-immune entries and are reduced
    /// by the character's power.
    pub(super) fn queue_discard(&mut self, user_id: &str, count: u32, source: DiscardSource, forced: bool) {
        let mut count = count;
        if source == DiscardSource::Opponent {
            if is_discard_immune(self.entry(user_id).as_ref()) {
                debug!(actor = user_id, beat = self.index, "discard ignored by immunity");
                return;
            }
            count = count.saturating_sub(self.powers(user_id).opponent_discard_reduction);
        }
        if count == 0 {
            return;
        }
        let queue = if forced {
            &mut self.scratch.forced_discards
        } else {
            &mut self.scratch.discards
        };
        *queue.entry(user_id.to_string()).or_default() += count;
    }

    /// Guard repeats pay one card on their repeat beat.
    pub(super) fn apply_forced_guard_discards(&mut self, index: usize) {
        let users: Vec<String> = self
            .forced_guard_discards
            .get(&index)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default();
        for user_id in users {
            self.queue_discard(&user_id, 1, DiscardSource::Own, true);
        }
    }

    /// Turns the beat's queued discards into pending interactions.
    pub(super) fn flush_discards(&mut self, index: usize) {
        let mut combined: BTreeMap<String, (u32, bool)> = self
            .scratch
            .discards
            .iter()
            .map(|(user_id, count)| (user_id.clone(), (*count, false)))
            .collect();
        for (user_id, count) in &self.scratch.forced_discards {
            let slot = combined.entry(user_id.clone()).or_insert((0, false));
            slot.0 += count;
            slot.1 = true;
        }
        for (user_id, (count, forced)) in combined {
            if count == 0 || (!forced && self.is_history(index)) {
                continue;
            }
            let id = interaction_id(InteractionKind::Discard, index, &user_id, &user_id);
            if let Some(existing) = self.state.find_mut(&id) {
                if existing.is_pending() {
                    if let InteractionDetail::Discard { count: required } = &mut existing.detail {
                        *required = count;
                    }
                }
                continue;
            }
            self.state
                .push(Interaction::pending(index, &user_id, &user_id, InteractionDetail::Discard { count }));
            self.state.halt_at(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::action::ActionEntry;
    use crate::interaction::{InteractionDetail, InteractionKind};
    use crate::tests::helpers::{fixture, two_player_input};

    #[test]
    fn draws_accumulate_within_a_pass() {
        let fixture = fixture();
        let resolver = fixture.resolver();
        let mut pass = super::Pass::new(&resolver, two_player_input(&[], &[]));
        pass.queue_draw("alice", 2);
        pass.queue_draw("alice", 3);
        let draw = pass
            .state
            .interactions
            .iter()
            .find(|interaction| interaction.kind() == InteractionKind::Draw);
        assert!(matches!(draw.map(|draw| &draw.detail), Some(InteractionDetail::Draw { count: 5, .. })));
        assert!(draw.is_some_and(|draw| !draw.is_pending()));
    }

    #[test]
    fn discards_merge_and_force_wins() {
        let fixture = fixture();
        let resolver = fixture.resolver();
        let mut pass = super::Pass::new(&resolver, two_player_input(&[], &[]));
        pass.queue_discard("bob", 1, super::DiscardSource::Opponent, false);
        pass.queue_discard("bob", 2, super::DiscardSource::Own, true);
        pass.flush_discards(0);
        let discard = pass
            .state
            .interactions
            .iter()
            .find(|interaction| interaction.kind() == InteractionKind::Discard);
        assert!(matches!(
            discard.map(|discard| &discard.detail),
            Some(InteractionDetail::Discard { count: 3 })
        ));
        assert_eq!(pass.state.halt, Some(0));
    }

    #[test]
    fn spike_passive_ignores_opponent_discards() {
        let fixture = fixture();
        let resolver = fixture.resolver();
        let spiked = [ActionEntry::new("W").with_cards("step", "spike"), ActionEntry::open()];
        let mut pass = super::Pass::new(&resolver, two_player_input(&[], &spiked));
        pass.queue_discard("bob", 3, super::DiscardSource::Opponent, true);
        assert!(pass.scratch.forced_discards.is_empty());
        pass.queue_discard("bob", 1, super::DiscardSource::Own, true);
        assert_eq!(pass.scratch.forced_discards.get("bob"), Some(&1));
    }

    #[test]
    fn rewind_return_list_follows_the_focus() {
        let fixture = fixture();
        let resolver = fixture.resolver();
        let pass = super::Pass::new(&resolver, two_player_input(&[], &[]));
        let list = pass.rewind_return_list();
        assert!(!list.is_empty());
        assert!(list.iter().all(|entry| entry.has_active("rewind")));
    }
}
