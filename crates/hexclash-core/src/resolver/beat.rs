//! The beat loop of one resolution pass.
//!
//! [`Pass`] owns a working copy of the timeline and everything derived from
//! it. `run` first replays resolved combo and guard decisions into the
//! timeline, then resolves beats from 0 until one is not ready or an
//! interaction halts the pass.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::modifiers::{is_entry_throw, ABSORB, HAVEN};
use super::path::Occupancy;
use super::state::{BeatScratch, ComboState, PassState, SetTracking};
use super::{ActorStep, Availability, ResolveInput, Resolution, Resolver};
use crate::action::{
    is_combo_action, is_open_action, label_is, ActionEntry, EntryFlags, RotationSource, FOCUS_ACTION, OPEN_ACTION,
    SKIPPED_COMBO_ACTION,
};
use crate::config::{CharacterPowers, EngineConfig};
use crate::hex::{normalize_degrees, rotation_degrees, Board, Terrain};
use crate::interaction::{hand_trigger_key, interaction_id, InteractionDetail, InteractionKind};
use crate::roster::Roster;
use crate::timeline::{CharacterState, Timeline};
use crate::token::TokenRegistry;

/// Replays of one beat before its latest result is accepted.
const MAX_BEAT_RERUNS: usize = 16;

/// One resolution pass.
pub(super) struct Pass<'r> {
    pub(super) resolver: &'r Resolver<'r>,
    pub(super) roster: Roster,
    pub(super) availability: BTreeMap<String, Availability>,
    /// Last beat of the calculated prefix when the pass started.
    pub(super) history_end: Option<usize>,
    pub(super) timeline: Timeline,
    pub(super) state: PassState,
    pub(super) tracking: BTreeMap<String, SetTracking>,
    pub(super) last_actions: BTreeMap<String, String>,
    pub(super) forced_guard_discards: BTreeMap<usize, BTreeSet<String>>,
    pub(super) rerun_causes: BTreeSet<String>,
    pub(super) last_calculated: Option<usize>,
    pub(super) steps: Vec<ActorStep>,
    pub(super) beat_steps: Vec<ActorStep>,
    pub(super) index: usize,
    pub(super) scratch: BeatScratch,
}

impl<'r> Pass<'r> {
    pub(super) fn new(resolver: &'r Resolver<'r>, input: ResolveInput) -> Self {
        let ResolveInput {
            roster,
            mut timeline,
            interactions,
            tokens,
            availability,
        } = input;
        let history_end = timeline.resolved_index();
        timeline.normalize(&roster);
        for index in 0..timeline.len() {
            timeline.clear_consequences(index);
        }

        let states = roster
            .iter()
            .map(|character| (character.user_id.clone(), CharacterState::initial(character)))
            .collect();
        let halt = interactions
            .iter()
            .filter(|interaction| interaction.is_pending())
            .map(|interaction| interaction.beat_index)
            .min();
        let hand_keys = interactions
            .iter()
            .filter_map(|interaction| {
                let card_id = interaction.trigger_card_id()?;
                Some(hand_trigger_key(card_id, interaction.beat_index, &interaction.actor))
            })
            .collect();
        let mut state = PassState {
            states,
            tokens: TokenRegistry::new(&tokens, resolver.board()),
            interactions,
            halt,
            hand_keys,
            ..PassState::default()
        };

        for owner in state.tokens.focus_owners() {
            if state.active_focus(&owner).is_none() {
                state.tokens.remove_focus_anchor(&owner);
            }
        }
        let anchors: Vec<_> = state
            .interactions
            .iter()
            .filter(|interaction| !interaction.is_pending())
            .filter_map(|interaction| match &interaction.detail {
                InteractionDetail::RewindFocus {
                    card_id,
                    anchor,
                    active: true,
                    ..
                } => Some((interaction.actor.clone(), *anchor, card_id.clone())),
                _ => None,
            })
            .collect();
        for (owner, anchor, card_id) in anchors {
            state.tokens.set_focus_anchor(anchor, &owner, &card_id);
        }

        Self {
            resolver,
            roster,
            availability,
            history_end,
            timeline,
            state,
            tracking: BTreeMap::new(),
            last_actions: BTreeMap::new(),
            forced_guard_discards: BTreeMap::new(),
            rerun_causes: BTreeSet::new(),
            last_calculated: None,
            steps: Vec::new(),
            beat_steps: Vec::new(),
            index: 0,
            scratch: BeatScratch::default(),
        }
    }

    pub(super) fn run(mut self) -> Resolution {
        self.prepare();
        let mut index = 0;
        while index < self.timeline.len() {
            if !self.resolve_beat(index) {
                break;
            }
            index += 1;
        }
        Resolution {
            timeline: self.timeline,
            tokens: self.state.tokens.into_tokens(),
            interactions: self.state.interactions,
            last_calculated: self.last_calculated,
            halt_index: self.state.halt,
            steps: self.steps,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub(super) fn board(&self) -> &'r Board {
        self.resolver.board()
    }

    pub(super) fn config(&self) -> &'r EngineConfig {
        self.resolver.config()
    }

    pub(super) fn is_history(&self, index: usize) -> bool {
        self.history_end.is_some_and(|end| index <= end)
    }

    pub(super) fn user_ids(&self) -> Vec<String> {
        self.roster.iter().map(|character| character.user_id.clone()).collect()
    }

    /// A character's action at a beat.
    pub(super) fn entry_at(&self, index: usize, user_id: &str) -> Option<ActionEntry> {
        self.timeline.entry(index, user_id).map(|slot| slot.entry.clone())
    }

    /// A character's action at the current beat.
    pub(super) fn entry(&self, user_id: &str) -> Option<ActionEntry> {
        self.entry_at(self.index, user_id)
    }

    pub(super) fn char_state(&self, user_id: &str) -> CharacterState {
        self.state.states.get(user_id).copied().unwrap_or_default()
    }

    pub(super) fn set_state(&mut self, user_id: &str, state: CharacterState) {
        self.state.states.insert(user_id.to_string(), state);
    }

    pub(super) fn powers(&self, user_id: &str) -> CharacterPowers {
        self.roster
            .get(user_id)
            .map(|character| character.powers)
            .unwrap_or_default()
    }

    pub(super) fn availability(&self, user_id: &str) -> Availability {
        self.availability.get(user_id).cloned().unwrap_or_default()
    }

    pub(super) fn occupancy(&self) -> Occupancy {
        Occupancy::from_positions(self.roster.iter().filter_map(|character| {
            self.state
                .states
                .get(&character.user_id)
                .map(|state| (character.user_id.as_str(), state.position))
        }))
    }

    // =========================================================================
    // Replayed Decisions
    // =========================================================================

    fn prepare(&mut self) {
        self.apply_combo_decisions();
        self.apply_guard_decisions();
    }

    /// A continued combo reopens its `CO` beat; a declined one marks it
    /// skipped.
    fn apply_combo_decisions(&mut self) {
        let decisions: Vec<(String, usize, bool)> = self
            .state
            .interactions
            .iter()
            .filter(|interaction| interaction.kind() == InteractionKind::Combo)
            .filter_map(|interaction| {
                let user_id = self.roster.user_id(&interaction.actor)?;
                Some((user_id.to_string(), interaction.beat_index, interaction.combo_continues()?))
            })
            .collect();
        for (user_id, beat, continues) in decisions {
            self.timeline.ensure_len(beat + 1);
            if let Some(slot) = self.timeline.entry_mut(beat, &user_id) {
                let entry = &mut slot.entry;
                if continues {
                    entry.action = OPEN_ACTION.to_string();
                    entry.priority = 0;
                    entry.flags.remove(EntryFlags::COMBO_SKIPPED);
                } else {
                    if !is_combo_action(&entry.action) {
                        entry.action = SKIPPED_COMBO_ACTION.to_string();
                    }
                    entry.flags.insert(EntryFlags::COMBO_SKIPPED);
                }
                entry.flags.remove(EntryFlags::COMBO_STARTER);
            }
            if continues {
                self.timeline.truncate_after(&user_id, beat);
            }
            debug!(actor = %user_id, beat, continues, "combo decision replayed");
        }
    }

    /// A continued guard copies its set once, then charges one discard at
    /// the repeat beat.
    fn apply_guard_decisions(&mut self) {
        let decisions: Vec<(usize, String, usize, Option<usize>)> = self
            .state
            .interactions
            .iter()
            .enumerate()
            .filter(|(_, interaction)| interaction.guard_continues() == Some(true))
            .filter_map(|(position, interaction)| {
                let user_id = self.roster.user_id(&interaction.actor)?;
                let InteractionDetail::GuardContinue { repeat_beat, .. } = &interaction.detail else {
                    return None;
                };
                Some((position, user_id.to_string(), interaction.beat_index, *repeat_beat))
            })
            .collect();
        for (position, user_id, beat, repeat_beat) in decisions {
            let repeat = match repeat_beat {
                Some(repeat) => repeat,
                None => {
                    let end = self.timeline.first_open_after(&user_id, beat);
                    if !self.repeat_guard(&user_id, beat, end) {
                        continue;
                    }
                    if let Some(InteractionDetail::GuardContinue { repeat_beat, .. }) = self
                        .state
                        .interactions
                        .get_mut(position)
                        .map(|interaction| &mut interaction.detail)
                    {
                        *repeat_beat = Some(end);
                    }
                    debug!(actor = %user_id, beat, repeat = end, "guard repeated");
                    end
                }
            };
            let discard_id = interaction_id(InteractionKind::Discard, repeat, &user_id, &user_id);
            if !self.state.contains(&discard_id) {
                self.forced_guard_discards.entry(repeat).or_default().insert(user_id);
            }
        }
    }

    /// Copies the character's entries `from..=end` to start at `end`.
    fn repeat_guard(&mut self, user_id: &str, from: usize, end: usize) -> bool {
        if end < from {
            return false;
        }
        let mut pattern = Vec::new();
        let mut last: Option<ActionEntry> = None;
        for index in from..=end {
            if let Some(entry) = self.entry_at(index, user_id) {
                last = Some(entry.clone());
                pattern.push(entry);
                continue;
            }
            if index != end {
                return false;
            }
            let mut implicit = last.clone().unwrap_or_default();
            implicit.action = OPEN_ACTION.to_string();
            implicit.rotation.clear();
            implicit.rotation_source = None;
            implicit.priority = 0;
            implicit.interaction = None;
            implicit.flags.remove(EntryFlags::COMBO_STARTER);
            pattern.push(implicit);
        }
        let state = self.char_state(user_id);
        let board = self.board();
        for (offset, entry) in pattern.into_iter().enumerate() {
            self.timeline.upsert(end + offset, user_id, entry, &state, board);
        }
        true
    }

    // =========================================================================
    // Beat Loop
    // =========================================================================

    /// Resolves one beat. Returns false when the pass stops here.
    fn resolve_beat(&mut self, index: usize) -> bool {
        self.index = index;
        self.rerun_causes.clear();
        if self.state.halt.is_some_and(|halt| halt < index) {
            self.write_uncalculated(index);
            return false;
        }

        self.end_parried_sets(index);
        self.state.tokens.reset_ephemeral_fire();
        self.apply_delayed_fire(index);
        let arrows = self.state.tokens.arrow_ids();
        self.apply_rewind_returns(index);
        let absorb_enders = self.track_action_sets(index);

        if self.pause_for_combo(index) {
            self.write_uncalculated(index);
            return false;
        }
        if !self.is_ready(index) && !self.has_forced_resolution(index) {
            self.raise_open_interactions(index);
            debug!(beat = index, "beat waits for actions");
            self.write_uncalculated(index);
            return false;
        }
        if !self.run_action_phase(index, &arrows, &absorb_enders) {
            self.write_uncalculated(index);
            return false;
        }
        if self.state.halt.is_some_and(|halt| halt <= index) {
            debug!(beat = index, "beat halted for a decision");
            self.write_uncalculated(index);
            return false;
        }
        self.write_calculated(index);
        true
    }

    /// Runs the action phase, replaying it while a mid-beat rewrite asks
    /// for it. Returns false if a replay found the beat no longer ready.
    fn run_action_phase(&mut self, index: usize, arrows: &BTreeSet<String>, absorb_enders: &BTreeSet<String>) -> bool {
        let snapshot = self.state.clone();
        let mut reruns = 0;
        loop {
            self.timeline.clear_consequences(index);
            self.beat_steps.clear();
            if reruns > 0 {
                self.state = snapshot.clone();
                if !self.is_ready(index) && !self.has_forced_resolution(index) {
                    self.raise_open_interactions(index);
                    return false;
                }
            }
            self.scratch = BeatScratch::new(self.occupancy());

            self.rotate(index);
            self.apply_forced_guard_discards(index);
            self.strike_parry_counters(index);
            for user_id in self.ordered_actors(index) {
                self.act(&user_id);
            }

            self.apply_trigger_effects(index);
            self.expire_platforms(index);
            self.offer_burning_strikes(index);
            self.advance_arrows(arrows);
            self.burn(index);
            for user_id in absorb_enders {
                if self.board().terrain(self.char_state(user_id).position) == Terrain::Abyss {
                    self.queue_draw(user_id, 1);
                }
            }

            if let Some(request) = self.scratch.rerun.take() {
                reruns += 1;
                if reruns <= MAX_BEAT_RERUNS {
                    debug!(
                        beat = index,
                        changed = %request.changed,
                        cause = %request.cause,
                        "beat replayed"
                    );
                    self.rerun_causes.insert(request.cause_key);
                    continue;
                }
                warn!(beat = index, reruns, "beat kept changing; last replay kept");
            }
            self.flush_discards(index);
            return true;
        }
    }

    /// Parry defenders end their set at the counter beat.
    fn end_parried_sets(&mut self, index: usize) {
        let Some(enders) = self.state.parry_enders.remove(&index) else {
            return;
        };
        let board = self.board();
        for defender in enders {
            let state = self.char_state(&defender);
            self.timeline.upsert(index, &defender, ActionEntry::open(), &state, board);
            let committed_returns: BTreeSet<usize> = self
                .state
                .interactions
                .iter()
                .filter(|interaction| {
                    interaction.kind() == InteractionKind::RewindReturn
                        && interaction.actor == defender
                        && interaction.returns_to_anchor() == Some(true)
                })
                .map(|interaction| interaction.beat_index)
                .collect();
            self.timeline.clear_after_until(&defender, index, |beat, entry| {
                entry.is_action_set_start() || committed_returns.contains(&beat)
            });
        }
    }

    /// Follows each character's action set into the current beat. Returns
    /// the characters whose absorb set just ended.
    fn track_action_sets(&mut self, index: usize) -> BTreeSet<String> {
        let board = self.board();
        let mut absorb_enders = BTreeSet::new();
        for user_id in self.user_ids() {
            let entry = self.entry_at(index, &user_id);
            let action = entry
                .as_ref()
                .map_or_else(|| OPEN_ACTION.to_string(), |entry| entry.action.clone());
            let previous = self
                .last_actions
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| OPEN_ACTION.to_string());
            let set_start = is_open_action(&previous)
                || entry
                    .as_ref()
                    .is_some_and(|entry| entry.flags.contains(EntryFlags::COMBO_STARTER));

            if is_open_action(&action) {
                if !is_open_action(&previous) && entry.as_ref().is_some_and(|entry| entry.has_passive(ABSORB)) {
                    absorb_enders.insert(user_id.clone());
                }
                self.state.combos.remove(&user_id);
                self.state.reflex_avoided.remove(&user_id);
                self.tracking.remove(&user_id);
            } else {
                let current = self.char_state(&user_id);
                if set_start {
                    self.state.reflex_avoided.remove(&user_id);
                }
                let next_combo = if set_start && !self.state.combos.contains_key(&user_id) {
                    self.find_next_combo(&user_id, index)
                } else {
                    None
                };
                let tracking = self.tracking.entry(user_id.clone()).or_default();
                if set_start || tracking.start_terrain.is_none() {
                    tracking.start_terrain = Some(board.terrain(current.position));
                }
                if set_start {
                    tracking.haven_skip = entry.as_ref().is_some_and(|entry| entry.has_passive(HAVEN))
                        && tracking.start_terrain == Some(Terrain::Abyss);
                }
                if set_start || tracking.facing.is_none() {
                    tracking.facing = Some(current.facing);
                }
                if set_start || tracking.rotation.is_none() {
                    if let Some(entry) = &entry {
                        let rotation = entry.rotation.trim();
                        if !rotation.is_empty() && entry.rotation_source != Some(RotationSource::Forced) {
                            tracking.rotation = Some(rotation.to_string());
                        }
                    }
                }
                if let Some((co_index, card_id)) = next_combo {
                    self.state.combos.insert(
                        user_id.clone(),
                        ComboState {
                            co_index,
                            hit: false,
                            card_id,
                            throw: false,
                        },
                    );
                }
            }
            self.last_actions.insert(user_id, action);
        }
        absorb_enders
    }

    /// The next `CO` of the character's set from `start`, with its card.
    pub(super) fn find_next_combo(&self, user_id: &str, start: usize) -> Option<(usize, String)> {
        for index in start..self.timeline.len() {
            let entry = self.timeline.entry(index, user_id)?;
            if is_open_action(&entry.entry.action) {
                return None;
            }
            if is_combo_action(&entry.entry.action) {
                let card_id = entry.entry.card_id.clone().filter(|card_id| !card_id.is_empty())?;
                return Some((index, card_id));
            }
        }
        None
    }

    /// Raises combo offers due at this beat. Returns true if one paused the
    /// pass.
    fn pause_for_combo(&mut self, index: usize) -> bool {
        let mut pause = false;
        for user_id in self.user_ids() {
            let Some(entry) = self.entry_at(index, &user_id) else {
                continue;
            };
            if !is_combo_action(&entry.action) {
                continue;
            }
            let history = self.is_history(index);
            let can_combo = self.availability(&user_id).combo;
            let Some(combo) = self.state.combos.get_mut(&user_id) else {
                continue;
            };
            if is_entry_throw(&entry, None) {
                combo.throw = true;
            }
            if combo.throw {
                self.state.combos.remove(&user_id);
                continue;
            }
            if combo.co_index != index || !combo.hit || entry.card_id.as_deref() != Some(combo.card_id.as_str()) {
                continue;
            }
            if entry.flags.contains(EntryFlags::COMBO_SKIPPED) || history {
                self.state.combos.remove(&user_id);
                continue;
            }
            if !can_combo {
                continue;
            }
            self.raise_combo(&user_id, entry.card_id.clone());
            self.state.combos.remove(&user_id);
            pause = true;
        }
        pause
    }

    /// Every character holds a non-open action.
    fn is_ready(&self, index: usize) -> bool {
        self.roster
            .iter()
            .all(|character| !self.timeline.is_open_at(index, &character.user_id))
    }

    /// Parry counters and guard discards resolve even when someone is open.
    fn has_forced_resolution(&self, index: usize) -> bool {
        self.state.parry_counters.get(&index).is_some_and(|counters| !counters.is_empty())
            || self
                .forced_guard_discards
                .get(&index)
                .is_some_and(|users| !users.is_empty())
    }

    /// Records focus anchors and return offers for characters left open.
    fn raise_open_interactions(&mut self, index: usize) {
        for user_id in self.user_ids() {
            let entry = self.entry_at(index, &user_id);
            if entry.as_ref().is_some_and(|entry| label_is(&entry.action, FOCUS_ACTION)) {
                self.ensure_focus(&user_id, index, entry.as_ref());
            }
            let open = entry
                .as_ref()
                .is_none_or(|entry| label_is(&entry.action, OPEN_ACTION));
            if open && self.state.active_focus(&user_id).is_some() {
                self.ensure_return(&user_id, index);
            }
        }
    }

    fn rotate(&mut self, index: usize) {
        for user_id in self.user_ids() {
            let Some(entry) = self.entry_at(index, &user_id) else {
                continue;
            };
            let delta = rotation_degrees(&entry.rotation);
            if delta == 0 {
                continue;
            }
            let mut state = self.char_state(&user_id);
            state.facing = normalize_degrees(state.facing + delta);
            self.set_state(&user_id, state);
            self.scratch.rotated.insert(user_id);
        }
    }

    /// Non-open actors by priority, ties by roster order.
    fn ordered_actors(&self, index: usize) -> Vec<String> {
        let Some(beat) = self.timeline.beat(index) else {
            return Vec::new();
        };
        let mut actors: Vec<(i32, usize, String)> = beat
            .iter()
            .filter(|slot| !is_open_action(&slot.entry.action))
            .map(|slot| {
                let order = self.roster.order_of(&slot.user_id).unwrap_or(usize::MAX);
                (slot.entry.priority, order, slot.user_id.clone())
            })
            .collect();
        actors.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        actors.into_iter().map(|(_, _, user_id)| user_id).collect()
    }

    // =========================================================================
    // Write-Back
    // =========================================================================

    fn write_beat(&mut self, index: usize, calculated: bool) {
        let board = self.board();
        let focus: BTreeMap<String, Option<String>> = self
            .user_ids()
            .into_iter()
            .map(|user_id| {
                let card_id = self.state.active_focus(&user_id).and_then(|focus| match &focus.detail {
                    InteractionDetail::RewindFocus { card_id, .. } => Some(card_id.clone()),
                    _ => None,
                });
                (user_id, card_id)
            })
            .collect();
        let Some(beat) = self.timeline.beat(index).map(<[_]>::len) else {
            return;
        };
        for position in 0..beat {
            let Some(user_id) = self.timeline.beat(index).map(|slots| slots[position].user_id.clone()) else {
                continue;
            };
            let state = self.state.states.get(&user_id).copied();
            if let Some(slot) = self.timeline.entry_mut(index, &user_id) {
                match state {
                    Some(state) => slot.apply_state(&state, board, calculated),
                    None => slot.calculated = calculated,
                }
                slot.focus_card_id = focus.get(&user_id).cloned().flatten();
            }
        }
    }

    fn write_calculated(&mut self, index: usize) {
        self.write_beat(index, true);
        self.timeline.sort_by_roster(&self.roster);
        self.last_calculated = Some(index);
        self.steps.append(&mut self.beat_steps);
    }

    /// Writes the current state onto every beat from `from` on, uncalculated.
    fn write_uncalculated(&mut self, from: usize) {
        for index in from..self.timeline.len() {
            self.write_beat(index, false);
        }
        self.timeline.sort_by_roster(&self.roster);
        self.beat_steps.clear();
    }
}
