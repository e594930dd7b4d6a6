//! The beat timeline: one entry per character per beat.
//!
//! The timeline is the durable state of a match. Players write their action
//! sets into it, and the resolver writes resolved board state (location,
//! facing, accumulated damage) back onto every entry.
//!
//! # Architecture
//!
//! - A beat is a `Vec<BeatEntry>` kept in roster order.
//! - A [`BeatEntry`] flattens the submitted [`ActionEntry`] and adds the
//!   resolved snapshot of its character.
//! - A missing entry means the same as an open (`E`) entry.
//!
//! # Invariants
//!
//! - Each character has at most one entry per beat.
//! - [`Timeline::apply_action_set`] never writes into the calculated prefix,
//!   and never touches another character's entries.
//! - [`Timeline::resolved_index`] is the last beat of the prefix in which
//!   every beat is non-empty and fully calculated.

use serde::{Deserialize, Serialize};

use crate::action::{
    is_open_action, label_is, ActionEntry, EntryFlags, RotationSource, DAMAGE_ICON_ACTION, OPEN_ACTION,
};
use crate::hex::{Board, Hex, Terrain};
use crate::roster::{Character, Roster};

// =============================================================================
// Entries
// =============================================================================

/// Board state of one character at one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterState {
    /// Current hex.
    pub position: Hex,
    /// Facing in degrees.
    pub facing: i32,
    /// Accumulated damage.
    pub damage: i32,
}

impl CharacterState {
    /// The state a character starts the match in.
    #[must_use]
    pub fn initial(character: &Character) -> Self {
        Self {
            position: character.position,
            facing: character.facing,
            damage: 0,
        }
    }
}

/// Something that happened to a character during a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitConsequence {
    /// Damage added (negative for heals).
    pub damage_delta: i32,
    /// Hexes of knockback.
    pub knockback_distance: u32,
}

/// One character's slot in a beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatEntry {
    /// The character's user id.
    pub user_id: String,
    /// The submitted action.
    #[serde(flatten)]
    pub entry: ActionEntry,
    /// Resolved location.
    pub location: Hex,
    /// Resolved facing.
    pub facing: i32,
    /// Accumulated damage after this beat.
    pub total_damage: i32,
    /// Terrain under `location`.
    pub terrain: Terrain,
    /// Whether the beat has been resolved for this entry.
    pub calculated: bool,
    /// Card of the rewind focus live at this beat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_card_id: Option<String>,
    /// Hits taken during this beat.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consequences: Vec<HitConsequence>,
}

impl BeatEntry {
    /// Creates an uncalculated entry from a character snapshot.
    #[must_use]
    pub fn new(user_id: &str, entry: ActionEntry, state: &CharacterState, board: &Board) -> Self {
        Self {
            user_id: user_id.to_string(),
            entry,
            location: state.position,
            facing: state.facing,
            total_damage: state.damage,
            terrain: board.terrain(state.position),
            calculated: false,
            focus_card_id: None,
            consequences: Vec::new(),
        }
    }

    /// Writes a resolved snapshot onto the entry.
    pub fn apply_state(&mut self, state: &CharacterState, board: &Board, calculated: bool) {
        self.location = state.position;
        self.facing = state.facing;
        self.total_damage = state.damage;
        self.terrain = board.terrain(state.position);
        self.calculated = calculated;
    }

    /// The snapshot recorded on the entry.
    #[must_use]
    pub fn state(&self) -> CharacterState {
        CharacterState {
            position: self.location,
            facing: self.facing,
            damage: self.total_damage,
        }
    }

    /// Identity of the action, used to detect mid-beat rewrites.
    #[must_use]
    pub fn signature(&self) -> String {
        let entry = &self.entry;
        format!(
            "{}|{}|{}|{}|{}|{:?}|{:?}|{:?}",
            entry.action,
            entry.rotation,
            entry.priority,
            entry.card_id.as_deref().unwrap_or_default(),
            entry.passive_card_id.as_deref().unwrap_or_default(),
            entry.rotation_source,
            entry.flags,
            entry.interaction,
        )
    }

    /// First entry of an action set: a selected rotation or a combo start.
    #[must_use]
    pub fn is_action_set_start(&self) -> bool {
        self.entry.rotation_source == Some(RotationSource::Selected)
            || self.entry.flags.contains(EntryFlags::COMBO_STARTER)
    }

    fn replace_action(&mut self, entry: ActionEntry) {
        self.entry = entry;
        self.consequences.clear();
    }
}

/// Options for [`Timeline::apply_hit_timeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitWindow {
    /// Hexes the hit knocked the character.
    pub knocked_steps: u32,
    /// Keep the current beat's action and start the window next beat.
    pub preserve_action: bool,
    /// Stun beats to write instead of `knocked_steps + 1`.
    pub icon_count: Option<u32>,
    /// Mark the window as stun without knockback.
    pub stun_only: bool,
    /// Leave entries after the window in place.
    pub preserve_after_end: bool,
}

// =============================================================================
// Timeline
// =============================================================================

/// Ordered beats of a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    beats: Vec<Vec<BeatEntry>>,
}

impl Timeline {
    /// Wraps existing beats.
    #[must_use]
    pub fn from_beats(beats: Vec<Vec<BeatEntry>>) -> Self {
        Self { beats }
    }

    /// Creates `count` beats of open entries for every character.
    #[must_use]
    pub fn seed(roster: &Roster, board: &Board, count: usize) -> Self {
        let beat: Vec<BeatEntry> = roster
            .iter()
            .map(|character| {
                BeatEntry::new(
                    &character.user_id,
                    ActionEntry::open(),
                    &CharacterState::initial(character),
                    board,
                )
            })
            .collect();
        Self {
            beats: vec![beat; count],
        }
    }

    /// Number of beats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// Returns true if there are no beats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// All beats.
    #[must_use]
    pub fn beats(&self) -> &[Vec<BeatEntry>] {
        &self.beats
    }

    /// One beat.
    #[must_use]
    pub fn beat(&self, index: usize) -> Option<&[BeatEntry]> {
        self.beats.get(index).map(Vec::as_slice)
    }

    /// Consumes the timeline, returning the beats.
    #[must_use]
    pub fn into_beats(self) -> Vec<Vec<BeatEntry>> {
        self.beats
    }

    /// Appends empty beats until `len` beats exist.
    pub fn ensure_len(&mut self, len: usize) {
        if self.beats.len() < len {
            self.beats.resize_with(len, Vec::new);
        }
    }

    /// A character's entry at a beat.
    #[must_use]
    pub fn entry(&self, index: usize, user_id: &str) -> Option<&BeatEntry> {
        self.beats.get(index)?.iter().find(|entry| entry.user_id == user_id)
    }

    /// A character's entry at a beat, mutably.
    pub fn entry_mut(&mut self, index: usize, user_id: &str) -> Option<&mut BeatEntry> {
        self.beats.get_mut(index)?.iter_mut().find(|entry| entry.user_id == user_id)
    }

    /// Returns true if the character has no entry or an open one.
    #[must_use]
    pub fn is_open_at(&self, index: usize, user_id: &str) -> bool {
        self.entry(index, user_id)
            .is_none_or(|entry| is_open_action(&entry.entry.action))
    }

    /// The action signature of a character at a beat.
    #[must_use]
    pub fn signature(&self, index: usize, user_id: &str) -> String {
        self.entry(index, user_id).map(BeatEntry::signature).unwrap_or_default()
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Returns true if the beat is non-empty and every entry is calculated.
    #[must_use]
    pub fn is_calculated(&self, index: usize) -> bool {
        self.beats
            .get(index)
            .is_some_and(|beat| !beat.is_empty() && beat.iter().all(|entry| entry.calculated))
    }

    /// Last beat of the calculated prefix.
    #[must_use]
    pub fn resolved_index(&self) -> Option<usize> {
        let prefix = (0..self.beats.len()).take_while(|index| self.is_calculated(*index)).count();
        prefix.checked_sub(1)
    }

    /// First beat at which the character can take a new action set.
    ///
    /// Returns `len()` when every beat holds an action.
    #[must_use]
    pub fn first_open_index(&self, user_id: &str) -> usize {
        (0..self.beats.len())
            .find(|index| self.is_open_at(*index, user_id))
            .unwrap_or(self.beats.len())
    }

    /// The smallest [`first_open_index`](Self::first_open_index) over the roster.
    #[must_use]
    pub fn earliest_open_index(&self, roster: &Roster) -> usize {
        roster
            .iter()
            .map(|character| self.first_open_index(&character.user_id))
            .min()
            .unwrap_or(0)
    }

    /// First beat after `start` at which the character is open.
    #[must_use]
    pub fn first_open_after(&self, user_id: &str, start: usize) -> usize {
        (start + 1..self.beats.len())
            .find(|index| self.is_open_at(*index, user_id))
            .unwrap_or(self.beats.len())
    }

    /// The character's most recent entry before `index`.
    #[must_use]
    pub fn last_entry_before(&self, index: usize, user_id: &str) -> Option<&BeatEntry> {
        (0..index.min(self.beats.len()))
            .rev()
            .find_map(|beat| self.entry(beat, user_id))
    }

    // =========================================================================
    // Writing Action Sets
    // =========================================================================

    /// Writes an action set for a character.
    ///
    /// The set starts at the character's first open or missing beat after the
    /// calculated prefix. Entries are seeded from the character's last known
    /// snapshot, and the character's entries after the set are removed.
    ///
    /// Returns the start beat, or `None` for an unknown character or an
    /// empty list.
    pub fn apply_action_set(
        &mut self,
        roster: &Roster,
        board: &Board,
        user_id: &str,
        list: &[ActionEntry],
    ) -> Option<usize> {
        let character = roster.get(user_id)?;
        if list.is_empty() {
            return None;
        }
        let user_id = character.user_id.as_str();
        let scan_start = self.resolved_index().map_or(0, |index| index + 1);
        let start = (scan_start..self.beats.len())
            .find(|index| self.is_open_at(*index, user_id))
            .unwrap_or_else(|| scan_start.max(self.beats.len()));
        let seed = self
            .last_entry_before(start, user_id)
            .map_or_else(|| CharacterState::initial(character), BeatEntry::state);

        for (offset, action) in list.iter().enumerate() {
            let mut action = action.clone();
            action.flags.remove(EntryFlags::COMBO_SKIPPED);
            if offset > 0 {
                action.flags.remove(EntryFlags::COMBO_STARTER);
            }
            self.upsert(start + offset, user_id, action, &seed, board);
        }
        self.truncate_after(user_id, start + list.len() - 1);
        self.sort_by_roster(roster);
        tracing::debug!(actor = user_id, start, len = list.len(), "action set applied");
        Some(start)
    }

    /// Writes an action into a character's slot, creating it if needed.
    pub fn upsert(
        &mut self,
        index: usize,
        user_id: &str,
        action: ActionEntry,
        state: &CharacterState,
        board: &Board,
    ) -> &mut BeatEntry {
        self.ensure_len(index + 1);
        let beat = &mut self.beats[index];
        let position = match beat.iter().position(|entry| entry.user_id == user_id) {
            Some(position) => {
                beat[position].replace_action(action);
                beat[position].apply_state(state, board, false);
                position
            }
            None => {
                beat.push(BeatEntry::new(user_id, action, state, board));
                beat.len() - 1
            }
        };
        &mut beat[position]
    }

    /// Writes `list` for a character starting at `start`.
    ///
    /// With `mark_combo_starter`, the first written entry starts a new action
    /// set. Unless `preserve_after_end`, the character's entries after the
    /// list are removed. Returns the entry written at `start`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_list_from(
        &mut self,
        user_id: &str,
        start: usize,
        list: &[ActionEntry],
        state: &CharacterState,
        board: &Board,
        mark_combo_starter: bool,
        preserve_after_end: bool,
    ) -> Option<ActionEntry> {
        if list.is_empty() {
            return None;
        }
        for (offset, action) in list.iter().enumerate() {
            let mut action = action.clone();
            action
                .flags
                .remove(EntryFlags::COMBO_SKIPPED | EntryFlags::STUN_ONLY | EntryFlags::COMBO_STARTER);
            if offset == 0 && mark_combo_starter {
                action.flags.insert(EntryFlags::COMBO_STARTER);
            }
            self.upsert(start + offset, user_id, action, state, board);
        }
        if !preserve_after_end {
            self.truncate_after(user_id, start + list.len() - 1);
        }
        self.entry(start, user_id).map(|entry| entry.entry.clone())
    }

    /// Removes a character's entries after `index`.
    pub fn truncate_after(&mut self, user_id: &str, index: usize) {
        for beat in self.beats.iter_mut().skip(index + 1) {
            beat.retain(|entry| entry.user_id != user_id);
        }
    }

    /// Removes a character's entries after `index`, stopping at the start of
    /// a later action set when `preserve_starts` is set.
    pub fn clear_after(&mut self, user_id: &str, index: usize, preserve_starts: bool) {
        self.clear_after_until(user_id, index, |_, entry| preserve_starts && entry.is_action_set_start());
    }

    /// Removes a character's entries after `index` until `stop` accepts one.
    ///
    /// `stop` receives the beat index and the entry. Beats without an entry
    /// for the character are skipped.
    pub fn clear_after_until(
        &mut self,
        user_id: &str,
        index: usize,
        mut stop: impl FnMut(usize, &BeatEntry) -> bool,
    ) {
        for (beat_index, beat) in self.beats.iter_mut().enumerate().skip(index + 1) {
            let Some(position) = beat.iter().position(|entry| entry.user_id == user_id) else {
                continue;
            };
            if stop(beat_index, &beat[position]) {
                break;
            }
            beat.remove(position);
        }
    }

    /// Forgets every hit recorded at a beat.
    pub fn clear_consequences(&mut self, index: usize) {
        if let Some(beat) = self.beats.get_mut(index) {
            for entry in beat {
                entry.consequences.clear();
            }
        }
    }

    /// Records a hit on a character's entry, creating the entry if needed.
    pub fn record_consequence(
        &mut self,
        index: usize,
        user_id: &str,
        consequence: HitConsequence,
        state: &CharacterState,
        board: &Board,
    ) {
        if self.entry(index, user_id).is_none() {
            self.upsert(index, user_id, ActionEntry::open(), state, board);
        }
        if let Some(entry) = self.entry_mut(index, user_id) {
            entry.consequences.push(consequence);
        }
    }

    /// Drops the character's action at `from` and moves the rest of its
    /// action set one beat earlier.
    ///
    /// The selected rotation stays on the first entry.
    pub fn shift_left(&mut self, user_id: &str, from: usize) {
        let mut sequence = Vec::new();
        for index in from..self.beats.len() {
            let Some(entry) = self.entry(index, user_id) else {
                break;
            };
            sequence.push(index);
            if is_open_action(&entry.entry.action) {
                break;
            }
        }
        if sequence.len() < 2 {
            return;
        }
        for pair in sequence.windows(2) {
            let Some(mut next) = self.entry(pair[1], user_id).map(|entry| entry.entry.clone()) else {
                continue;
            };
            if let Some(current) = self.entry_mut(pair[0], user_id) {
                if pair[0] == from && current.entry.rotation_source == Some(RotationSource::Selected) {
                    next.rotation = current.entry.rotation.clone();
                    next.rotation_source = current.entry.rotation_source;
                }
                current.entry = next;
            }
        }
        if let Some(&last) = sequence.last() {
            if let Some(entry) = self.entry_mut(last, user_id) {
                entry.entry = ActionEntry::open();
            }
        }
    }

    /// Writes a stun window for a hit at `index`.
    ///
    /// The window is `DamageIcon` for `knocked_steps + 1` beats (or
    /// `icon_count`) followed by `E`. An existing window starting at the same
    /// beat is only ever extended.
    pub fn apply_hit_timeline(
        &mut self,
        user_id: &str,
        index: usize,
        state: &CharacterState,
        board: &Board,
        window: HitWindow,
    ) {
        let start = if window.preserve_action { index + 1 } else { index };
        let icons = window.icon_count.unwrap_or(window.knocked_steps + 1) as usize;
        let computed_end = start + icons;

        let run = (start..self.beats.len())
            .take_while(|beat| {
                self.entry(*beat, user_id)
                    .is_some_and(|entry| label_is(&entry.entry.action, DAMAGE_ICON_ACTION))
            })
            .count();
        let had_run = run > 0;
        let end = computed_end.max(start + run);
        let extended = had_run && computed_end > start + run;

        for beat in start..end {
            let current = self.entry(beat, user_id).map(|entry| entry.entry.clone());
            let already_icon = current
                .as_ref()
                .is_some_and(|entry| label_is(&entry.action, DAMAGE_ICON_ACTION));
            let mut icon = ActionEntry::new(DAMAGE_ICON_ACTION);
            if beat == start && !already_icon {
                if let Some(current) = &current {
                    icon.card_id.clone_from(&current.card_id);
                    icon.passive_card_id.clone_from(&current.passive_card_id);
                }
            } else if let Some(current) = current.filter(|_| already_icon) {
                icon = current;
            }
            icon.flags.set(EntryFlags::STUN_ONLY, window.stun_only);
            self.upsert(beat, user_id, icon, state, board);
        }

        let end_is_replaceable = self
            .entry(end, user_id)
            .is_none_or(|entry| is_open_action(&entry.entry.action) || label_is(&entry.entry.action, DAMAGE_ICON_ACTION));
        if !had_run || extended || end_is_replaceable {
            self.upsert(end, user_id, ActionEntry::open(), state, board);
        } else if let Some(entry) = self.entry_mut(end, user_id) {
            entry.apply_state(state, board, false);
        }
        if (!had_run || extended) && !window.preserve_after_end {
            self.truncate_after(user_id, end);
        }
        if extended {
            tracing::debug!(actor = user_id, beat = index, end, "knockback window extended");
        }
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Drops entries of unknown characters, keeps one entry per character and
    /// beat (preferring a submitted action), and sorts beats by roster order.
    pub fn normalize(&mut self, roster: &Roster) {
        for (index, beat) in self.beats.iter_mut().enumerate() {
            let mut kept: Vec<BeatEntry> = Vec::with_capacity(beat.len());
            for mut entry in beat.drain(..) {
                let Some(user_id) = roster.user_id(&entry.user_id) else {
                    tracing::warn!(beat = index, actor = %entry.user_id, "entry for unknown actor dropped");
                    continue;
                };
                entry.user_id = user_id.to_string();
                match kept.iter_mut().find(|existing| existing.user_id == entry.user_id) {
                    None => kept.push(entry),
                    Some(existing) => {
                        let existing_open = is_open_action(&existing.entry.action);
                        let next_open = is_open_action(&entry.entry.action);
                        if existing.entry.action != entry.entry.action && existing_open == next_open {
                            tracing::warn!(
                                beat = index,
                                actor = %entry.user_id,
                                kept = %existing.entry.action,
                                dropped = %entry.entry.action,
                                "duplicate entry"
                            );
                        }
                        if existing_open && !next_open {
                            *existing = entry;
                        }
                    }
                }
            }
            *beat = kept;
        }
        self.sort_by_roster(roster);
    }

    /// Sorts every beat by roster order.
    pub fn sort_by_roster(&mut self, roster: &Roster) {
        for beat in &mut self.beats {
            beat.sort_by_key(|entry| roster.order_of(&entry.user_id).unwrap_or(usize::MAX));
        }
    }

    /// Marks every entry from `from` onward as not calculated.
    pub fn mark_uncalculated_from(&mut self, from: usize) {
        for beat in self.beats.iter_mut().skip(from) {
            for entry in beat {
                entry.calculated = false;
            }
        }
    }

    /// Returns true if the character holds a submitted action at `index`.
    #[must_use]
    pub fn has_action_at(&self, index: usize, user_id: &str) -> bool {
        !self.is_open_at(index, user_id)
    }

    /// Returns true if `label` is the open action.
    #[must_use]
    pub fn is_open_label(label: &str) -> bool {
        label_is(label, OPEN_ACTION)
    }
}
