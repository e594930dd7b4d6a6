//! Mutable state of one resolution pass.
//!
//! # Architecture
//!
//! - [`PassState`] survives from beat to beat and is snapshotted before a
//!   beat's action phase. A beat rerun restores the snapshot.
//! - [`SetTracking`] follows each character's current action set. It is
//!   written once per beat, before the action phase, and is not restored on
//!   rerun.
//! - [`BeatScratch`] is rebuilt at the start of every action phase and
//!   dropped afterwards: occupancy, blocks, queued discards.

use std::collections::{BTreeMap, BTreeSet};

use super::path::Occupancy;
use crate::hex::{Hex, Terrain};
use crate::interaction::{FocusEndReason, Interaction, InteractionDetail, InteractionKind};
use crate::timeline::CharacterState;
use crate::token::TokenRegistry;

// =============================================================================
// Pass State
// =============================================================================

/// A combo check waiting for a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComboState {
    /// Beat of the `CO` entry.
    pub co_index: usize,
    /// Set once an attack of the same card lands.
    pub hit: bool,
    /// Card that owns the `CO` entry.
    pub card_id: String,
    /// A throw in the set cancels the combo.
    pub throw: bool,
}

/// A parry counter scheduled for a later beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParryCounter {
    pub defender: String,
    pub attacker: String,
    pub damage: i32,
    pub kbf: i32,
    pub direction: Option<usize>,
}

/// State carried across beats of one pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct PassState {
    pub states: BTreeMap<String, CharacterState>,
    pub tokens: TokenRegistry,
    pub interactions: Vec<Interaction>,
    pub halt: Option<usize>,
    /// One hand-trigger offer per card, beat, and actor.
    pub hand_keys: BTreeSet<String>,
    pub parry_counters: BTreeMap<usize, Vec<ParryCounter>>,
    /// Defenders whose action set ends at a beat after parrying.
    pub parry_enders: BTreeMap<usize, BTreeSet<String>>,
    pub parry_keys: BTreeSet<String>,
    pub applied_returns: BTreeSet<String>,
    pub delayed_fire: BTreeMap<usize, Vec<(Hex, String)>>,
    pub combos: BTreeMap<String, ComboState>,
    /// Characters whose reflex-dodge block stopped an attack this set.
    pub reflex_avoided: BTreeSet<String>,
    /// Draw ids already counted by this pass.
    pub touched_draws: BTreeSet<String>,
}

impl PassState {
    /// Stops resolution at `index` unless it already stops earlier.
    pub(crate) fn halt_at(&mut self, index: usize) {
        self.halt = Some(self.halt.map_or(index, |halt| halt.min(index)));
    }

    pub(crate) fn find(&self, id: &str) -> Option<&Interaction> {
        self.interactions.iter().find(|interaction| interaction.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Interaction> {
        self.interactions.iter_mut().find(|interaction| interaction.id == id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub(crate) fn push(&mut self, interaction: Interaction) {
        tracing::debug!(
            id = %interaction.id,
            beat = interaction.beat_index,
            actor = %interaction.actor,
            pending = interaction.is_pending(),
            "interaction raised"
        );
        self.interactions.push(interaction);
    }

    /// The character's active rewind focus.
    pub(crate) fn active_focus(&self, user_id: &str) -> Option<&Interaction> {
        self.interactions.iter().rev().find(|interaction| is_active_focus(interaction, user_id))
    }

    /// Ends the character's rewind focus, if any, and lifts its anchor.
    pub(crate) fn end_focus(&mut self, user_id: &str, index: usize, reason: FocusEndReason) {
        if let Some(focus) = self
            .interactions
            .iter_mut()
            .rev()
            .find(|interaction| is_active_focus(interaction, user_id))
        {
            if let InteractionDetail::RewindFocus {
                active,
                ended_beat,
                end_reason,
                ..
            } = &mut focus.detail
            {
                *active = false;
                *ended_beat = Some(index);
                *end_reason = Some(reason);
            }
            tracing::debug!(actor = user_id, beat = index, ?reason, "focus ended");
        }
        self.tokens.remove_focus_anchor(user_id);
    }
}

fn is_active_focus(interaction: &Interaction, user_id: &str) -> bool {
    interaction.kind() == InteractionKind::RewindFocus
        && interaction.actor == user_id
        && !interaction.is_pending()
        && matches!(interaction.detail, InteractionDetail::RewindFocus { active: true, .. })
}

// =============================================================================
// Action-Set Tracking
// =============================================================================

/// What the resolver remembers about a character's current action set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SetTracking {
    /// Terrain under the character when the set started.
    pub start_terrain: Option<Terrain>,
    /// A haven passive that started in the abyss skips the first `W`.
    pub haven_skip: bool,
    /// Facing when the set started.
    pub facing: Option<i32>,
    /// The set's rotation label.
    pub rotation: Option<String>,
}

// =============================================================================
// Beat Scratch
// =============================================================================

/// Who registered a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockSource {
    pub actor: String,
    pub card_id: Option<String>,
    pub passive_card_id: Option<String>,
    pub action: String,
}

/// Attacks of one actor this beat, for the burning-strike trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BurnRecord {
    pub hexes: Vec<Hex>,
    pub has_hit: bool,
}

/// A request to replay the current beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RerunRequest {
    pub changed: String,
    pub cause: String,
    pub cause_priority: i32,
    pub cause_order: usize,
    pub cause_key: String,
}

impl RerunRequest {
    /// Higher cause priority wins, then the earlier roster slot.
    pub(crate) fn outranks(&self, other: &Self) -> bool {
        if self.cause_priority != other.cause_priority {
            return self.cause_priority > other.cause_priority;
        }
        self.cause_order < other.cause_order
    }
}

/// Per-pass working set of one beat.
#[derive(Debug, Clone, Default)]
pub(crate) struct BeatScratch {
    pub occupancy: Occupancy,
    /// Blocks by hex, then by the direction index they face.
    pub blocks: BTreeMap<Hex, BTreeMap<usize, BlockSource>>,
    pub discards: BTreeMap<String, u32>,
    pub forced_discards: BTreeMap<String, u32>,
    pub disabled: BTreeSet<String>,
    pub executed: BTreeSet<String>,
    pub rotated: BTreeSet<String>,
    pub burning: BTreeMap<String, BurnRecord>,
    pub rerun: Option<RerunRequest>,
}

impl BeatScratch {
    pub(crate) fn new(occupancy: Occupancy) -> Self {
        Self {
            occupancy,
            ..Self::default()
        }
    }

    pub(crate) fn block_at(&self, hex: Hex, direction: Option<usize>) -> Option<&BlockSource> {
        self.blocks.get(&hex)?.get(&direction?)
    }

    pub(crate) fn register_block(&mut self, hex: Hex, direction: usize, source: BlockSource) {
        self.blocks.entry(hex).or_default().insert(direction, source);
    }

    /// Keeps the better of the current and the new rerun request.
    pub(crate) fn request_rerun(&mut self, request: RerunRequest) {
        let replace = self
            .rerun
            .as_ref()
            .is_none_or(|current| request.outranks(current));
        if replace {
            self.rerun = Some(request);
        }
    }
}
