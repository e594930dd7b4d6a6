//! Card rules that adjust a single hit, block, or action.
//!
//! Each rule is a small pure function over an [`ActionEntry`]. Passive
//! modifiers only apply while their entry is active, i.e. anything but `E`.

use crate::action::{is_bracketed, normalize_label, wrap_label, ActionEntry, ActionKind, RotationSource};
use crate::hex::{direction_index, facing_steps, Hex, Terrain};
use crate::timeline::CharacterState;

// =============================================================================
// Card Ids
// =============================================================================

pub(crate) const ABSORB: &str = "absorb";
pub(crate) const BOW_SHOT: &str = "bow-shot";
pub(crate) const BURNING_STRIKE: &str = "burning-strike";
pub(crate) const CROSS_SLASH: &str = "cross-slash";
pub(crate) const DOWN_SLASH: &str = "down-slash";
pub(crate) const GIGANTIC_STAFF: &str = "gigantic-staff";
pub(crate) const GRAPPLING_HOOK: &str = "grappling-hook";
pub(crate) const GUARD: &str = "guard";
pub(crate) const HAMMER: &str = "hammer";
pub(crate) const HAVEN: &str = "haven";
pub(crate) const HEALING_HARMONY: &str = "healing-harmony";
pub(crate) const HIP_THROW: &str = "hip-throw";
pub(crate) const IRON_WILL: &str = "iron-will";
pub(crate) const JAB: &str = "jab";
pub(crate) const LEAP: &str = "leap";
pub(crate) const PARRY: &str = "parry";
pub(crate) const REFLEX_DODGE: &str = "reflex-dodge";
pub(crate) const REWIND: &str = "rewind";
pub(crate) const SINKING_SHOT: &str = "sinking-shot";
pub(crate) const SMOKE_BOMB: &str = crate::action::SWAP_CARD_ID;
pub(crate) const SPIKE: &str = "spike";
pub(crate) const STAB: &str = "stab";
pub(crate) const SWEEPING_STRIKE: &str = "sweeping-strike";
pub(crate) const TACKLE: &str = "tackle";
pub(crate) const TRIP: &str = "trip";
pub(crate) const VENGEANCE: &str = "vengeance";

/// Damage a hammer passive deals back to the attacker.
pub(crate) const HAMMER_RECOIL: i32 = 2;
/// Bonus damage and knockback factor of a stab from behind.
pub(crate) const STAB_BONUS: i32 = 3;
/// Healing of a healing-harmony marker.
pub(crate) const HEALING_AMOUNT: i32 = 3;
/// Cards drawn by an iron-will marker.
pub(crate) const IRON_WILL_DRAW: u32 = 3;
/// Base stun of a smoke-bomb hit, reduced by the set's rotation magnitude.
pub(crate) const SMOKE_BOMB_STUN: u32 = 5;

fn passive_applies(entry: Option<&ActionEntry>, card_id: &str) -> bool {
    entry.is_some_and(|entry| entry.has_passive(card_id) && entry.is_active())
}

// =============================================================================
// Defender Modifiers
// =============================================================================

/// Damage a healing-harmony passive absorbs from each hit.
pub(crate) fn healing_reduction(entry: Option<&ActionEntry>) -> i32 {
    if passive_applies(entry, HEALING_HARMONY) {
        2
    } else {
        0
    }
}

/// Knockback factor an iron-will passive absorbs from each hit.
pub(crate) fn kbf_reduction(entry: Option<&ActionEntry>) -> i32 {
    i32::from(passive_applies(entry, IRON_WILL))
}

pub(crate) fn is_throw_immune(entry: Option<&ActionEntry>) -> bool {
    passive_applies(entry, HIP_THROW) || passive_applies(entry, TACKLE)
}

pub(crate) fn is_discard_immune(entry: Option<&ActionEntry>) -> bool {
    passive_applies(entry, SPIKE)
}

/// A trip passive turns knockback into discards.
pub(crate) fn converts_knockback(entry: Option<&ActionEntry>) -> bool {
    passive_applies(entry, TRIP)
}

pub(crate) fn has_hammer(entry: Option<&ActionEntry>) -> bool {
    passive_applies(entry, HAMMER)
}

/// True for a reflex-dodge passive waiting on `W`: a hit swaps its cards.
pub(crate) fn dodges_on_wait(entry: Option<&ActionEntry>) -> bool {
    entry.is_some_and(|entry| {
        entry.has_passive(REFLEX_DODGE) && entry.label().eq_ignore_ascii_case(crate::action::WAIT_ACTION)
    })
}

// =============================================================================
// Attacker Modifiers
// =============================================================================

/// Discards a bracketed hit forces on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HitDiscard {
    pub count: u32,
    /// Only a straight-ahead path counts.
    pub center_only: bool,
}

pub(crate) fn hit_discard(card_id: Option<&str>) -> Option<HitDiscard> {
    let (count, center_only) = match card_id? {
        DOWN_SLASH => (1, false),
        SPIKE => (3, false),
        TRIP => (2, false),
        SWEEPING_STRIKE => (1, true),
        _ => return None,
    };
    Some(HitDiscard { count, center_only })
}

/// Discards a blocked move forces on the character in the way.
pub(crate) fn blocked_move_discard(passive_card_id: Option<&str>) -> u32 {
    match passive_card_id {
        Some(SWEEPING_STRIKE) => 1,
        _ => 0,
    }
}

/// What the throw check needs to know about the token being resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThrowContext {
    pub kind: ActionKind,
    pub start_terrain: Option<Terrain>,
    pub origin: Hex,
    pub target: Option<Hex>,
}

/// Returns true if an entry's attack resolves as a throw.
///
/// Flagged throw entries, hip-throw and tackle actives, and leap passives
/// always throw. A grappling-hook charge throws when its action set started
/// on land and the target stands next to the attacker.
pub(crate) fn is_entry_throw(entry: &ActionEntry, context: Option<&ThrowContext>) -> bool {
    if entry.interaction == Some(crate::interaction::InteractionKind::Throw) {
        return true;
    }
    if entry.has_active(HIP_THROW) || entry.has_active(TACKLE) || entry.has_passive(LEAP) {
        return true;
    }
    let Some(context) = context else {
        return false;
    };
    entry.has_active(GRAPPLING_HOOK)
        && context.start_terrain == Some(Terrain::Land)
        && context.kind == ActionKind::Charge
        && context.target.is_some_and(|target| context.origin.distance(target) == 1)
}

/// Returns true if `attacker` stands directly behind `target`.
pub(crate) fn is_behind(attacker: Hex, target: &CharacterState) -> bool {
    let behind = usize::try_from((facing_steps(target.facing) + 3).rem_euclid(6)).unwrap_or(0);
    direction_index(attacker - target.position) == Some(behind)
}

/// Turns a move label into a jump of at least two hexes, keeping brackets.
/// Any other label comes back unchanged.
///
/// `m` becomes `2j`, `3m` becomes `3j`, `a-m` becomes `a-2j`.
pub(crate) fn gigantic_staff_label(action: &str) -> String {
    let trimmed = action.trim();
    let label = normalize_label(trimmed);
    if !label.chars().last().is_some_and(|c| c.eq_ignore_ascii_case(&'m')) {
        return action.to_string();
    }
    let path = &label[..label.len() - 1];
    let digits = path.len() - path.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, count) = path.split_at(path.len() - digits);
    let distance = count.parse::<u32>().map_or(2, |n| n.max(2));
    wrap_label(&format!("{prefix}{distance}j"), is_bracketed(trimmed))
}

/// Returns true if an entry begins an action set.
pub(crate) fn starts_action_set(entry: &ActionEntry) -> bool {
    entry.rotation_source == Some(RotationSource::Selected)
        || entry.flags.contains(crate::action::EntryFlags::COMBO_STARTER)
}
