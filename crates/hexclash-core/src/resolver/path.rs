//! Path geometry for one beat: walked paths, knockback walks, and who stands
//! where.
//!
//! Every walk here checks the *in-progress* [`Occupancy`] of the beat, so a
//! character moved by a higher-priority actor already blocks the actors that
//! resolve after it.

use std::collections::BTreeMap;

use crate::action::PathStep;
use crate::hex::{axial_direction, direction_index, Board, Hex};

// =============================================================================
// Occupancy
// =============================================================================

/// Who stands on which hex during a beat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Occupancy {
    cells: BTreeMap<Hex, String>,
}

impl Occupancy {
    /// Builds the map from positions in roster order. A later character on
    /// the same hex replaces an earlier one.
    pub(crate) fn from_positions<'a>(positions: impl IntoIterator<Item = (&'a str, Hex)>) -> Self {
        let cells = positions
            .into_iter()
            .map(|(user_id, hex)| (hex, user_id.to_string()))
            .collect();
        Self { cells }
    }

    pub(crate) fn occupant(&self, hex: Hex) -> Option<&str> {
        self.cells.get(&hex).map(String::as_str)
    }

    /// Returns true if someone other than `user_id` stands on `hex`.
    pub(crate) fn blocks(&self, hex: Hex, user_id: &str) -> bool {
        self.occupant(hex).is_some_and(|occupant| occupant != user_id)
    }

    /// Moves `user_id` from `from` to `to`.
    pub(crate) fn relocate(&mut self, user_id: &str, from: Hex, to: Hex) {
        if from == to {
            return;
        }
        if self.occupant(from) == Some(user_id) {
            self.cells.remove(&from);
        }
        self.cells.insert(to, user_id.to_string());
    }
}

// =============================================================================
// Paths
// =============================================================================

/// The hexes an action token passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathPlan {
    /// Every hex entered, in order.
    pub positions: Vec<Hex>,
    /// Where the path ends.
    pub destination: Hex,
    /// The axial vector of the last step, if the path has any steps.
    pub last_step: Option<Hex>,
}

/// Walks `steps` from `origin` relative to `facing`.
pub(crate) fn plan_path(origin: Hex, steps: &[PathStep], facing: i32) -> PathPlan {
    let mut current = origin;
    let mut positions = Vec::new();
    let mut last_step = None;
    for step in steps {
        let direction = step.direction.to_axial(facing);
        last_step = Some(direction);
        for _ in 0..step.distance {
            current = current + direction;
            positions.push(current);
        }
    }
    PathPlan {
        positions,
        destination: current,
        last_step,
    }
}

/// Walks a hook path: stops on the first hex held by another character or on
/// the first land hex, whichever comes first.
pub(crate) fn plan_hook_path(
    origin: Hex,
    steps: &[PathStep],
    facing: i32,
    board: &Board,
    occupancy: &Occupancy,
    user_id: &str,
) -> PathPlan {
    let mut current = origin;
    let mut positions = Vec::new();
    let mut last_step = None;
    'walk: for step in steps {
        let direction = step.direction.to_axial(facing);
        last_step = Some(direction);
        for _ in 0..step.distance {
            current = current + direction;
            positions.push(current);
            if occupancy.blocks(current, user_id) || board.is_land(current) {
                break 'walk;
            }
        }
    }
    PathPlan {
        destination: positions.last().copied().unwrap_or(origin),
        positions,
        last_step,
    }
}

/// The direction a hit pushes its target.
///
/// The last step of the attack path when there is one, otherwise the axial
/// direction from origin to destination.
pub(crate) fn attack_direction(origin: Hex, destination: Hex, last_step: Option<Hex>) -> Option<Hex> {
    last_step.or_else(|| direction_index(destination - origin).map(axial_direction))
}

// =============================================================================
// Knockback
// =============================================================================

/// Knockback distance for a hit.
///
/// Zero when `kbf <= 0`, one when `kbf == 1`, otherwise
/// `max(1, floor(max(0, damage) * kbf / divisor))`.
///
/// # Example
///
/// ```
/// use hexclash_core::resolver::knockback_distance;
///
/// assert_eq!(knockback_distance(34, 2, 10), 6);
/// assert_eq!(knockback_distance(34, 1, 10), 1);
/// assert_eq!(knockback_distance(34, 0, 10), 0);
/// ```
#[must_use]
pub fn knockback_distance(damage: i32, kbf: i32, divisor: i32) -> u32 {
    if kbf <= 0 {
        return 0;
    }
    if kbf == 1 {
        return 1;
    }
    let scaled = damage.max(0).saturating_mul(kbf) / divisor.max(1);
    u32::try_from(scaled.max(1)).unwrap_or(1)
}

/// Pushes `user_id` up to `distance` hexes along `direction`, stopping before
/// any hex held by someone else. Returns the landing hex and the number of
/// hexes moved.
pub(crate) fn knock_walk(occupancy: &Occupancy, user_id: &str, start: Hex, direction: Hex, distance: u32) -> (Hex, u32) {
    let mut position = start;
    let mut moved = 0;
    for _ in 0..distance {
        let candidate = position + direction;
        if occupancy.blocks(candidate, user_id) {
            break;
        }
        position = candidate;
        moved += 1;
    }
    (position, moved)
}
