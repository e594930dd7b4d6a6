//! Axial hex geometry, facing rotation, and the land/abyss board.
//!
//! Coordinates are axial `(q, r)` stored in a [`glam::IVec2`]. Directions are
//! expressed two ways:
//!
//! - **Axial directions** (`0..6`): absolute unit vectors, used for knockback,
//!   block registration, and throw choices.
//! - **Local directions** (`F`, `B`, `L`, `R`, `BL`, `BR`): relative to a
//!   character's facing, used by action token paths.
//!
//! A facing of 180 degrees is the identity rotation: local `F` maps to axial
//! direction 0. Every further 60 degrees rotates one step clockwise.
//!
//! # Example
//!
//! ```
//! use hexclash_core::hex::{Hex, LocalDirection};
//!
//! let forward = LocalDirection::F.to_axial(180);
//! assert_eq!(forward, Hex::new(1, 0));
//! assert_eq!(Hex::new(0, 0).distance(Hex::new(2, -1)), 2);
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use glam::IVec2;
use serde::{Deserialize, Serialize};

// =============================================================================
// Hex Coordinate
// =============================================================================

/// An axial hex coordinate.
///
/// Ordered by `(q, r)` so it can key `BTreeMap`s deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hex(IVec2);

impl Hex {
    /// The origin hex.
    pub const ZERO: Self = Self(IVec2::ZERO);

    /// Creates a hex from axial components.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self(IVec2::new(q, r))
    }

    /// Returns the `q` component.
    #[must_use]
    pub const fn q(self) -> i32 {
        self.0.x
    }

    /// Returns the `r` component.
    #[must_use]
    pub const fn r(self) -> i32 {
        self.0.y
    }

    /// Returns the underlying vector.
    #[must_use]
    pub const fn as_ivec2(self) -> IVec2 {
        self.0
    }

    /// Axial distance between two hexes.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        let dq = self.q() - other.q();
        let dr = self.r() - other.r();
        (dq.abs() + dr.abs() + (dq + dr).abs()) / 2
    }

    /// Rotates this vector one step (60 degrees) clockwise.
    #[must_use]
    pub const fn rotate_cw(self) -> Self {
        Self::new(-self.r(), self.q() + self.r())
    }

    /// Rotates this vector `steps` times clockwise (negative steps wrap).
    #[must_use]
    pub fn rotate(self, steps: i32) -> Self {
        let mut rotated = self;
        for _ in 0..steps.rem_euclid(6) {
            rotated = rotated.rotate_cw();
        }
        rotated
    }

    /// Applies a facing (degrees) to a local vector.
    #[must_use]
    pub fn with_facing(self, facing: i32) -> Self {
        self.rotate(facing_steps(facing))
    }

    /// Returns the 7 hexes made of this hex and its neighbours.
    #[must_use]
    pub fn touching(self) -> Vec<Self> {
        let mut hexes = Vec::with_capacity(7);
        hexes.push(self);
        hexes.extend(AXIAL_DIRECTIONS.iter().map(|dir| self + *dir));
        hexes
    }
}

impl PartialOrd for Hex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hex {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.q(), self.r()).cmp(&(other.q(), other.r()))
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q(), self.r())
    }
}

impl From<IVec2> for Hex {
    fn from(value: IVec2) -> Self {
        Self(value)
    }
}

impl Add for Hex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Hex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Hex {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Mul<i32> for Hex {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self(self.0 * rhs)
    }
}

// =============================================================================
// Directions
// =============================================================================

/// The six axial unit vectors, indexed `0..6`.
pub const AXIAL_DIRECTIONS: [Hex; 6] = [
    Hex::new(1, 0),
    Hex::new(1, -1),
    Hex::new(0, -1),
    Hex::new(-1, 0),
    Hex::new(-1, 1),
    Hex::new(0, 1),
];

/// Returns the axial unit vector for an index, wrapping modulo 6.
#[must_use]
pub fn axial_direction(index: usize) -> Hex {
    AXIAL_DIRECTIONS[index % 6]
}

/// Returns the direction index whose positive integer multiple equals `delta`.
///
/// Returns `None` for the zero vector and for off-axis deltas.
#[must_use]
pub fn direction_index(delta: Hex) -> Option<usize> {
    AXIAL_DIRECTIONS.iter().position(|dir| {
        let scale = if dir.q() != 0 {
            delta.q() / dir.q()
        } else {
            delta.r() / dir.r()
        };
        scale > 0 && *dir * scale == delta
    })
}

/// A direction relative to a character's facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalDirection {
    /// Forward.
    F,
    /// Backward.
    B,
    /// Forward-left.
    L,
    /// Forward-right.
    R,
    /// Back-left.
    BL,
    /// Back-right.
    BR,
}

impl LocalDirection {
    /// Parses a direction label. Unknown labels fall back to forward.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "B" => Self::B,
            "L" => Self::L,
            "R" => Self::R,
            "BL" => Self::BL,
            "BR" => Self::BR,
            _ => Self::F,
        }
    }

    /// The unrotated unit vector for this direction.
    #[must_use]
    pub const fn local_vector(self) -> Hex {
        match self {
            Self::F => Hex::new(1, 0),
            Self::B => Hex::new(-1, 0),
            Self::L => Hex::new(1, -1),
            Self::R => Hex::new(0, 1),
            Self::BL => Hex::new(-1, 1),
            Self::BR => Hex::new(0, -1),
        }
    }

    /// The absolute vector for this direction given a facing in degrees.
    #[must_use]
    pub fn to_axial(self, facing: i32) -> Hex {
        self.local_vector().with_facing(facing)
    }
}

// =============================================================================
// Facing and Rotation Labels
// =============================================================================

/// Rotation labels in clockwise order from no rotation.
pub const ROTATION_LABELS: [&str; 6] = ["0", "R1", "R2", "3", "L2", "L1"];

/// Normalizes degrees into `0..360`.
#[must_use]
pub fn normalize_degrees(value: i32) -> i32 {
    value.rem_euclid(360)
}

/// Number of clockwise rotation steps a facing applies to local vectors.
#[must_use]
pub fn facing_steps(facing: i32) -> i32 {
    // round((norm - 180) / 60) with halves rounding up
    let offset = normalize_degrees(facing) - 180;
    let steps = if offset >= 0 {
        (offset + 30) / 60
    } else {
        -((-offset + 29) / 60)
    };
    steps.rem_euclid(6)
}

/// Parses a rotation label into signed degrees.
///
/// A plain number `n <= 5` means `n * 60`; larger plain numbers are taken as
/// degrees. `Ln`/`Rn` turn `n` steps left or right. Anything else is zero.
#[must_use]
pub fn rotation_degrees(label: &str) -> i32 {
    let trimmed = label.trim().to_ascii_uppercase();
    if trimmed.is_empty() {
        return 0;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.parse::<i32>() {
            Ok(steps) if steps <= 5 => steps * 60,
            Ok(degrees) => degrees,
            Err(_) => 0,
        };
    }
    let sign = if trimmed.starts_with('L') {
        -1
    } else if trimmed.starts_with('R') {
        1
    } else {
        return 0;
    };
    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<i32>().map_or(0, |steps| sign * steps * 60)
}

/// Returns the step magnitude of a rotation label.
///
/// `0` and `3` are literal; `Ln`/`Rn` give `n`. Other labels have none.
#[must_use]
pub fn rotation_magnitude(label: &str) -> Option<u32> {
    let trimmed = label.trim().to_ascii_uppercase();
    match trimmed.as_str() {
        "" => None,
        "0" => Some(0),
        "3" => Some(3),
        _ if trimmed.starts_with('L') || trimmed.starts_with('R') => trimmed[1..].parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Board
// =============================================================================

/// Terrain under a hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Terrain {
    /// Solid ground.
    #[default]
    Land,
    /// Open void beyond the land.
    Abyss,
}

/// The set of land hexes; everything else is abyss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    land: HashSet<Hex>,
}

impl Board {
    /// Creates a board from a list of land hexes.
    #[must_use]
    pub fn new(land: impl IntoIterator<Item = Hex>) -> Self {
        Self {
            land: land.into_iter().collect(),
        }
    }

    /// The standard three-row island.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(default_land())
    }

    /// Returns true if the hex is land.
    #[must_use]
    pub fn is_land(&self, hex: Hex) -> bool {
        self.land.contains(&hex)
    }

    /// Returns the terrain of a hex.
    #[must_use]
    pub fn terrain(&self, hex: Hex) -> Terrain {
        if self.is_land(hex) {
            Terrain::Land
        } else {
            Terrain::Abyss
        }
    }

    /// Minimum axial distance from a hex to any land hex.
    ///
    /// Returns `None` for a board without land.
    #[must_use]
    pub fn distance_to_land(&self, hex: Hex) -> Option<i32> {
        self.land.iter().map(|tile| hex.distance(*tile)).min()
    }

    /// Land hexes in `(q, r)` order.
    #[must_use]
    pub fn land(&self) -> Vec<Hex> {
        let mut tiles: Vec<Hex> = self.land.iter().copied().collect();
        tiles.sort();
        tiles
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

/// Land rows of the standard board: `(r, q_min, q_max)`.
const LAND_ROWS: [(i32, i32, i32); 3] = [(0, -2, 2), (1, -2, 1), (-1, -1, 2)];

/// Builds the standard land tile list.
#[must_use]
pub fn default_land() -> Vec<Hex> {
    LAND_ROWS
        .iter()
        .flat_map(|&(r, q_min, q_max)| (q_min..=q_max).map(move |q| Hex::new(q, r)))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
