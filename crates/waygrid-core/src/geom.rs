//! Geometry primitives: [`Coord`] and [`Coord3`].

use std::fmt;
use std::ops::{Add, Sub};

use crate::ribi::Ribi;

// ---------------------------------------------------------------------------
// Coord
// ---------------------------------------------------------------------------

/// A 2D integer map position. X grows east, Y grows south.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    /// Origin (0, 0).
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Lift to a 3D position at height `z`.
    #[inline]
    pub const fn at_height(self, z: i32) -> Coord3 {
        Coord3::new(self.x, self.y, z)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Add for Coord {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Ribi> for Coord {
    type Output = Self;
    /// Step one tile in a single direction. Combined masks step on both
    /// axes at once (a diagonal step), matching the mask's bit content.
    #[inline]
    fn add(self, rhs: Ribi) -> Self {
        self + rhs.to_delta()
    }
}

// ---------------------------------------------------------------------------
// Coord3
// ---------------------------------------------------------------------------

/// A 3D tile position: 2D map cell plus height level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord3 {
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Drop the height component.
    #[inline]
    pub const fn to_2d(self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

impl Add for Coord3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Coord3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Coord3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Distances
// ---------------------------------------------------------------------------

/// Straight-line tile distance (Chebyshev): the number of tiles a path may
/// cross when diagonal staircase travel is available. Never overestimates
/// the hop count of a 4-way path, so it is safe as an A* heuristic term.
#[inline]
pub fn straight_dist(a: Coord, b: Coord) -> u32 {
    (a.x - b.x).unsigned_abs().max((a.y - b.y).unsigned_abs())
}

/// Manhattan (L1) distance.
#[inline]
pub fn manhattan(a: Coord, b: Coord) -> u32 {
    (a.x - b.x).unsigned_abs() + (a.y - b.y).unsigned_abs()
}
