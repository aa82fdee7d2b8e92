//! Cardinal direction masks.
//!
//! A [`Ribi`] is a 4-bit set of the cardinal neighbour directions reachable
//! from a tile. Single bits are plain directions; two adjacent bits form a
//! diagonal (used for describing travel along a staircase line); combined
//! masks describe junctions.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::geom::{Coord, Coord3};

/// A set of cardinal directions, one bit each.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ribi(u8);

/// Clockwise 45° ring over the eight single/diagonal masks; other values
/// map to themselves.
const ROTATE45: [u8; 16] = [0, 3, 6, 2, 12, 5, 4, 7, 9, 1, 10, 11, 8, 13, 14, 15];

/// Axis projection: a straight mask maps to its doubled axis, anything
/// else to none. Two masks are perpendicular when their projections cover
/// both axes.
const DOUBLES: [u8; 16] = [0, 5, 10, 0, 5, 5, 0, 0, 10, 0, 10, 0, 0, 0, 0, 0];

impl Ribi {
    pub const NONE: Ribi = Ribi(0);
    pub const NORTH: Ribi = Ribi(1);
    pub const EAST: Ribi = Ribi(2);
    pub const SOUTH: Ribi = Ribi(4);
    pub const WEST: Ribi = Ribi(8);
    pub const ALL: Ribi = Ribi(15);

    /// The four single directions in expansion order.
    pub const NESW: [Ribi; 4] = [Self::NORTH, Self::EAST, Self::SOUTH, Self::WEST];

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Exactly one direction bit set.
    #[inline]
    pub const fn is_single(self) -> bool {
        self.0.is_power_of_two()
    }

    /// Whether the two masks share any direction.
    #[inline]
    pub const fn intersects(self, other: Ribi) -> bool {
        self.0 & other.0 != 0
    }

    /// Rotate every direction bit 180°.
    #[inline]
    pub const fn reversed(self) -> Ribi {
        Ribi(((self.0 << 2) | (self.0 >> 2)) & 0xF)
    }

    /// Rotate every direction bit 90° clockwise.
    #[inline]
    pub const fn rotated90(self) -> Ribi {
        Ribi(((self.0 << 1) | (self.0 >> 3)) & 0xF)
    }

    /// Rotate a single or diagonal mask 45° clockwise.
    #[inline]
    pub fn rotated45(self) -> Ribi {
        Ribi(ROTATE45[self.0 as usize])
    }

    /// Whether the straight axes of the two masks are perpendicular
    /// (one north/south, the other east/west). Diagonal or junction masks
    /// have no straight axis and are never perpendicular to anything.
    #[inline]
    pub fn is_perpendicular(self, other: Ribi) -> bool {
        DOUBLES[self.0 as usize] | DOUBLES[other.0 as usize] == Ribi::ALL.0
    }

    /// The direction mask pointing from `from` toward `to`, diagonal when
    /// both axes differ, [`Ribi::NONE`] when the positions coincide.
    pub fn toward(from: Coord, to: Coord) -> Ribi {
        let mut r = Ribi::NONE;
        if to.y < from.y {
            r |= Ribi::NORTH;
        } else if to.y > from.y {
            r |= Ribi::SOUTH;
        }
        if to.x > from.x {
            r |= Ribi::EAST;
        } else if to.x < from.x {
            r |= Ribi::WEST;
        }
        r
    }

    /// As [`Ribi::toward`], ignoring height.
    #[inline]
    pub fn toward3(from: Coord3, to: Coord3) -> Ribi {
        Self::toward(from.to_2d(), to.to_2d())
    }

    /// The 2D step taken by moving along this mask: one tile per set axis.
    #[inline]
    pub const fn to_delta(self) -> Coord {
        let mut dx = 0;
        let mut dy = 0;
        if self.0 & Self::NORTH.0 != 0 {
            dy -= 1;
        }
        if self.0 & Self::SOUTH.0 != 0 {
            dy += 1;
        }
        if self.0 & Self::EAST.0 != 0 {
            dx += 1;
        }
        if self.0 & Self::WEST.0 != 0 {
            dx -= 1;
        }
        Coord::new(dx, dy)
    }
}

impl BitOr for Ribi {
    type Output = Ribi;
    #[inline]
    fn bitor(self, rhs: Ribi) -> Ribi {
        Ribi(self.0 | rhs.0)
    }
}

impl BitOrAssign for Ribi {
    #[inline]
    fn bitor_assign(&mut self, rhs: Ribi) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Ribi {
    type Output = Ribi;
    #[inline]
    fn bitand(self, rhs: Ribi) -> Ribi {
        Ribi(self.0 & rhs.0)
    }
}

impl Not for Ribi {
    type Output = Ribi;
    #[inline]
    fn not(self) -> Ribi {
        Ribi(!self.0 & 0xF)
    }
}

impl fmt::Display for Ribi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "-");
        }
        for (bit, c) in [
            (Ribi::NORTH, 'N'),
            (Ribi::EAST, 'E'),
            (Ribi::SOUTH, 'S'),
            (Ribi::WEST, 'W'),
        ] {
            if self.intersects(bit) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations() {
        assert_eq!(Ribi::NORTH.rotated90(), Ribi::EAST);
        assert_eq!(Ribi::WEST.rotated90(), Ribi::NORTH);
        assert_eq!(Ribi::NORTH.reversed(), Ribi::SOUTH);
        assert_eq!((Ribi::NORTH | Ribi::EAST).reversed(), Ribi::SOUTH | Ribi::WEST);
        assert_eq!(Ribi::NORTH.rotated45(), Ribi::NORTH | Ribi::EAST);
        assert_eq!((Ribi::NORTH | Ribi::EAST).rotated45(), Ribi::EAST);
        // full 45° ring closes after eight steps
        let mut r = Ribi::NORTH;
        for _ in 0..8 {
            r = r.rotated45();
        }
        assert_eq!(r, Ribi::NORTH);
    }

    #[test]
    fn perpendicular() {
        assert!(Ribi::NORTH.is_perpendicular(Ribi::EAST));
        assert!((Ribi::NORTH | Ribi::SOUTH).is_perpendicular(Ribi::WEST));
        assert!(!Ribi::NORTH.is_perpendicular(Ribi::SOUTH));
        assert!(!(Ribi::NORTH | Ribi::EAST).is_perpendicular(Ribi::SOUTH | Ribi::WEST));
    }

    #[test]
    fn toward() {
        let o = Coord::new(5, 5);
        assert_eq!(Ribi::toward(o, Coord::new(5, 0)), Ribi::NORTH);
        assert_eq!(Ribi::toward(o, Coord::new(9, 9)), Ribi::EAST | Ribi::SOUTH);
        assert_eq!(Ribi::toward(o, o), Ribi::NONE);
    }

    #[test]
    fn masks() {
        assert_eq!(!Ribi::NORTH, Ribi::EAST | Ribi::SOUTH | Ribi::WEST);
        assert!(Ribi::ALL.intersects(Ribi::WEST));
        assert!(Ribi::NORTH.is_single());
        assert!(!(Ribi::NORTH | Ribi::EAST).is_single());
        assert!(!Ribi::NONE.is_single());
    }
}
