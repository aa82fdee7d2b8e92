//! The route output type and search result codes.

use waygrid_core::Coord3;

/// "No limit observed": the value the weight fields take when no way along
/// the route constrained them. Old saved routes lacking the weight pair
/// deserialize to this.
pub const WEIGHT_UNLIMITED: u32 = u32::MAX;

#[cfg(feature = "serde")]
fn weight_unlimited() -> u32 {
    WEIGHT_UNLIMITED
}

/// Outcome of a route search. Every search terminates in exactly one of
/// these; callers must branch on all four.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RouteResult {
    Valid,
    /// A usable route whose destination platform is shorter than the
    /// convoy. Soft failure: the route still works, but warrants a
    /// warning.
    ValidHaltTooShort,
    /// No connected path exists.
    NoRoute,
    /// A path may exist but the search budget was exhausted first.
    TooComplex,
}

impl RouteResult {
    /// Whether the route carried alongside this result is usable.
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, RouteResult::Valid | RouteResult::ValidHaltTooShort)
    }
}

/// An ordered, duplicate-adjacent-free sequence of tile positions, plus
/// the minimum axle-load and convoy-weight limits observed along it.
///
/// Created empty by the caller and filled by one search call (which
/// overwrites any prior contents); composition logic may then extend it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub(crate) tiles: Vec<Coord3>,
    #[cfg_attr(feature = "serde", serde(default = "weight_unlimited"))]
    pub(crate) max_axle_load: u32,
    #[cfg_attr(feature = "serde", serde(default = "weight_unlimited"))]
    pub(crate) max_convoy_weight: u32,
}

impl Route {
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            max_axle_load: WEIGHT_UNLIMITED,
            max_convoy_weight: WEIGHT_UNLIMITED,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    pub fn tiles(&self) -> &[Coord3] {
        &self.tiles
    }

    #[inline]
    pub fn at(&self, i: usize) -> Coord3 {
        self.tiles[i]
    }

    #[inline]
    pub fn front(&self) -> Coord3 {
        self.tiles[0]
    }

    #[inline]
    pub fn back(&self) -> Coord3 {
        *self.tiles.last().expect("Route::back on empty route")
    }

    /// Lowest axle-load limit seen along the route.
    #[inline]
    pub fn max_axle_load(&self) -> u32 {
        self.max_axle_load
    }

    /// Lowest bridge convoy-weight limit seen along the route.
    #[inline]
    pub fn max_convoy_weight(&self) -> u32 {
        self.max_convoy_weight
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.max_axle_load = WEIGHT_UNLIMITED;
        self.max_convoy_weight = WEIGHT_UNLIMITED;
    }

    /// Append a single position.
    #[inline]
    pub fn push(&mut self, pos: Coord3) {
        self.tiles.push(pos);
    }

    /// Prepend a single position.
    pub fn insert_front(&mut self, pos: Coord3) {
        self.tiles.insert(0, pos);
    }

    /// Append another route, dropping shared end/start tiles so the splice
    /// point is not duplicated.
    pub fn append(&mut self, other: &Route) {
        while !self.tiles.is_empty() && !other.tiles.is_empty() && self.back() == other.front() {
            self.tiles.pop();
        }
        self.tiles.extend_from_slice(&other.tiles);
    }

    /// Truncate so that index `i` becomes the last tile.
    pub fn remove_from(&mut self, i: usize) {
        while i + 1 < self.tiles.len() {
            self.tiles.pop();
        }
    }

    /// Drop the first `i` tiles.
    pub fn remove_to(&mut self, i: usize) {
        self.tiles.drain(..i.min(self.tiles.len()));
    }

    /// Clear this route, then fill it with another route's tiles in the
    /// opposite order. Most routes are slightly asymmetrical, so this is
    /// only safe where the caller knows both orders are drivable (the
    /// ocean assembler does).
    pub fn assign_from_reversed_route(&mut self, input: &Route) {
        self.clear();
        self.tiles.extend(input.tiles.iter().rev().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> Coord3 {
        Coord3::new(x, y, 0)
    }

    fn route_of(coords: &[(i32, i32)]) -> Route {
        let mut r = Route::new();
        for &(x, y) in coords {
            r.push(pos(x, y));
        }
        r
    }

    #[test]
    fn append_drops_shared_tile() {
        let mut a = route_of(&[(0, 0), (1, 0), (2, 0)]);
        let b = route_of(&[(2, 0), (3, 0)]);
        a.append(&b);
        assert_eq!(a.tiles(), &[pos(0, 0), pos(1, 0), pos(2, 0), pos(3, 0)]);
    }

    #[test]
    fn append_without_shared_tile_drops_none() {
        let mut a = route_of(&[(0, 0), (1, 0)]);
        let b = route_of(&[(2, 0), (3, 0)]);
        a.append(&b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn reversed_assignment_is_exact() {
        let input = route_of(&[(0, 0), (1, 0), (1, 1), (2, 1)]);
        let mut out = route_of(&[(9, 9)]);
        out.assign_from_reversed_route(&input);
        assert_eq!(out.tiles(), &[pos(2, 1), pos(1, 1), pos(1, 0), pos(0, 0)]);
    }

    #[test]
    fn truncation() {
        let mut r = route_of(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
        r.remove_from(1);
        assert_eq!(r.tiles(), &[pos(0, 0), pos(1, 0)]);

        let mut r = route_of(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
        r.remove_to(2);
        assert_eq!(r.tiles(), &[pos(2, 0), pos(3, 0)]);
    }

    #[test]
    fn clear_resets_weight_pair() {
        let mut r = route_of(&[(0, 0)]);
        r.max_axle_load = 12;
        r.max_convoy_weight = 90;
        r.clear();
        assert_eq!(r.max_axle_load(), WEIGHT_UNLIMITED);
        assert_eq!(r.max_convoy_weight(), WEIGHT_UNLIMITED);
    }

    #[test]
    fn result_validity() {
        assert!(RouteResult::Valid.is_valid());
        assert!(RouteResult::ValidHaltTooShort.is_valid());
        assert!(!RouteResult::NoRoute.is_valid());
        assert!(!RouteResult::TooComplex.is_valid());
    }
}
