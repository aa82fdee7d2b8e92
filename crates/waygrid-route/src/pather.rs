//! The capability seam between the search and the travelling entity.

use waygrid_core::{Ribi, Tile, WayType};

/// What the route search needs to know about the entity it routes for.
///
/// Implementations are read-only queries against the map and carry no
/// search state; the search borrows one for the duration of a single call.
pub trait WayPather {
    /// The network this entity travels on.
    fn way_type(&self) -> WayType;

    /// Whether the tile can be driven on at all.
    fn check_tile(&self, tile: &Tile) -> bool;

    /// Directions this entity may leave the tile in, honouring whatever
    /// per-entity restrictions apply (electrification, ownership, ...).
    fn ribi(&self, tile: &Tile) -> Ribi;

    /// Cost of entering `tile` from direction `from` at the given maximum
    /// speed. Must be at least 1.
    fn cost(&self, tile: &Tile, max_speed: i32, from: Ribi) -> u32;

    /// Target test, for searches to a known goal as well as searches to an
    /// unknown destination. `prev` is the tile the search came from, when
    /// there is one.
    fn is_target(&self, tile: &Tile, prev: Option<&Tile>) -> bool;

    /// Extra cost per height level climbed.
    fn climb_cost(&self) -> u32 {
        0
    }
}
