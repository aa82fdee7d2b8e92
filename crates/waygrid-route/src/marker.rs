//! Visited-tile stamps, reset in O(1) via a generation counter.

use waygrid_core::{Tile, TileMap};

/// A map-sized stamp array recording which tiles a search has touched.
///
/// One marker serves sequential searches on a thread; concurrent searches
/// need one marker each, mirroring the node-pool slot discipline.
pub struct Marker {
    stamps: Vec<u32>,
    generation: u32,
}

impl Marker {
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: vec![0; capacity],
            generation: 1,
        }
    }

    /// A marker sized for the given map.
    pub fn for_map(map: &TileMap) -> Self {
        Self::new(map.tile_count())
    }

    /// Forget all stamps and make sure the map's tiles fit. Cheap: bumps
    /// the generation instead of clearing, except on the rare wrap.
    pub fn reset_for(&mut self, map: &TileMap) {
        if self.stamps.len() < map.tile_count() {
            self.stamps.resize(map.tile_count(), 0);
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamps.fill(0);
            self.generation = 1;
        }
    }

    #[inline]
    pub fn mark(&mut self, tile: &Tile) {
        self.stamps[tile.index()] = self.generation;
    }

    #[inline]
    pub fn is_marked(&self, tile: &Tile) -> bool {
        self.stamps[tile.index()] == self.generation
    }

    /// Mark and report whether the tile was already marked, saving the
    /// separate lookup when closing popped nodes.
    #[inline]
    pub fn test_and_mark(&mut self, tile: &Tile) -> bool {
        let s = &mut self.stamps[tile.index()];
        let was = *s == self.generation;
        *s = self.generation;
        was
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waygrid_core::{Coord3, Ribi, Way, WayType};

    fn small_map() -> TileMap {
        let mut map = TileMap::new(4, 4);
        for x in 0..4 {
            let mut t = waygrid_core::Tile::new(Coord3::new(x, 0, 0));
            t.ways.push(Way::new(WayType::Road, Ribi::ALL));
            map.insert(t);
        }
        map
    }

    #[test]
    fn mark_and_reset() {
        let map = small_map();
        let mut m = Marker::for_map(&map);
        let a = map.lookup(Coord3::new(0, 0, 0)).unwrap();
        let b = map.lookup(Coord3::new(1, 0, 0)).unwrap();

        assert!(!m.is_marked(a));
        m.mark(a);
        assert!(m.is_marked(a));
        assert!(!m.is_marked(b));

        m.reset_for(&map);
        assert!(!m.is_marked(a));
    }

    #[test]
    fn test_and_mark_reports_prior_state() {
        let map = small_map();
        let mut m = Marker::for_map(&map);
        let a = map.lookup(Coord3::new(2, 0, 0)).unwrap();
        assert!(!m.test_and_mark(a));
        assert!(m.test_and_mark(a));
    }

    #[test]
    fn reset_grows_with_map() {
        let mut map = small_map();
        let mut m = Marker::for_map(&map);
        let mut t = waygrid_core::Tile::new(Coord3::new(0, 1, 0));
        t.ways.push(Way::new(WayType::Road, Ribi::ALL));
        map.insert(t);
        m.reset_for(&map);
        let late = map.lookup(Coord3::new(0, 1, 0)).unwrap();
        assert!(!m.is_marked(late));
        m.mark(late);
        assert!(m.is_marked(late));
    }
}
