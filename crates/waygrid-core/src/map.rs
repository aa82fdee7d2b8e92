//! The tile map and the city/building registries.
//!
//! `TileMap` stores tiles per 2D cell, sorted by height, and answers the
//! queries the route search needs: 3D lookup, surface lookup, and the
//! typed neighbour query that follows a way of a given type across a cell
//! boundary (including one-level height transitions at slopes).

use crate::geom::{Coord, Coord3};
use crate::ribi::Ribi;
use crate::tile::{Tile, WayType};

/// Identifier into the map's city registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CityId(pub u16);

/// Identifier into the map's building registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildingKind {
    Industry,
    Attraction,
    CityBuilding,
}

/// A building the traffic discovery may record routes to.
#[derive(Clone, Debug)]
pub struct Building {
    pub kind: BuildingKind,
    pub pos: Coord,
    /// Visitor demand after adjustment; used to gate route recording.
    pub visitor_demand: u16,
    /// Industries that only consume goods are always worth recording.
    pub consumer_only: bool,
}

/// A town: the discovery variant records connection times between the
/// origin town and everything it reaches.
#[derive(Clone, Debug)]
pub struct City {
    /// The road tile in front of the town hall; city destinations are
    /// recognised by reaching exactly this cell.
    pub townhall_road: Coord,
    pub min: Coord,
    pub max: Coord,
}

impl City {
    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min.x && c.x <= self.max.x && c.y >= self.min.y && c.y <= self.max.y
    }
}

/// The map: read-only during searches.
pub struct TileMap {
    width: i32,
    height: i32,
    /// Tiles per 2D cell, ascending by z. Almost always zero or one entry.
    cells: Vec<Vec<Tile>>,
    tile_count: u32,
    cities: Vec<City>,
    buildings: Vec<Building>,
}

impl TileMap {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "TileMap: degenerate size {width}x{height}");
        Self {
            width,
            height,
            cells: vec![Vec::new(); (width as usize) * (height as usize)],
            tile_count: 0,
            cities: Vec::new(),
            buildings: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> Coord {
        Coord::new(self.width, self.height)
    }

    /// Total number of tiles, which is also the marker capacity.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tile_count as usize
    }

    #[inline]
    pub fn is_within_limits(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    #[inline]
    fn cell_index(&self, c: Coord) -> Option<usize> {
        if self.is_within_limits(c) {
            Some((c.y as usize) * (self.width as usize) + c.x as usize)
        } else {
            None
        }
    }

    /// Insert a tile, assigning its dense index. Replaces any existing
    /// tile at the same 3D position.
    pub fn insert(&mut self, mut tile: Tile) {
        let ci = self
            .cell_index(tile.pos.to_2d())
            .unwrap_or_else(|| panic!("TileMap::insert: {} outside map", tile.pos));
        let cell = &mut self.cells[ci];
        if let Some(existing) = cell.iter_mut().find(|t| t.pos.z == tile.pos.z) {
            tile.index = existing.index;
            *existing = tile;
            return;
        }
        tile.index = self.tile_count;
        self.tile_count += 1;
        cell.push(tile);
        cell.sort_by_key(|t| t.pos.z);
    }

    /// Tile at an exact 3D position.
    pub fn lookup(&self, pos: Coord3) -> Option<&Tile> {
        let ci = self.cell_index(pos.to_2d())?;
        self.cells[ci].iter().find(|t| t.pos.z == pos.z)
    }

    /// Mutable lookup, for world building only.
    pub fn lookup_mut(&mut self, pos: Coord3) -> Option<&mut Tile> {
        let ci = self.cell_index(pos.to_2d())?;
        self.cells[ci].iter_mut().find(|t| t.pos.z == pos.z)
    }

    /// The ground tile of a cell (lowest height level).
    pub fn lookup_surface(&self, c: Coord) -> Option<&Tile> {
        let ci = self.cell_index(c)?;
        self.cells[ci].first()
    }

    /// Follow a way of type `wt` from `from` one tile in direction `dir`.
    ///
    /// Returns the connected neighbour tile, tolerating a one-level height
    /// transition (slopes, bridge ramps). `dir` must be a single direction.
    pub fn neighbour(&self, from: &Tile, wt: WayType, dir: Ribi) -> Option<&Tile> {
        debug_assert!(dir.is_single());
        let target = from.pos.to_2d() + dir;
        let ci = self.cell_index(target)?;
        self.cells[ci]
            .iter()
            .filter(|t| t.supports(wt) && (t.pos.z - from.vmove(dir)).abs() <= 1)
            .min_by_key(|t| (t.pos.z - from.vmove(dir)).abs())
    }

    /// Directions in which open water continues from this tile: a bit is
    /// set when the neighbouring cell's surface is water. Land and the map
    /// edge clear their bits. This is what forces (and permits) turns in
    /// the water jump-point pruning.
    pub fn water_ribi(&self, tile: &Tile) -> Ribi {
        let mut r = Ribi::NONE;
        for dir in Ribi::NESW {
            if self
                .lookup_surface(tile.pos.to_2d() + dir)
                .is_some_and(|t| t.water)
            {
                r |= dir;
            }
        }
        r
    }

    // -- registries ---------------------------------------------------------

    pub fn add_city(&mut self, city: City) -> CityId {
        let id = CityId(self.cities.len() as u16);
        self.cities.push(city);
        id
    }

    #[inline]
    pub fn city(&self, id: CityId) -> &City {
        &self.cities[id.0 as usize]
    }

    /// The city whose bounds contain `c`, if any.
    pub fn city_at(&self, c: Coord) -> Option<CityId> {
        self.cities
            .iter()
            .position(|city| city.contains(c))
            .map(|i| CityId(i as u16))
    }

    pub fn add_building(&mut self, building: Building) -> BuildingId {
        let id = BuildingId(self.buildings.len() as u32);
        self.buildings.push(building);
        id
    }

    #[inline]
    pub fn building(&self, id: BuildingId) -> &Building {
        &self.buildings[id.0 as usize]
    }
}
