//! Tiles and the ways built on them.

use crate::geom::Coord3;
use crate::map::BuildingId;
use crate::ribi::Ribi;

/// The transport network a way belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WayType {
    Road,
    Rail,
    Tram,
    Monorail,
    Maglev,
    Narrowgauge,
    Water,
    Air,
}

impl WayType {
    /// The rail family shares signal semantics: unidirectional signals
    /// permit routing against a one-way mask.
    #[inline]
    pub fn is_rail_family(self) -> bool {
        matches!(
            self,
            WayType::Rail | WayType::Tram | WayType::Monorail | WayType::Maglev | WayType::Narrowgauge
        )
    }
}

/// Construction style of a way, relevant to weight checks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WayStyle {
    #[default]
    Flat,
    /// Elevated ways count as bridge spans for load distribution.
    Elevated,
    /// Tram track laid on another way; bridge checks defer to the
    /// underlying road way.
    Tram,
}

/// Identifier of a halt (a stop, possibly spanning several platform tiles).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HaltId(pub u16);

/// One piece of transport infrastructure on a tile.
#[derive(Clone, Debug)]
pub struct Way {
    pub way_type: WayType,
    /// Directions physically connected, ignoring one-way restrictions.
    pub ribi: Ribi,
    /// Directions in which entry is forbidden by a one-way marker.
    pub oneway_mask: Ribi,
    pub has_signal: bool,
    /// An end-of-choose sign; choose-mode searches must not pass it.
    pub end_choose_sign: bool,
    pub max_axle_load: u32,
    pub bridge_weight_limit: u32,
    pub style: WayStyle,
}

impl Way {
    /// A plain way with no restrictions.
    pub fn new(way_type: WayType, ribi: Ribi) -> Self {
        Self {
            way_type,
            ribi,
            oneway_mask: Ribi::NONE,
            has_signal: false,
            end_choose_sign: false,
            max_axle_load: u32::MAX,
            bridge_weight_limit: u32::MAX,
            style: WayStyle::Flat,
        }
    }
}

/// One grid cell of the map at a specific height level.
#[derive(Clone, Debug)]
pub struct Tile {
    pub pos: Coord3,
    /// Open water or canal surface; navigable by the water way type
    /// without any way object.
    pub water: bool,
    /// For canal tiles, the directions the canal runs in; open water has
    /// none. Consulted by the water jump-point pruning.
    pub canal_ribi: Ribi,
    /// A real bridge deck (as opposed to merely elevated way).
    pub bridge: bool,
    /// Low clearance; tall vehicles cannot pass.
    pub height_restricted: bool,
    /// Directions in which leaving this tile climbs one height level.
    pub slope_up: Ribi,
    pub halt: Option<HaltId>,
    pub ways: Vec<Way>,
    /// Buildings reachable from the road on this tile, consumed by the
    /// city-traffic discovery.
    pub connected_buildings: Vec<BuildingId>,
    /// Dense index assigned by the map, used by the visited marker.
    pub(crate) index: u32,
}

impl Tile {
    /// A bare ground tile; add ways or flags before inserting into the map.
    pub fn new(pos: Coord3) -> Self {
        Self {
            pos,
            water: false,
            canal_ribi: Ribi::NONE,
            bridge: false,
            height_restricted: false,
            slope_up: Ribi::NONE,
            halt: None,
            ways: Vec::new(),
            connected_buildings: Vec::new(),
            index: 0,
        }
    }

    /// An open-water tile.
    pub fn water(pos: Coord3) -> Self {
        let mut t = Self::new(pos);
        t.water = true;
        t
    }

    #[inline]
    pub fn way(&self, wt: WayType) -> Option<&Way> {
        self.ways.iter().find(|w| w.way_type == wt)
    }

    #[inline]
    pub fn way_mut(&mut self, wt: WayType) -> Option<&mut Way> {
        self.ways.iter_mut().find(|w| w.way_type == wt)
    }

    #[inline]
    pub fn has_way(&self, wt: WayType) -> bool {
        self.way(wt).is_some()
    }

    /// Whether this tile carries traffic of the given way type at all.
    /// Water counts without a way object.
    #[inline]
    pub fn supports(&self, wt: WayType) -> bool {
        (wt == WayType::Water && self.water) || self.has_way(wt)
    }

    /// Height level reached when leaving in `dir` (slope-aware).
    #[inline]
    pub fn vmove(&self, dir: Ribi) -> i32 {
        self.pos.z + i32::from(self.slope_up.intersects(dir))
    }

    /// Dense map-wide index for marker stamping.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}
