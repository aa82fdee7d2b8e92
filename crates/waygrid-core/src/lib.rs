//! Domain types for tile-based transport networks.
//!
//! This crate holds everything the route-search engine consumes but does not
//! own: integer geometry ([`Coord`], [`Coord3`]), cardinal direction masks
//! ([`Ribi`]), tiles and the ways built on them ([`Tile`], [`Way`],
//! [`WayType`]), the map itself ([`TileMap`]) with its typed neighbour
//! queries, the city/building registries used by background traffic
//! discovery, and the tunable [`Settings`].
//!
//! The map is strictly read-only from the perspective of a search: all
//! mutation happens while the world is built or updated, never while a
//! route is being computed.

mod geom;
mod map;
mod ribi;
mod settings;
mod tile;

pub use geom::{Coord, Coord3, manhattan, straight_dist};
pub use map::{Building, BuildingId, BuildingKind, City, CityId, TileMap};
pub use ribi::Ribi;
pub use settings::{Settings, WeightLimitPolicy};
pub use tile::{HaltId, Tile, Way, WayStyle, WayType};
