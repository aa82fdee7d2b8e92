//! Route search for tile-based transport networks.
//!
//! The engine computes ordered tile sequences for vehicles over road, rail,
//! water and air networks, and also runs the large-scale background route
//! discovery that feeds city traffic economics:
//!
//! - **Core search** ([`Route::calc_route`]) — A* with lazy deletion, turn
//!   penalties, three-tier weight-limit enforcement and, on water, jump
//!   point pruning.
//! - **Ocean assembly** ([`Route::calc_ocean_route`]) — straight staircase
//!   lines over open water with searched detours around small land gaps.
//! - **Unknown-target search** ([`Route::find_route`]) — route to the
//!   nearest tile accepted by the capability's target test.
//! - **City-traffic discovery** ([`Route::discover_city_routes`]) — a
//!   relaxed search recording journey-time estimates to every reachable
//!   destination, pausable via a two-phase barrier.
//!
//! Searches borrow a [`SearchContext`] (map, settings, node pool, visited
//! marker) and a [`WayPather`] capability describing the travelling entity.
//! Memory is recycled through [`NodePool`], whose slot count bounds search
//! concurrency.

mod arena;
mod discovery;
mod marker;
mod ocean;
mod pather;
mod postprocess;
mod queue;
mod route;
mod search;

pub use arena::{NO_PARENT, NodeBuffer, NodePool, SearchNode};
pub use discovery::{
    CarRouteSink, CityConnexions, Destination, DiscoveryPacer, DiscoveryParams,
    FALLBACK_JOURNEY_TIME_PER_TILE, FindRouteParams,
};
pub use marker::Marker;
pub use ocean::OCEAN_LAND_GAP_TOLERANCE;
pub use pather::WayPather;
pub use queue::OpenQueue;
pub use route::{Route, RouteResult, WEIGHT_UNLIMITED};
pub use search::{PLATFORM_END_SENTINEL, SearchContext, SearchMode, SearchParams};
