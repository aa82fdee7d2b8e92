//! Unknown-target search and city-traffic route discovery.
//!
//! [`Route::find_route`] searches outward from a start tile until the
//! capability's target test accepts a tile, with no goal coordinate and
//! therefore no heuristic; the open set is ordered by accumulated cost.
//!
//! [`Route::discover_city_routes`] runs the same machinery relaxed:
//! reaching a target does not stop the search, so one sweep records a
//! journey-time estimate for every road-connected destination around an
//! origin city. The estimates land in a per-origin [`CityConnexions`]
//! table; optionally each discovered route is also traced back onto the
//! road tiles it used, through a [`CarRouteSink`]. Because a full sweep of
//! a large city can take seconds, the search yields through a
//! [`DiscoveryPacer`] every so many processed tiles so a coordinator can
//! keep the simulation responsive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};

use log::warn;

use waygrid_core::{
    BuildingId, BuildingKind, CityId, Coord, Coord3, Ribi, Settings, TileMap, WayType,
    straight_dist,
};

use crate::arena::{NO_PARENT, NodeBuffer, SearchNode};
use crate::pather::WayPather;
use crate::queue::OpenQueue;
use crate::route::Route;
use crate::search::{OVERWEIGHT_TOLERANCE_PERCENT, SearchContext, SearchMode};

/// Journey time per tile recorded when origin and destination coincide,
/// where the real time-per-distance quotient would divide by zero.
///
/// TODO: confirm whether this wants scaling by meters_per_tile on maps far
/// from the 250 m/tile default.
pub const FALLBACK_JOURNEY_TIME_PER_TILE: u32 = 10;

/// Near-duplicate target tiles of one destination cluster together during
/// the sweep, so a short memory suffices to dedupe them.
const RECENT_DESTINATIONS: usize = 8;

/// A destination the discovery sweep can record a connection to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    City(CityId),
    Industry(BuildingId),
    Attraction(BuildingId),
}

/// Per-origin-city table of journey-time-per-tile estimates.
///
/// Written by discovery sweeps under the table's own lock; read by the
/// economic simulation once the round completes. The `in_progress` flag
/// lets readers detect a half-finished sweep.
#[derive(Default)]
pub struct CityConnexions {
    table: Mutex<HashMap<Destination, u32>>,
    in_progress: AtomicBool,
}

impl CityConnexions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the estimate for one destination.
    pub fn add_road_connexion(&self, journey_time_per_tile: u32, dest: Destination) {
        let mut table = match self.table.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        table.insert(dest, journey_time_per_tile);
    }

    pub fn journey_time_to(&self, dest: Destination) -> Option<u32> {
        let table = match self.table.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        table.get(&dest).copied()
    }

    pub fn len(&self) -> usize {
        match self.table.lock() {
            Ok(g) => g.len(),
            Err(p) => p.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn discovery_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    fn set_in_progress(&self, v: bool) {
        self.in_progress.store(v, Ordering::Release);
    }
}

/// Two-phase rendezvous between discovery workers and a coordinator.
///
/// Workers park at the first phase; the coordinator does whatever it
/// paused them for between the phases, then everyone passes the second
/// phase and the sweeps resume from their saved open sets. On shutdown the
/// second phase is skipped on both sides so nobody waits for a peer that
/// already left.
pub struct DiscoveryPacer {
    barrier: Barrier,
    shutting_down: AtomicBool,
}

impl DiscoveryPacer {
    /// `parties` counts the workers plus the coordinator.
    pub fn new(parties: usize) -> Self {
        Self {
            barrier: Barrier::new(parties),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Must be set before the coordinator enters its final rendezvous.
    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Worker side: park until the coordinator releases the slice.
    pub fn yield_slice(&self) {
        self.barrier.wait();
        if !self.is_shutting_down() {
            self.barrier.wait();
        }
    }

    /// Coordinator side: gather all workers, run `f` while they are
    /// parked, then release them.
    pub fn control_slice<F: FnOnce()>(&self, f: F) {
        self.barrier.wait();
        f();
        if !self.is_shutting_down() {
            self.barrier.wait();
        }
    }
}

/// Receiver for the back-propagated routes, written onto the road tiles a
/// discovered route passed over for the "likely route" display. All writes
/// for one destination arrive between one `begin`/`end` bracket, walking
/// the route backwards from the destination.
pub trait CarRouteSink {
    fn backtrace_begin(&mut self) {}
    /// One road tile lies on the route to `dest`; `previous` is the tile
    /// walked just before (i.e. the next tile towards the destination).
    fn backtrace_add(&mut self, tile: Coord3, dest: Coord, previous: Option<Coord3>);
    /// Counts a road tile as carrying one more route, destination aside.
    fn backtrace_step(&mut self, tile: Coord3, previous: Option<Coord3>);
    fn backtrace_end(&mut self) {}
}

/// Inputs for [`Route::find_route`] beyond start and capability.
#[derive(Copy, Clone, Debug)]
pub struct FindRouteParams {
    pub max_speed: i32,
    /// Restricts the very first step only.
    pub start_dir: Ribi,
    pub axle_load: u32,
    /// Convoy length in tiles, for bridge load distribution.
    pub tile_length: i32,
    pub total_weight: u32,
    /// Bounds both the straight-line search radius and the open-set size.
    pub max_depth: u32,
    pub is_tall: bool,
    pub mode: SearchMode,
}

impl Default for FindRouteParams {
    fn default() -> Self {
        Self {
            max_speed: 1,
            start_dir: Ribi::ALL,
            axle_load: 0,
            tile_length: 0,
            total_weight: 0,
            max_depth: u32::MAX,
            is_tall: false,
            mode: SearchMode::Normal,
        }
    }
}

/// The discovery-only state of one sweep.
pub struct DiscoveryParams<'a> {
    pub connexions: &'a CityConnexions,
    pub sink: Option<&'a mut dyn CarRouteSink>,
    pub pacer: Option<&'a DiscoveryPacer>,
}

/// Ring of the last few destinations already traced this sweep.
#[derive(Default)]
struct RecentDestinations {
    ring: [Option<Coord>; RECENT_DESTINATIONS],
    next: usize,
}

impl RecentDestinations {
    fn contains(&self, c: Coord) -> bool {
        self.ring.iter().any(|e| *e == Some(c))
    }

    fn push(&mut self, c: Coord) {
        self.ring[self.next] = Some(c);
        self.next = (self.next + 1) % RECENT_DESTINATIONS;
    }
}

impl Route {
    /// Search to an unknown destination: expand outward from `start` until
    /// the capability's target test accepts a tile, then fill `self` with
    /// the path to it. Returns whether a target was reached.
    pub fn find_route<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        pather: &P,
        params: &FindRouteParams,
    ) -> bool {
        self.find_route_inner(ctx, start, pather, params, None)
    }

    /// Relaxed sweep recording every road-connected destination around
    /// `start` into `discovery.connexions`. The route itself is not kept;
    /// the return value only reports whether the sweep ended on a target
    /// within the step budget.
    pub fn discover_city_routes<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        pather: &P,
        params: &FindRouteParams,
        discovery: &mut DiscoveryParams<'_>,
    ) -> bool {
        discovery.connexions.set_in_progress(true);
        let ok = self.find_route_inner(ctx, start, pather, params, Some(discovery));
        discovery.connexions.set_in_progress(false);
        ok
    }

    fn find_route_inner<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        pather: &P,
        params: &FindRouteParams,
        mut discovery: Option<&mut DiscoveryParams<'_>>,
    ) -> bool {
        let map = ctx.map;

        self.clear();

        let Some(start_tile) = map.lookup(start) else {
            return false;
        };
        if !pather.check_tile(start_tile) {
            return false;
        }

        let wt = pather.way_type();
        let policy = ctx.settings.weight_limit_policy;
        let relaxed = discovery.is_some();
        let origin_city = if relaxed { map.city_at(start.to_2d()) } else { None };

        let max_step = ctx.pool.max_step();
        let mut nodes = ctx.pool.acquire();
        let mut queue = OpenQueue::new();
        ctx.marker.reset_for(map);

        let mut tmp_idx = nodes.push(SearchNode {
            parent: NO_PARENT,
            pos: start,
            g: 0,
            f: 0,
            dir: Ribi::NONE,
            ribi_from: Ribi::NONE,
            count: 0,
            jps_ribi: Ribi::ALL,
        });
        queue.insert(tmp_idx, 0);

        let mut start_dir = params.start_dir;
        let mut bridge_tile_count: u32 = 0;
        let mut recent = RecentDestinations::default();
        let mut slice_counter: u32 = 0;
        let mut gr = start_tile;

        loop {
            let Some(idx) = queue.pop() else { break };
            let t = map
                .lookup(nodes[idx].pos)
                .expect("search node references a missing tile");
            if !ctx.marker.test_and_mark(t) {
                tmp_idx = idx;
                gr = t;
                let tmp = nodes[tmp_idx];
                let prev = (tmp.parent != NO_PARENT)
                    .then(|| map.lookup(nodes[tmp.parent].pos))
                    .flatten();

                if pather.is_target(gr, prev) {
                    match discovery.as_deref_mut() {
                        // found one: stop and build the route below
                        None => break,
                        // relaxed: record and keep sweeping
                        Some(d) => record_discovery(
                            map,
                            ctx.settings,
                            &nodes,
                            tmp_idx,
                            start,
                            origin_city,
                            d,
                            &mut recent,
                            &mut slice_counter,
                        ),
                    }
                }

                let way_ribi = match gr.way(wt) {
                    Some(w) if wt.is_rail_family() && w.has_signal => w.ribi,
                    _ => pather.ribi(gr),
                };
                if gr.bridge {
                    bridge_tile_count += 1;
                } else {
                    bridge_tile_count = 0;
                }

                for dir in Ribi::NESW {
                    if !way_ribi.intersects(dir) || !start_dir.intersects(dir) {
                        continue;
                    }
                    // not too far out
                    if straight_dist(start.to_2d(), gr.pos.to_2d() + dir) >= params.max_depth {
                        continue;
                    }
                    let Some(to) = map.neighbour(gr, wt, dir) else {
                        continue;
                    };
                    if ctx.marker.is_marked(to) || !pather.check_tile(to) {
                        continue;
                    }
                    if params.is_tall && to.height_restricted {
                        continue;
                    }

                    let w = to.way(wt);

                    // only the blocking enforcement tiers apply here; the
                    // surcharge tier has no cost to add to
                    if matches!(
                        policy,
                        waygrid_core::WeightLimitPolicy::Strict
                            | waygrid_core::WeightLimitPolicy::Tolerant
                    ) && let Some(w) = w
                    {
                        let adjusted = if params.tile_length == 0 {
                            params.total_weight
                        } else {
                            params
                                .total_weight
                                .saturating_mul(bridge_tile_count.saturating_sub(2).max(1))
                                / params.tile_length.max(1) as u32
                        };
                        if params.axle_load > w.max_axle_load || adjusted > w.bridge_weight_limit {
                            if policy == waygrid_core::WeightLimitPolicy::Strict {
                                continue;
                            }
                            let axle_bad = w.max_axle_load == 0
                                || (params.axle_load as u64 * 100) / w.max_axle_load as u64
                                    > OVERWEIGHT_TOLERANCE_PERCENT;
                            let bridge_bad = w.bridge_weight_limit == 0
                                || (adjusted as u64 * 100) / w.bridge_weight_limit as u64
                                    > OVERWEIGHT_TOLERANCE_PERCENT;
                            if axle_bad || bridge_bad {
                                continue;
                            }
                        }
                    }

                    if params.mode == SearchMode::ChooseSignal
                        && w.is_some_and(|w| w.end_choose_sign)
                    {
                        continue;
                    }

                    let mut new_g = tmp.g + pather.cost(to, params.max_speed, dir);
                    let current_dir = if tmp.parent != NO_PARENT {
                        let cd = dir | tmp.ribi_from;
                        if tmp.dir != cd {
                            new_g += 3;
                            if tmp.dir.is_perpendicular(cd) {
                                if params.mode == SearchMode::ChooseSignal {
                                    // a V-turn from a choose signal routes
                                    // trains absurdly when part-blocked
                                    continue;
                                }
                                new_g += 25;
                            } else {
                                let parent = nodes[tmp.parent];
                                if parent.dir != tmp.dir && parent.parent != NO_PARENT {
                                    new_g += 10;
                                }
                            }
                        }
                        cd
                    } else {
                        dir
                    };

                    let ki = nodes.push(SearchNode {
                        parent: tmp_idx,
                        pos: to.pos,
                        g: new_g,
                        f: new_g,
                        dir: current_dir,
                        ribi_from: dir,
                        count: tmp.count + 1,
                        jps_ribi: Ribi::ALL,
                    });
                    queue.insert(ki, new_g);
                }

                // only the very first expansion is restricted
                start_dir = Ribi::ALL;
            }

            if queue.is_empty()
                || nodes.len() >= max_step
                || queue.len() as u32 >= params.max_depth
            {
                break;
            }
        }

        let tmp = nodes[tmp_idx];
        let step = nodes.len();
        let prev = (tmp.parent != NO_PARENT)
            .then(|| map.lookup(nodes[tmp.parent].pos))
            .flatten();

        if !pather.is_target(gr, prev) || step >= max_step {
            if step >= max_step {
                warn!("find_route: too many steps ({step} >= {max_step}), route too complex");
            }
            return false;
        }
        if relaxed {
            return true;
        }

        self.tiles = vec![Coord3::ZERO; tmp.count as usize + 1];
        let mut idx = tmp_idx;
        loop {
            let n = nodes[idx];
            self.tiles[n.count as usize] = n.pos;
            if n.parent == NO_PARENT {
                break;
            }
            idx = n.parent;
        }
        !self.is_empty()
    }
}

/// One qualifying target tile reached by the relaxed sweep: work out what
/// lives there, update the connexion table, and trace the route back onto
/// the roads if it is worth keeping.
#[allow(clippy::too_many_arguments)]
fn record_discovery(
    map: &TileMap,
    settings: &Settings,
    nodes: &NodeBuffer<'_>,
    tmp_idx: u32,
    start: Coord3,
    origin_city: Option<CityId>,
    d: &mut DiscoveryParams<'_>,
    recent: &mut RecentDestinations,
    slice_counter: &mut u32,
) {
    let tmp = nodes[tmp_idx];
    let k = tmp.pos;
    let Some(gr) = map.lookup(k) else { return };

    let origin_ref = origin_city
        .map(|o| map.city(o).townhall_road)
        .unwrap_or(start.to_2d());

    // a townhall road tile is a city destination
    let current_city = map.city_at(k.to_2d());
    let mut destination_city: Option<CityId> = None;
    if let Some(cid) = current_city
        && map.city(cid).townhall_road == k.to_2d()
    {
        destination_city = Some(cid);
        if origin_city.is_some() {
            if start.to_2d() == k.to_2d() {
                // rare, but two cities can share a townhall road tile
                d.connexions
                    .add_road_connexion(FALLBACK_JOURNEY_TIME_PER_TILE, Destination::City(cid));
            } else {
                let dist = straight_dist(origin_ref, k.to_2d()).max(1);
                d.connexions
                    .add_road_connexion(tmp.g / dist, Destination::City(cid));
            }
        }
    }

    // buildings served by the road over this tile
    let mut destination_industry: Option<BuildingId> = None;
    let mut destination_attraction: Option<BuildingId> = None;
    if gr.has_way(WayType::Road) && origin_city.is_some() {
        for &bid in &gr.connected_buildings {
            let b = map.building(bid);
            let dist = straight_dist(origin_ref, k.to_2d());
            let journey_time = if dist == 0 {
                FALLBACK_JOURNEY_TIME_PER_TILE
            } else {
                tmp.g / dist
            };
            match b.kind {
                BuildingKind::Industry => {
                    d.connexions
                        .add_road_connexion(journey_time, Destination::Industry(bid));
                    destination_industry = Some(bid);
                }
                BuildingKind::Attraction => {
                    d.connexions
                        .add_road_connexion(journey_time, Destination::Attraction(bid));
                    destination_attraction = Some(bid);
                }
                BuildingKind::CityBuilding => {}
            }
        }
    }

    // decide whether this destination's route goes onto the road tiles
    let mut record = destination_city.is_some();
    if let (Some(bid), Some(oid)) = (destination_industry, origin_city) {
        let b = map.building(bid);
        let demand_ok = b.visitor_demand > settings.industry_demand_threshold;
        let commute_ok = match settings.max_industry_commute_tiles {
            // workers will not commute to a distant producer
            Some(limit) if !b.consumer_only => {
                let city = map.city(oid);
                let max_dim = (city.max.x - city.min.x).max(city.max.y - city.min.y);
                let road_tiles =
                    straight_dist(b.pos, city.townhall_road) as i64 - (max_dim as i64 + 2);
                road_tiles < limit as i64
            }
            _ => true,
        };
        record |= demand_ok && commute_ok;
    }
    if let Some(bid) = destination_attraction {
        record |= map.building(bid).visitor_demand > settings.attraction_demand_threshold;
    }
    if destination_industry.is_none() && destination_attraction.is_none() {
        record |= settings.record_city_building_routes;
    }

    if record {
        // a building destination usually spans several road tiles; skip
        // ones we just traced
        let this_destination = destination_industry
            .or(destination_attraction)
            .map(|b| map.building(b).pos);
        let fresh = this_destination.is_none_or(|c| !recent.contains(c));
        if let Some(c) = this_destination {
            recent.push(c);
        }

        if fresh && let Some(sink) = d.sink.as_deref_mut() {
            let industry_pos = destination_industry.map(|b| map.building(b).pos);
            let attraction_pos = destination_attraction.map(|b| map.building(b).pos);
            let city_pos = destination_city.map(|c| map.city(c).townhall_road);

            sink.backtrace_begin();
            let mut idx = tmp_idx;
            let mut previous: Option<Coord3> = None;
            loop {
                *slice_counter += 1;
                let n = nodes[idx];
                if map.lookup(n.pos).is_some_and(|t| t.has_way(WayType::Road)) {
                    for dest in [industry_pos, attraction_pos, city_pos].into_iter().flatten() {
                        sink.backtrace_add(n.pos, dest, previous);
                    }
                    sink.backtrace_step(n.pos, previous);
                }
                previous = Some(n.pos);
                if n.parent == NO_PARENT {
                    break;
                }
                idx = n.parent;
            }
            sink.backtrace_end();
        }

        // yield so a coordinator can keep the simulation responsive while
        // a big sweep runs
        if let Some(pacer) = d.pacer {
            let slice = settings.discovery_tiles_per_slice;
            if slice > 0 && *slice_counter >= slice {
                pacer.yield_slice();
                *slice_counter = 0;
            }
        }
    }
}
