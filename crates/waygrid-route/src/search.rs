//! The core route search and its caller-facing wrapper.
//!
//! `intern_calc_route` is A* with lazy deletion: popped nodes already
//! closed by a cheaper path are skipped instead of supporting decrease-key
//! on the heap, trading a little heap space for a much simpler queue. On
//! water the neighbour expansion is pruned jump-point style; the resulting
//! stair-steps are straightened afterwards (see `postprocess`).
//!
//! Reference for the water pruning:
//! Harabor D. and Grastien A. 2011. Online Graph Pruning for Pathfinding on
//! Grid Maps. AAAI'11.

use log::warn;

use waygrid_core::{
    Coord3, Ribi, Settings, Tile, TileMap, Way, WayStyle, WayType, WeightLimitPolicy,
    straight_dist,
};

use crate::arena::{NO_PARENT, NodePool, SearchNode};
use crate::marker::Marker;
use crate::pather::WayPather;
use crate::queue::OpenQueue;
use crate::route::{Route, RouteResult};

/// Convoy tile-lengths at or above this value additionally request
/// "advance to the far end of the platform"; the flag is subtracted off
/// before the length is used.
pub const PLATFORM_END_SENTINEL: i32 = 8888;

/// Heuristic terms are scaled up so turn estimates can stay integral.
const HEURISTIC_SCALE: u32 = 10;
/// Flat penalty whenever the travel direction changes.
const TURN_PENALTY: u32 = 30;
/// Extra penalty for a 90° turn.
const TURN_90_PENALTY: u32 = 10;
/// Extra penalty for a V-turn (immediate doubling back).
const V_TURN_PENALTY: u32 = 25;
/// Weight of one estimated 45° turn in the heuristic.
const TURN_ESTIMATE_WEIGHT: u32 = 3;
/// Cost surcharge for overweight ways under report-only enforcement.
pub(crate) const OVERWEIGHT_SURCHARGE: u32 = 400;
/// Tolerant enforcement blocks ways loaded beyond this percentage.
pub(crate) const OVERWEIGHT_TOLERANCE_PERCENT: u64 = 110;

/// Everything a search borrows for its duration: the world, the tunables,
/// the node pool and this thread's visited marker.
pub struct SearchContext<'a> {
    pub map: &'a TileMap,
    pub settings: &'a Settings,
    pub pool: &'a NodePool,
    pub marker: &'a mut Marker,
}

/// Heuristic/penalty behaviour of a search.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Normal,
    /// Flat cost of 1 per tile, no turn or slope terms. Used when no real
    /// speed is available (e.g. zero top speed) and division-by-speed
    /// costs would be meaningless.
    SimpleCost,
    /// Searching an alternative platform from a choose signal: tiles with
    /// an end-of-choose sign are off limits, and V-turns are refused
    /// outright rather than surcharged.
    ChooseSignal,
}

/// Per-search inputs beyond start/goal and the capability itself.
#[derive(Copy, Clone, Debug)]
pub struct SearchParams {
    pub max_speed: i32,
    /// Abandon the search once accumulated cost reaches this.
    pub max_cost: u64,
    pub axle_load: u32,
    pub convoy_weight: u32,
    /// Convoy length in tiles, for bridge load distribution and platform
    /// handling; may carry [`PLATFORM_END_SENTINEL`].
    pub tile_length: i32,
    pub is_tall: bool,
    /// Treated as pre-visited, to avoid re-entering a just-left tile.
    pub avoid_tile: Option<Coord3>,
    /// Restricts the very first step only.
    pub start_dir: Ribi,
    pub mode: SearchMode,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_speed: 1,
            max_cost: u64::MAX,
            axle_load: 0,
            convoy_weight: 0,
            tile_length: 0,
            is_tall: false,
            avoid_tile: None,
            start_dir: Ribi::ALL,
            mode: SearchMode::Normal,
        }
    }
}

/// Outcome of one weight check, ordered by severity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Overweight {
    Not,
    SlowlyOnly,
    CannotRoute,
}

/// Grade a load against a limit under the given policy.
pub(crate) fn grade_overweight(policy: WeightLimitPolicy, load: u32, limit: u32) -> Overweight {
    if load <= limit {
        return Overweight::Not;
    }
    match policy {
        WeightLimitPolicy::Unenforced => Overweight::Not,
        WeightLimitPolicy::ReportOnly => Overweight::SlowlyOnly,
        WeightLimitPolicy::Strict => Overweight::CannotRoute,
        WeightLimitPolicy::Tolerant => {
            if limit == 0 || (load as u64 * 100) / limit as u64 > OVERWEIGHT_TOLERANCE_PERCENT {
                Overweight::CannotRoute
            } else {
                Overweight::SlowlyOnly
            }
        }
    }
}

/// The axle-load check shared by the bridge and non-bridge branches; also
/// records the lowest limit seen for later reporting.
pub(crate) fn check_axle_load(
    policy: WeightLimitPolicy,
    axle_load: u32,
    way_max: u32,
    max_seen: &mut u32,
) -> Overweight {
    *max_seen = (*max_seen).min(way_max);
    grade_overweight(policy, axle_load, way_max)
}

/// The four single directions ordered towards the goal: larger remaining
/// axis first, then the smaller, then their reversals.
pub(crate) fn next_dirs(from: Coord3, to: Coord3) -> [Ribi; 4] {
    let (first, second) = if (from.x - to.x).abs() > (from.y - to.y).abs() {
        (
            if to.x > from.x { Ribi::EAST } else { Ribi::WEST },
            if to.y > from.y { Ribi::SOUTH } else { Ribi::NORTH },
        )
    } else {
        (
            if to.y > from.y { Ribi::SOUTH } else { Ribi::NORTH },
            if to.x > from.x { Ribi::EAST } else { Ribi::WEST },
        )
    };
    [first, second, second.reversed(), first.reversed()]
}

impl Route {
    /// Compute a route from `start` to `goal` and handle driving into the
    /// destination halt: the route is extended to the platform end (or
    /// part-way in, if the convoy is shorter), and a platform shorter than
    /// the convoy downgrades the result to [`RouteResult::ValidHaltTooShort`].
    ///
    /// On any failure the route still holds the start tile, so callers
    /// always observe a non-empty route.
    pub fn calc_route<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        goal: Coord3,
        pather: &P,
        params: &SearchParams,
    ) -> RouteResult {
        self.clear();

        // Ships: if the straight-line distance alone busts the step
        // budget, do not even try. Keeps the simulation responsive when a
        // line edit suddenly strands many vessels.
        let scaled = straight_dist(start.to_2d(), goal.to_2d()).saturating_mul(600);
        if pather.way_type() == WayType::Water && scaled > ctx.settings.max_route_steps {
            self.push(start);
            return RouteResult::TooComplex;
        }

        let ok = self.intern_calc_route(ctx, start, goal, pather, params);
        if ok != RouteResult::Valid {
            self.clear();
            self.push(start);
            return ok;
        }

        let mut max_len = params.tile_length;
        let move_to_end = max_len >= PLATFORM_END_SENTINEL;
        if move_to_end {
            max_len -= PLATFORM_END_SENTINEL;
        }
        if max_len <= 1 {
            return ok;
        }
        self.extend_into_platform(ctx, goal, pather, max_len, move_to_end)
    }

    /// The A*/JPS loop itself. Fills `self` with the tile sequence on
    /// success; the route content is unspecified on failure.
    pub(crate) fn intern_calc_route<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        goal: Coord3,
        pather: &P,
        params: &SearchParams,
    ) -> RouteResult {
        let map = ctx.map;

        self.clear();

        let Some(start_tile) = map.lookup(start) else {
            return RouteResult::NoRoute;
        };
        if map.lookup(goal).is_none() {
            return RouteResult::NoRoute;
        }
        if !pather.check_tile(start_tile) {
            return RouteResult::NoRoute;
        }

        let wt = pather.way_type();
        let is_airborne = wt == WayType::Air;
        let climb_cost = if params.mode == SearchMode::SimpleCost {
            0
        } else {
            pather.climb_cost()
        };
        // Open water gets jump-point pruning; the stair-steps it produces
        // are straightened once the route is complete.
        let use_jps = wt == WayType::Water;

        let max_step = ctx.pool.max_step();
        let mut nodes = ctx.pool.acquire();
        let mut queue = OpenQueue::new();

        ctx.marker.reset_for(map);
        if let Some(avoid) = params.avoid_tile
            && let Some(t) = map.lookup(avoid)
        {
            ctx.marker.mark(t);
        }

        let mut tmp_idx = nodes.push(SearchNode {
            parent: NO_PARENT,
            pos: start,
            g: 0,
            f: straight_dist(start.to_2d(), goal.to_2d()) * HEURISTIC_SCALE,
            dir: Ribi::NONE,
            ribi_from: Ribi::NONE,
            count: 0,
            jps_ribi: Ribi::ALL,
        });
        queue.insert(tmp_idx, nodes[tmp_idx].f);

        let policy = ctx.settings.weight_limit_policy;
        let mut new_top: Option<u32> = None;
        let mut bridge_tile_count: u32 = 0;
        let mut reached_goal = false;
        let mut gr: &Tile;

        loop {
            if let Some(idx) = new_top.take() {
                // best candidate held out of the heap; cannot be closed yet
                tmp_idx = idx;
                gr = map
                    .lookup(nodes[tmp_idx].pos)
                    .expect("search node references a missing tile");
                ctx.marker.mark(gr);
            } else {
                let Some(idx) = queue.pop() else { break };
                tmp_idx = idx;
                gr = map
                    .lookup(nodes[tmp_idx].pos)
                    .expect("search node references a missing tile");
                if ctx.marker.test_and_mark(gr) {
                    // already closed via a cheaper path (lazy deletion)
                    continue;
                }
            }

            if gr.pos == goal {
                reached_goal = true;
                break;
            }

            let mut topnode_f = queue.peek_f().unwrap_or(u32::MAX);

            let way = gr.way(wt);
            // A signal exposes the physical connections regardless of the
            // capability's masked view.
            let way_ribi = match way {
                Some(w) if w.has_signal => w.ribi,
                _ => pather.ribi(gr),
            };
            let tmp = nodes[tmp_idx];
            let ribi = way_ribi & !tmp.ribi_from.reversed() & tmp.jps_ribi;

            // water connectivity of the expanded tile; land or the map
            // edge clears bits, which re-opens those directions in the
            // children's jump-point masks below
            let water_ribi = if use_jps && gr.water {
                map.water_ribi(gr)
            } else {
                way_ribi
            };

            for dir in next_dirs(gr.pos, goal) {
                if !ribi.intersects(dir) {
                    continue;
                }
                if tmp.parent == NO_PARENT && !dir.intersects(params.start_dir) {
                    continue;
                }

                let to = if is_airborne {
                    map.lookup_surface(gr.pos.to_2d() + dir)
                } else {
                    map.neighbour(gr, wt, dir)
                };
                let Some(to) = to else { continue };
                if !pather.check_tile(to) || ctx.marker.is_marked(to) {
                    continue;
                }

                // One-way markers forbid entry, with one exception: rail
                // signals act directionally rather than topologically, so
                // a signalled tile stays routable against its mask.
                let w = to.way(wt);
                let oneway = w.map(|w| w.oneway_mask).unwrap_or(Ribi::NONE);
                if dir.intersects(oneway)
                    && !(wt.is_rail_family() && w.is_some_and(|w| w.has_signal))
                {
                    continue;
                }

                if params.is_tall && to.height_restricted {
                    continue;
                }

                let mut overweight = Overweight::Not;
                if policy != WeightLimitPolicy::Unenforced
                    && let Some(w) = w
                {
                    overweight =
                        self.check_way_weight(w, to, policy, params, &mut bridge_tile_count);
                    if overweight == Overweight::CannotRoute {
                        continue;
                    }
                }

                if params.mode == SearchMode::ChooseSignal && w.is_some_and(|w| w.end_choose_sign)
                {
                    continue;
                }

                // step cost; without a way (open water, air) a flat 10
                let mut new_g = tmp.g
                    + match (w, params.mode) {
                        (_, SearchMode::SimpleCost) => 1,
                        (Some(_), _) => {
                            pather.cost(to, params.max_speed, dir)
                                + if overweight == Overweight::SlowlyOnly {
                                    OVERWEIGHT_SURCHARGE
                                } else {
                                    0
                                }
                        }
                        (None, _) => 10,
                    };

                // turn grading needs the last and last-but-one steps
                let current_dir;
                if tmp.parent != NO_PARENT && params.mode != SearchMode::SimpleCost {
                    current_dir = dir | tmp.ribi_from;
                    if tmp.dir != current_dir {
                        new_g += TURN_PENALTY;
                        let parent = nodes[tmp.parent];
                        if parent.dir != tmp.dir && parent.parent != NO_PARENT {
                            new_g += TURN_90_PENALTY;
                        } else if tmp.dir.is_perpendicular(current_dir) {
                            new_g += V_TURN_PENALTY;
                        }
                    }
                } else {
                    current_dir = dir;
                }

                let dist = straight_dist(to.pos.to_2d(), goal.to_2d());

                // estimated 45°-turns still needed to face the goal
                let mut turns: u32 = 0;
                if dist > 1 && params.mode != SearchMode::SimpleCost {
                    let mut to_target = Ribi::toward3(to.pos, goal);
                    if !to_target.is_none() && to_target != current_dir {
                        if to_target.is_single() != current_dir.is_single() {
                            to_target = to_target.rotated45();
                            turns += 1;
                        }
                        let mut guard = 0;
                        while to_target != current_dir && guard < 4 {
                            to_target = to_target.rotated90();
                            turns += 2;
                            guard += 1;
                        }
                        if turns > 4 {
                            turns = 8u32.saturating_sub(turns);
                        }
                    }
                }

                let climb = climb_cost * (goal.z - to.vmove(dir)).max(0) as u32;
                let new_f = (new_g + dist + turns * TURN_ESTIMATE_WEIGHT + climb) * HEURISTIC_SCALE;

                let mut jps_ribi = Ribi::ALL;
                if use_jps && to.water && tmp.parent != NO_PARENT {
                    // keep going straight (or along the diagonal's two
                    // component directions) until the water forces a turn;
                    // canals always re-open their own directions
                    jps_ribi = !water_ribi | current_dir | to.canal_ribi;
                    if gr.water {
                        jps_ribi |= gr.canal_ribi;
                    }
                }

                let ki = nodes.push(SearchNode {
                    parent: tmp_idx,
                    pos: to.pos,
                    g: new_g,
                    f: new_f,
                    dir: current_dir,
                    ribi_from: dir,
                    count: tmp.count + 1,
                    jps_ribi,
                });

                if new_f <= topnode_f {
                    // best next candidate: skip the heap round-trip
                    topnode_f = new_f;
                    if let Some(prev) = new_top.replace(ki) {
                        queue.insert(prev, nodes[prev].f);
                    }
                } else {
                    queue.insert(ki, new_f);
                }
            }

            if (queue.is_empty() && new_top.is_none())
                || nodes.len() >= max_step
                || nodes[tmp_idx].g as u64 >= params.max_cost
            {
                break;
            }
        }

        let tmp = nodes[tmp_idx];
        let step = nodes.len();
        if !reached_goal
            || step >= max_step
            || tmp.g as u64 >= params.max_cost
            || tmp.parent == NO_PARENT
        {
            if step >= max_step {
                warn!("intern_calc_route: too many steps ({step} >= {max_step}), route too complex");
                return RouteResult::TooComplex;
            }
            return RouteResult::NoRoute;
        }

        // walk the parent chain backwards into the right slots
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
        drop(nodes);

        if use_jps {
            self.postprocess_water_route(map);
        }
        RouteResult::Valid
    }

    /// Weight enforcement for one candidate tile. Bridge spans (real
    /// bridges, elevated ways, water and air ways) grade the convoy weight
    /// scaled down to the part of the convoy actually on the span; other
    /// ways grade the axle load. A real bridge constrains both.
    fn check_way_weight(
        &mut self,
        w: &Way,
        to: &Tile,
        policy: WeightLimitPolicy,
        params: &SearchParams,
        bridge_tile_count: &mut u32,
    ) -> Overweight {
        let on_span = to.bridge
            || w.style == WayStyle::Elevated
            || w.way_type == WayType::Air
            || w.way_type == WayType::Water;
        if !on_span {
            *bridge_tile_count = 0;
            return check_axle_load(policy, params.axle_load, w.max_axle_load, &mut self.max_axle_load);
        }

        *bridge_tile_count += 1;

        // Tram tracks on a bridge defer to the underlying road way's
        // limit; without one, only the axle check applies.
        let limit = if w.style == WayStyle::Tram {
            match to.way(WayType::Road) {
                Some(road) => road.bridge_weight_limit,
                None => {
                    return check_axle_load(
                        policy,
                        params.axle_load,
                        w.max_axle_load,
                        &mut self.max_axle_load,
                    );
                }
            }
        } else {
            w.bridge_weight_limit
        };

        // only the convoy tiles actually on the span count
        let tile_length = params.tile_length;
        let proper_tile_length = if tile_length > PLATFORM_END_SENTINEL {
            tile_length - PLATFORM_END_SENTINEL
        } else {
            tile_length
        };
        let adjusted = if tile_length == 0 {
            params.convoy_weight
        } else {
            params
                .convoy_weight
                .saturating_mul((*bridge_tile_count).saturating_sub(2).max(1))
                / proper_tile_length.max(1) as u32
        };
        let min_weight = adjusted.min(params.convoy_weight);
        self.max_convoy_weight = self.max_convoy_weight.min(limit);

        let mut over = grade_overweight(policy, min_weight, limit);
        if to.bridge {
            over = over.max(check_axle_load(
                policy,
                params.axle_load,
                w.max_axle_load,
                &mut self.max_axle_load,
            ));
        }
        over
    }

    /// Drive the route further into the destination platform.
    fn extend_into_platform<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        goal: Coord3,
        pather: &P,
        max_len: i32,
        move_to_end: bool,
    ) -> RouteResult {
        let map = ctx.map;
        let Some(goal_tile) = map.lookup(goal) else {
            return RouteResult::Valid;
        };
        let Some(halt) = goal_tile.halt else {
            return RouteResult::Valid;
        };
        if self.len() < 2 {
            return RouteResult::Valid;
        }
        let wt = pather.way_type();
        let is_rail = wt.is_rail_family();

        // platform tiles already covered by the route
        let mut platform_size: i32 = 0;
        for i in (0..self.len()).rev() {
            match map.lookup(self.at(i)) {
                Some(t) if t.halt == Some(halt) => platform_size += 1,
                _ => break,
            }
        }

        let n = self.len() - 1;
        let dirv = Ribi::toward3(self.at(n - 1), self.at(n));

        let mut gr = goal_tile;
        let mut ribi_check = pather.ribi(gr).intersects(dirv);
        let mut first_run = true;

        loop {
            let Some(next) = map.neighbour(gr, wt, dirv) else { break };
            if next.halt != Some(halt) || !pather.check_tile(next) {
                break;
            }
            if !(ribi_check || (first_run && is_rail)) {
                break;
            }
            first_run = false;
            gr = next;
            let has_signal = gr.way(wt).is_some_and(|w| w.has_signal);

            // one-way restriction ends the platform walk, except at a
            // rail signal
            let go_dir = gr.way(wt).map(|w| w.oneway_mask).unwrap_or(Ribi::ALL);
            if dirv.intersects(go_dir) && !(is_rail && has_signal) {
                break;
            }

            self.push(gr.pos);
            platform_size += 1;

            ribi_check = if has_signal {
                gr.way(wt).map(|w| w.ribi).unwrap_or(Ribi::NONE).intersects(dirv)
            } else {
                pather.ribi(gr).intersects(dirv)
            };
        }

        if !move_to_end && platform_size > max_len {
            // stop part way along the platform rather than at its end
            let mut truncate =
                (((platform_size - max_len) + 1) >> 1).min(self.len() as i32 - 1);
            while truncate > 0 {
                self.tiles.pop();
                truncate -= 1;
            }
        }

        if max_len > platform_size {
            return RouteResult::ValidHaltTooShort;
        }
        RouteResult::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_dirs_orders_larger_axis_first() {
        let from = Coord3::new(0, 0, 0);
        let to = Coord3::new(10, 3, 0);
        let dirs = next_dirs(from, to);
        assert_eq!(dirs[0], Ribi::EAST);
        assert_eq!(dirs[1], Ribi::SOUTH);
        assert_eq!(dirs[2], Ribi::NORTH);
        assert_eq!(dirs[3], Ribi::WEST);
    }

    #[test]
    fn overweight_grading() {
        use WeightLimitPolicy::*;
        assert_eq!(grade_overweight(Strict, 10, 10), Overweight::Not);
        assert_eq!(grade_overweight(Strict, 11, 10), Overweight::CannotRoute);
        assert_eq!(grade_overweight(ReportOnly, 11, 10), Overweight::SlowlyOnly);
        // tolerant: up to 10% over passes with surcharge
        assert_eq!(grade_overweight(Tolerant, 110, 100), Overweight::SlowlyOnly);
        assert_eq!(grade_overweight(Tolerant, 111, 100), Overweight::CannotRoute);
        assert_eq!(grade_overweight(Tolerant, 1, 0), Overweight::CannotRoute);
        assert_eq!(grade_overweight(Unenforced, 1000, 1), Overweight::Not);
    }

    #[test]
    fn axle_check_records_minimum() {
        let mut seen = u32::MAX;
        let r = check_axle_load(WeightLimitPolicy::Strict, 8, 20, &mut seen);
        assert_eq!(r, Overweight::Not);
        assert_eq!(seen, 20);
        let r = check_axle_load(WeightLimitPolicy::Strict, 8, 12, &mut seen);
        assert_eq!(r, Overweight::Not);
        assert_eq!(seen, 12);
        let r = check_axle_load(WeightLimitPolicy::Strict, 30, 25, &mut seen);
        assert_eq!(r, Overweight::CannotRoute);
        assert_eq!(seen, 12);
    }

    use rand::{RngExt, SeedableRng};
    use waygrid_core::{HaltId, Way};

    use crate::arena::NodePool;
    use crate::marker::Marker;

    fn road_grid(w: i32, h: i32) -> TileMap {
        let mut map = TileMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut t = Tile::new(Coord3::new(x, y, 0));
                t.ways.push(Way::new(WayType::Road, Ribi::ALL));
                map.insert(t);
            }
        }
        map
    }

    struct Car;

    impl crate::pather::WayPather for Car {
        fn way_type(&self) -> WayType {
            WayType::Road
        }
        fn check_tile(&self, tile: &Tile) -> bool {
            tile.has_way(WayType::Road)
        }
        fn ribi(&self, tile: &Tile) -> Ribi {
            tile.way(WayType::Road).map(|w| w.ribi).unwrap_or(Ribi::NONE)
        }
        fn cost(&self, _tile: &Tile, _max_speed: i32, _from: Ribi) -> u32 {
            1
        }
        fn is_target(&self, _tile: &Tile, _prev: Option<&Tile>) -> bool {
            false
        }
    }

    fn bits(map: &TileMap, settings: &Settings) -> (NodePool, Marker) {
        (
            NodePool::with_slots(settings.max_route_steps, Some(map.size()), 2),
            Marker::for_map(map),
        )
    }

    fn assert_contiguous_and_unique(r: &crate::route::Route) {
        for i in 1..r.len() {
            let d = r.at(i) - r.at(i - 1);
            assert_eq!(d.x.abs() + d.y.abs(), 1, "gap or diagonal at index {i}");
        }
        let mut seen = std::collections::HashSet::new();
        for i in 0..r.len() {
            assert!(seen.insert(r.at(i)), "revisited tile at index {i}");
        }
    }

    #[test]
    fn straight_route_is_exact() {
        let map = road_grid(10, 4);
        let settings = Settings::default();
        let (pool, mut marker) = bits(&map, &settings);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(1, 1, 0),
            Coord3::new(8, 1, 0),
            &Car,
            &SearchParams::default(),
        );
        assert_eq!(res, crate::route::RouteResult::Valid);
        let expect: Vec<_> = (1..=8).map(|x| Coord3::new(x, 1, 0)).collect();
        assert_eq!(r.tiles(), &expect[..]);
    }

    #[test]
    fn start_equals_goal_is_no_route() {
        let map = road_grid(6, 4);
        let settings = Settings::default();
        let (pool, mut marker) = bits(&map, &settings);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(2, 2, 0),
            Coord3::new(2, 2, 0),
            &Car,
            &SearchParams::default(),
        );
        assert_eq!(res, crate::route::RouteResult::NoRoute);
        // failed routes still carry the start tile
        assert_eq!(r.tiles(), &[Coord3::new(2, 2, 0)]);
    }

    #[test]
    fn random_pairs_take_a_shortest_path() {
        let map = road_grid(16, 16);
        let settings = Settings::default();
        let (pool, mut marker) = bits(&map, &settings);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let start = Coord3::new(rng.random_range(0..16), rng.random_range(0..16), 0);
            let goal = Coord3::new(rng.random_range(0..16), rng.random_range(0..16), 0);
            if start == goal {
                continue;
            }
            let mut ctx = SearchContext {
                map: &map,
                settings: &settings,
                pool: &pool,
                marker: &mut marker,
            };
            let mut r = crate::route::Route::new();
            let res = r.calc_route(&mut ctx, start, goal, &Car, &SearchParams::default());
            assert_eq!(res, crate::route::RouteResult::Valid, "{start:?} -> {goal:?}");
            assert_contiguous_and_unique(&r);
            assert_eq!(r.front(), start);
            assert_eq!(r.back(), goal);
            // with unit tile costs and turn penalties, every optimal path
            // on an open grid is manhattan-shortest
            let manhattan = (start.x - goal.x).unsigned_abs() + (start.y - goal.y).unsigned_abs();
            assert_eq!(r.len() as u32, manhattan + 1, "{start:?} -> {goal:?}");
        }
    }

    fn limited_row(limit_at: i32, max_axle_load: u32) -> TileMap {
        let mut map = road_grid(10, 1);
        let w = map
            .lookup_mut(Coord3::new(limit_at, 0, 0))
            .and_then(|t| t.way_mut(WayType::Road))
            .unwrap();
        w.max_axle_load = max_axle_load;
        map
    }

    fn weight_result(map: &TileMap, policy: WeightLimitPolicy, axle_load: u32) -> (RouteResult, crate::route::Route) {
        let settings = Settings {
            weight_limit_policy: policy,
            ..Settings::default()
        };
        let (pool, mut marker) = bits(map, &settings);
        let mut ctx = SearchContext {
            map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let params = SearchParams {
            axle_load,
            ..SearchParams::default()
        };
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(0, 0, 0),
            Coord3::new(9, 0, 0),
            &Car,
            &params,
        );
        (res, r)
    }

    #[test]
    fn strict_policy_blocks_overweight() {
        let map = limited_row(5, 10);
        let (res, _) = weight_result(&map, WeightLimitPolicy::Strict, 20);
        assert_eq!(res, RouteResult::NoRoute);
    }

    #[test]
    fn report_only_passes_and_records_limit() {
        let map = limited_row(5, 10);
        let (res, r) = weight_result(&map, WeightLimitPolicy::ReportOnly, 20);
        assert_eq!(res, RouteResult::Valid);
        assert_eq!(r.max_axle_load(), 10);
    }

    #[test]
    fn tolerant_policy_allows_ten_percent() {
        let map = limited_row(5, 10);
        let (res, _) = weight_result(&map, WeightLimitPolicy::Tolerant, 11);
        assert_eq!(res, RouteResult::Valid);
        let (res, _) = weight_result(&map, WeightLimitPolicy::Tolerant, 12);
        assert_eq!(res, RouteResult::NoRoute);
    }

    #[test]
    fn strict_policy_detours_around_limit() {
        let mut map = road_grid(10, 2);
        let w = map
            .lookup_mut(Coord3::new(4, 0, 0))
            .and_then(|t| t.way_mut(WayType::Road))
            .unwrap();
        w.max_axle_load = 10;
        let settings = Settings {
            weight_limit_policy: WeightLimitPolicy::Strict,
            ..Settings::default()
        };
        let (pool, mut marker) = bits(&map, &settings);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let params = SearchParams {
            axle_load: 20,
            ..SearchParams::default()
        };
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(0, 0, 0),
            Coord3::new(9, 0, 0),
            &Car,
            &params,
        );
        assert_eq!(res, RouteResult::Valid);
        assert_contiguous_and_unique(&r);
        assert!(!r.tiles().contains(&Coord3::new(4, 0, 0)));
    }

    #[test]
    fn exhausted_step_budget_is_too_complex() {
        let map = road_grid(30, 2);
        let settings = Settings::default();
        let pool = NodePool::with_slots(10, None, 1);
        let mut marker = Marker::for_map(&map);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(0, 0, 0),
            Coord3::new(29, 0, 0),
            &Car,
            &SearchParams::default(),
        );
        assert_eq!(res, RouteResult::TooComplex);
        assert_eq!(r.tiles(), &[Coord3::new(0, 0, 0)]);
    }

    #[test]
    fn avoid_tile_is_treated_as_visited() {
        let map = road_grid(10, 1);
        let settings = Settings::default();
        let (pool, mut marker) = bits(&map, &settings);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let params = SearchParams {
            avoid_tile: Some(Coord3::new(5, 0, 0)),
            ..SearchParams::default()
        };
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(1, 0, 0),
            Coord3::new(8, 0, 0),
            &Car,
            &params,
        );
        assert_eq!(res, RouteResult::NoRoute);
    }

    fn platform_map(halt_from: i32, halt_to: i32) -> TileMap {
        let mut map = road_grid(12, 1);
        for x in halt_from..=halt_to {
            map.lookup_mut(Coord3::new(x, 0, 0)).unwrap().halt = Some(HaltId(1));
        }
        map
    }

    fn platform_result(map: &TileMap, tile_length: i32) -> (RouteResult, crate::route::Route) {
        let settings = Settings::default();
        let (pool, mut marker) = bits(map, &settings);
        let mut ctx = SearchContext {
            map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let params = SearchParams {
            tile_length,
            ..SearchParams::default()
        };
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(1, 0, 0),
            Coord3::new(6, 0, 0),
            &Car,
            &params,
        );
        (res, r)
    }

    #[test]
    fn short_convoy_stops_partway_into_platform() {
        let map = platform_map(6, 10);
        let (res, r) = platform_result(&map, 3);
        assert_eq!(res, RouteResult::Valid);
        // platform is 5 tiles; a 3-tile convoy pulls in just far enough
        assert_eq!(r.back(), Coord3::new(9, 0, 0));
    }

    #[test]
    fn sentinel_length_drives_to_platform_end() {
        let map = platform_map(6, 10);
        let (res, r) = platform_result(&map, PLATFORM_END_SENTINEL + 3);
        assert_eq!(res, RouteResult::Valid);
        assert_eq!(r.back(), Coord3::new(10, 0, 0));
    }

    #[test]
    fn platform_shorter_than_convoy_is_flagged() {
        let map = platform_map(6, 7);
        let (res, r) = platform_result(&map, 4);
        assert_eq!(res, RouteResult::ValidHaltTooShort);
        assert_eq!(r.back(), Coord3::new(7, 0, 0));
    }

    #[test]
    fn concurrent_searches_share_the_pool() {
        use std::sync::Arc;
        let map = Arc::new(road_grid(16, 16));
        let settings = Arc::new(Settings::default());
        let pool = Arc::new(NodePool::with_slots(
            settings.max_route_steps,
            Some(map.size()),
            4,
        ));
        let mut handles = Vec::new();
        for t in 0..4i32 {
            let map = Arc::clone(&map);
            let settings = Arc::clone(&settings);
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                let mut marker = Marker::for_map(&map);
                for i in 0..20 {
                    let mut ctx = SearchContext {
                        map: &map,
                        settings: &settings,
                        pool: &pool,
                        marker: &mut marker,
                    };
                    let mut r = crate::route::Route::new();
                    let res = r.calc_route(
                        &mut ctx,
                        Coord3::new(t * 3, i % 16, 0),
                        Coord3::new(15 - t, (i * 3) % 16, 0),
                        &Car,
                        &SearchParams::default(),
                    );
                    assert!(matches!(
                        res,
                        RouteResult::Valid | RouteResult::NoRoute
                    ));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn very_long_route_is_reconstructed_exactly() {
        // serpentine corridor: rows joined at alternating ends, forcing a
        // single path over every tile of a 300x240 map (72000 hops)
        let (w, h) = (300, 240);
        let mut map = TileMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut ribi = Ribi::EAST | Ribi::WEST;
                if (y % 2 == 0 && x == w - 1) || (y % 2 == 1 && x == 0) {
                    ribi |= Ribi::SOUTH;
                }
                if (y % 2 == 1 && x == w - 1) || (y % 2 == 0 && x == 0) {
                    ribi |= Ribi::NORTH;
                }
                let mut t = Tile::new(Coord3::new(x, y, 0));
                t.ways.push(Way::new(WayType::Road, ribi));
                map.insert(t);
            }
        }
        let settings = Settings::default();
        let pool = NodePool::with_slots(settings.max_route_steps, Some(map.size()), 1);
        let mut marker = Marker::for_map(&map);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(0, 0, 0),
            Coord3::new(0, h - 1, 0),
            &Car,
            &SearchParams::default(),
        );
        assert_eq!(res, RouteResult::Valid);
        assert_eq!(r.len(), (w * h) as usize);
        assert_eq!(r.front(), Coord3::new(0, 0, 0));
        assert_eq!(r.back(), Coord3::new(0, h - 1, 0));
        // second row is entered at its far end
        assert_eq!(r.at(w as usize), Coord3::new(w - 1, 1, 0));
    }

    struct Ship;

    impl crate::pather::WayPather for Ship {
        fn way_type(&self) -> WayType {
            WayType::Water
        }
        fn check_tile(&self, tile: &Tile) -> bool {
            tile.water
        }
        fn ribi(&self, tile: &Tile) -> Ribi {
            if tile.water { Ribi::ALL } else { Ribi::NONE }
        }
        fn cost(&self, _tile: &Tile, _max_speed: i32, _from: Ribi) -> u32 {
            1
        }
        fn is_target(&self, _tile: &Tile, _prev: Option<&Tile>) -> bool {
            false
        }
    }

    fn water_map(w: i32, h: i32) -> TileMap {
        let mut map = TileMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                map.insert(Tile::water(Coord3::new(x, y, 0)));
            }
        }
        map
    }

    #[test]
    fn water_route_turns_around_land() {
        let mut map = water_map(20, 12);
        // a land wall across the line of travel, open water at rows 0..=1
        for x in 8..=10 {
            for y in 2..12 {
                map.insert(Tile::new(Coord3::new(x, y, 0)));
            }
        }
        let settings = Settings::default();
        let (pool, mut marker) = bits(&map, &settings);
        let mut ctx = SearchContext {
            map: &map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(2, 6, 0),
            Coord3::new(17, 6, 0),
            &Ship,
            &SearchParams::default(),
        );
        assert_eq!(res, RouteResult::Valid);
        assert_contiguous_and_unique(&r);
        assert_eq!(r.front(), Coord3::new(2, 6, 0));
        assert_eq!(r.back(), Coord3::new(17, 6, 0));
        assert!(
            r.tiles()
                .iter()
                .all(|&p| map.lookup(p).is_some_and(|t| t.water))
        );
    }

    #[test]
    fn canal_reopens_turns_in_open_water() {
        // far from land the pruning pins each step to its current line;
        // only the canal's own directions allow the southward turn
        let canal_map = || {
            let mut map = water_map(10, 6);
            for y in 1..=4 {
                let mut t = Tile::water(Coord3::new(5, y, 0));
                t.canal_ribi = Ribi::NORTH | Ribi::SOUTH;
                map.insert(t);
            }
            map
        };

        let run = |map: &TileMap| {
            let settings = Settings::default();
            let (pool, mut marker) = bits(map, &settings);
            let mut ctx = SearchContext {
                map,
                settings: &settings,
                pool: &pool,
                marker: &mut marker,
            };
            let mut r = crate::route::Route::new();
            let res = r.calc_route(
                &mut ctx,
                Coord3::new(1, 1, 0),
                Coord3::new(5, 4, 0),
                &Ship,
                &SearchParams::default(),
            );
            (res, r)
        };

        let (res, r) = run(&canal_map());
        assert_eq!(res, RouteResult::Valid);
        assert_contiguous_and_unique(&r);
        assert_eq!(r.back(), Coord3::new(5, 4, 0));

        let (res, _) = run(&water_map(10, 6));
        assert_ne!(res, RouteResult::Valid);
    }

    struct Train;

    impl crate::pather::WayPather for Train {
        fn way_type(&self) -> WayType {
            WayType::Rail
        }
        fn check_tile(&self, tile: &Tile) -> bool {
            tile.has_way(WayType::Rail)
        }
        fn ribi(&self, tile: &Tile) -> Ribi {
            tile.way(WayType::Rail).map(|w| w.ribi).unwrap_or(Ribi::NONE)
        }
        fn cost(&self, _tile: &Tile, _max_speed: i32, _from: Ribi) -> u32 {
            1
        }
        fn is_target(&self, _tile: &Tile, _prev: Option<&Tile>) -> bool {
            false
        }
    }

    fn eastbound_attempt<P: crate::pather::WayPather>(map: &TileMap, pather: &P) -> RouteResult {
        let settings = Settings::default();
        let (pool, mut marker) = bits(map, &settings);
        let mut ctx = SearchContext {
            map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        r.calc_route(
            &mut ctx,
            Coord3::new(1, 0, 0),
            Coord3::new(7, 0, 0),
            pather,
            &SearchParams::default(),
        )
    }

    #[test]
    fn signal_overrides_oneway_on_rail_only() {
        let mut rail = TileMap::new(10, 1);
        for x in 0..10 {
            let mut t = Tile::new(Coord3::new(x, 0, 0));
            t.ways.push(Way::new(WayType::Rail, Ribi::EAST | Ribi::WEST));
            rail.insert(t);
        }
        rail.lookup_mut(Coord3::new(4, 0, 0))
            .and_then(|t| t.way_mut(WayType::Rail))
            .unwrap()
            .oneway_mask = Ribi::EAST;
        assert_eq!(eastbound_attempt(&rail, &Train), RouteResult::NoRoute);

        rail.lookup_mut(Coord3::new(4, 0, 0))
            .and_then(|t| t.way_mut(WayType::Rail))
            .unwrap()
            .has_signal = true;
        assert_eq!(eastbound_attempt(&rail, &Train), RouteResult::Valid);

        // the exception is a rail-family rule; a signalled road stays blocked
        let mut road = road_grid(10, 1);
        let w = road
            .lookup_mut(Coord3::new(4, 0, 0))
            .and_then(|t| t.way_mut(WayType::Road))
            .unwrap();
        w.oneway_mask = Ribi::EAST;
        w.has_signal = true;
        assert_eq!(eastbound_attempt(&road, &Car), RouteResult::NoRoute);
    }

    #[test]
    fn choose_mode_respects_end_of_choose_sign() {
        let mut map = road_grid(10, 1);
        map.lookup_mut(Coord3::new(4, 0, 0))
            .and_then(|t| t.way_mut(WayType::Road))
            .unwrap()
            .end_choose_sign = true;

        let run = |mode: SearchMode| {
            let settings = Settings::default();
            let (pool, mut marker) = bits(&map, &settings);
            let mut ctx = SearchContext {
                map: &map,
                settings: &settings,
                pool: &pool,
                marker: &mut marker,
            };
            let mut r = crate::route::Route::new();
            r.calc_route(
                &mut ctx,
                Coord3::new(1, 0, 0),
                Coord3::new(7, 0, 0),
                &Car,
                &SearchParams { mode, ..SearchParams::default() },
            )
        };

        assert_eq!(run(SearchMode::Normal), RouteResult::Valid);
        assert_eq!(run(SearchMode::ChooseSignal), RouteResult::NoRoute);
    }

    fn bridge_row(span: std::ops::RangeInclusive<i32>, limit: u32) -> TileMap {
        let mut map = road_grid(12, 1);
        for x in span {
            let t = map.lookup_mut(Coord3::new(x, 0, 0)).unwrap();
            t.bridge = true;
            t.way_mut(WayType::Road).unwrap().bridge_weight_limit = limit;
        }
        map
    }

    fn bridge_result(
        map: &TileMap,
        policy: WeightLimitPolicy,
        convoy_weight: u32,
        tile_length: i32,
    ) -> (RouteResult, crate::route::Route) {
        let settings = Settings {
            weight_limit_policy: policy,
            ..Settings::default()
        };
        let (pool, mut marker) = bits(map, &settings);
        let mut ctx = SearchContext {
            map,
            settings: &settings,
            pool: &pool,
            marker: &mut marker,
        };
        let mut r = crate::route::Route::new();
        let params = SearchParams {
            convoy_weight,
            tile_length,
            ..SearchParams::default()
        };
        let res = r.calc_route(
            &mut ctx,
            Coord3::new(0, 0, 0),
            Coord3::new(11, 0, 0),
            &Car,
            &params,
        );
        (res, r)
    }

    #[test]
    fn bridge_load_scales_with_tiles_on_the_span() {
        // a 4-tile convoy weighing 30 against a limit of 10: on a short
        // bridge at most a quarter of the convoy rests on the span (7),
        // on a 5-tile bridge half of it does (15)
        let short = bridge_row(4..=6, 10);
        let (res, _) = bridge_result(&short, WeightLimitPolicy::Strict, 30, 4);
        assert_eq!(res, RouteResult::Valid);

        let long = bridge_row(4..=8, 10);
        let (res, _) = bridge_result(&long, WeightLimitPolicy::Strict, 30, 4);
        assert_eq!(res, RouteResult::NoRoute);

        // report-only passes the long bridge and records its limit
        let (res, r) = bridge_result(&long, WeightLimitPolicy::ReportOnly, 30, 4);
        assert_eq!(res, RouteResult::Valid);
        assert_eq!(r.max_convoy_weight(), 10);
    }

    struct TramCar;

    impl crate::pather::WayPather for TramCar {
        fn way_type(&self) -> WayType {
            WayType::Tram
        }
        fn check_tile(&self, tile: &Tile) -> bool {
            tile.has_way(WayType::Tram)
        }
        fn ribi(&self, tile: &Tile) -> Ribi {
            tile.way(WayType::Tram).map(|w| w.ribi).unwrap_or(Ribi::NONE)
        }
        fn cost(&self, _tile: &Tile, _max_speed: i32, _from: Ribi) -> u32 {
            1
        }
        fn is_target(&self, _tile: &Tile, _prev: Option<&Tile>) -> bool {
            false
        }
    }

    #[test]
    fn tram_bridge_defers_to_road_limit() {
        let tram_row = |with_road: bool| {
            let mut map = TileMap::new(10, 1);
            for x in 0..10 {
                let mut t = Tile::new(Coord3::new(x, 0, 0));
                let mut w = Way::new(WayType::Tram, Ribi::EAST | Ribi::WEST);
                w.style = WayStyle::Tram;
                t.ways.push(w);
                if (4..=5).contains(&x) {
                    t.bridge = true;
                    if with_road {
                        let mut road = Way::new(WayType::Road, Ribi::EAST | Ribi::WEST);
                        road.bridge_weight_limit = 10;
                        t.ways.push(road);
                    }
                }
                map.insert(t);
            }
            map
        };
        let run = |map: &TileMap| {
            let settings = Settings {
                weight_limit_policy: WeightLimitPolicy::Strict,
                ..Settings::default()
            };
            let (pool, mut marker) = bits(map, &settings);
            let mut ctx = SearchContext {
                map,
                settings: &settings,
                pool: &pool,
                marker: &mut marker,
            };
            let mut r = crate::route::Route::new();
            r.calc_route(
                &mut ctx,
                Coord3::new(1, 0, 0),
                Coord3::new(8, 0, 0),
                &TramCar,
                &SearchParams {
                    convoy_weight: 50,
                    ..SearchParams::default()
                },
            )
        };

        // the underlying road bridge carries the limit
        assert_eq!(run(&tram_row(true)), RouteResult::NoRoute);
        // without one only the axle check applies, which passes
        assert_eq!(run(&tram_row(false)), RouteResult::Valid);
    }
}
