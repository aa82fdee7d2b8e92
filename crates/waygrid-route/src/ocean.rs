//! Long-haul open-water routing.
//!
//! The regular search cannot afford map-spanning voyages, so ocean routes
//! are assembled instead: a straight staircase line across open water, with
//! the regular search brought in only to detour around the occasional strip
//! of land the line crosses. The line is tried start-to-goal and, because
//! the staircase is asymmetric, goal-to-start as well.

use log::{debug, error};

use waygrid_core::{Coord, Coord3, TileMap};

use crate::pather::WayPather;
use crate::route::{Route, RouteResult};
use crate::search::{SearchContext, SearchMode, SearchParams};

/// Longest run of land tiles a straight ocean line will try to detour
/// around. Roughly as far as the regular search can route around, and maybe
/// slightly further.
pub const OCEAN_LAND_GAP_TOLERANCE: i32 = 1024;

/// One step of the staircase line: move along the axis with the larger
/// remaining distance, x on ties.
fn staircase_step(pos: Coord, dest: Coord) -> Coord {
    let mut pos = pos;
    if (pos.x - dest.x).abs() >= (pos.y - dest.y).abs() {
        pos.x += if pos.x > dest.x { -1 } else { 1 };
    } else {
        pos.y += if pos.y > dest.y { -1 } else { 1 };
    }
    pos
}

impl Route {
    /// Append a straight line of surface tiles from the route's last tile
    /// to `dest`, ignoring what is on them. Returns whether the line
    /// reached `dest` without leaving the map.
    pub fn append_straight_route(&mut self, map: &TileMap, dest: Coord3) -> bool {
        let dest = dest.to_2d();
        if !map.is_within_limits(dest) {
            return false;
        }
        let mut pos = self.back().to_2d();
        while pos != dest {
            pos = staircase_step(pos, dest);
            if !map.is_within_limits(pos) {
                break;
            }
            if let Some(t) = map.lookup_surface(pos) {
                self.push(t.pos);
            } else {
                break;
            }
        }
        pos == dest
    }

    /// Append the straight line to `dest`, appending only water tiles.
    ///
    /// On hitting land the line keeps scanning across it; if open water
    /// returns within `num` tiles the first water tile after the gap comes
    /// back as `Some(gap)` alongside a partial route ending just before
    /// the land. More land than that is [`RouteResult::TooComplex`]; a
    /// start or end off the water is [`RouteResult::NoRoute`].
    ///
    /// With `is_tall`, height-restricted water (under low bridges) counts
    /// as land.
    fn append_straight_route_mostly_ocean(
        &mut self,
        map: &TileMap,
        dest: Coord3,
        num: i32,
        is_tall: bool,
    ) -> (RouteResult, Option<Coord3>) {
        let dest = dest.to_2d();
        if !map.is_within_limits(dest) {
            return (RouteResult::NoRoute, None);
        }

        let mut pos = self.back().to_2d();
        if !map.lookup_surface(pos).is_some_and(|t| t.water) {
            return (RouteResult::NoRoute, None);
        }
        if !map.lookup_surface(dest).is_some_and(|t| t.water) {
            return (RouteResult::NoRoute, None);
        }

        let mut land_count: i32 = 0;
        let mut land_started = false;

        while pos != dest {
            pos = staircase_step(pos, dest);
            if !map.is_within_limits(pos) {
                return (RouteResult::NoRoute, None);
            }
            let Some(t) = map.lookup_surface(pos) else {
                return (RouteResult::NoRoute, None);
            };

            // for tall ships a low bridge is as bad as land
            let water = t.water && !(is_tall && t.height_restricted);

            if !water && land_count >= num {
                return (RouteResult::TooComplex, None);
            } else if !water {
                land_started = true;
                land_count += 1;
            } else if land_started {
                // past the gap; hand back a partial route and where the
                // water resumes
                return (RouteResult::Valid, Some(t.pos));
            } else {
                self.push(t.pos);
            }
        }
        (RouteResult::Valid, None)
    }

    /// Assemble an ocean route from the route's last tile to `dest`:
    /// straight lines over water, regular searched detours around land
    /// gaps of up to [`OCEAN_LAND_GAP_TOLERANCE`] tiles.
    fn assemble_ocean_route<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        dest: Coord3,
        pather: &P,
        max_speed: i32,
        is_tall: bool,
    ) -> RouteResult {
        let map = ctx.map;
        let dest_2d = dest.to_2d();
        if !map.is_within_limits(dest_2d) {
            return RouteResult::NoRoute;
        }
        if !map.lookup_surface(self.back().to_2d()).is_some_and(|t| t.water) {
            return RouteResult::NoRoute;
        }
        if !map.lookup_surface(dest_2d).is_some_and(|t| t.water) {
            return RouteResult::NoRoute;
        }

        while self.back().to_2d() != dest_2d {
            let (main_result, gap_end) =
                self.append_straight_route_mostly_ocean(map, dest, OCEAN_LAND_GAP_TOLERANCE, is_tall);

            match (main_result, gap_end) {
                (RouteResult::Valid, Some(gap)) => {
                    debug!("assemble_ocean_route: land at {}, detouring to {gap}", self.back());
                    // detour around the land with the regular search; a
                    // zero top speed would divide costs by zero, so fall
                    // back to flat costs then
                    let params = SearchParams {
                        max_speed,
                        is_tall,
                        mode: if max_speed == 0 {
                            SearchMode::SimpleCost
                        } else {
                            SearchMode::Normal
                        },
                        ..SearchParams::default()
                    };
                    let mut detour = Route::new();
                    let detour_result =
                        detour.intern_calc_route(ctx, self.back(), gap, pather, &params);
                    if detour_result != RouteResult::Valid
                        && detour_result != RouteResult::ValidHaltTooShort
                    {
                        // no way around the land
                        return detour_result;
                    }
                    self.append(&detour);
                }
                (RouteResult::Valid, None) => {
                    if self.back().to_2d() == dest_2d {
                        return RouteResult::Valid;
                    }
                    error!("assemble_ocean_route: line ended short of target with no gap");
                    return RouteResult::NoRoute;
                }
                (other, _) => {
                    // not at the destination and no gap found; usually too
                    // much land on the line
                    return other;
                }
            }
        }
        // the final detour delivered us to the destination
        RouteResult::Valid
    }

    /// Ocean route from `start` to `end`, trying the straight line both
    /// ways: the staircase runs its long axis first, so the reversed line
    /// often crosses entirely different water.
    pub fn calc_ocean_route<P: WayPather>(
        &mut self,
        ctx: &mut SearchContext<'_>,
        start: Coord3,
        end: Coord3,
        pather: &P,
        max_speed: i32,
        is_tall: bool,
    ) -> RouteResult {
        self.clear();
        self.push(start);
        let forward_result = self.assemble_ocean_route(ctx, end, pather, max_speed, is_tall);
        if forward_result == RouteResult::Valid {
            return RouteResult::Valid;
        }

        let mut reversed = Route::new();
        reversed.push(end);
        let reverse_result = reversed.assemble_ocean_route(ctx, start, pather, max_speed, is_tall);
        if reverse_result == RouteResult::Valid {
            self.assign_from_reversed_route(&reversed);
            return RouteResult::Valid;
        }

        self.clear();
        if forward_result == RouteResult::TooComplex || reverse_result == RouteResult::TooComplex {
            RouteResult::TooComplex
        } else {
            RouteResult::NoRoute
        }
    }
}
