//! Straightening pass for water routes.
//!
//! Jump-point pruning chains straight runs and diagonal staircases, which
//! can leave a route looking like
//!
//! ```text
//! >--+
//!    +--+
//!       +-->
//! ```
//!
//! This pass removes the extra kinks where open water permits, yielding
//!
//! ```text
//! >----+
//!      ++
//!       +-->
//! ```

use waygrid_core::{Ribi, TileMap};

use crate::route::Route;

impl Route {
    /// Eliminate avoidable turns in a just-computed water route. Scans for
    /// straight / diagonal / straight-in-the-same-direction / diagonal
    /// sequences and replaces the middle with one longer straight run plus
    /// one staircase, as far as every substituted tile is water.
    pub(crate) fn postprocess_water_route(&mut self, map: &TileMap) {
        if self.len() < 5 {
            return;
        }

        // direction and last index of the most recent straight part
        let mut straight_ribi = Ribi::toward3(self.at(0), self.at(1));
        let mut straight_end: usize = 0;

        // phase 0: first straight part, 1: diagonal, 2: straight again in
        // the same direction; the next diagonal triggers the rewrite
        let mut phase: u8 = 0;
        let mut i: usize = 1;
        while i < self.len() - 1 {
            // span two steps so a staircase reads as a diagonal mask
            let ribi = Ribi::toward3(self.at(i - 1), self.at(i + 1));
            if ribi.is_single() {
                if ribi == straight_ribi {
                    if phase == 1 {
                        phase = 2;
                    } else if phase == 0 {
                        straight_end = i;
                    }
                } else {
                    // straight in a new direction, start over
                    phase = 0;
                    straight_end = i;
                    straight_ribi = ribi;
                }
            } else if phase < 1 {
                phase = 1;
            } else if phase == 2 {
                // candidate sequence complete; build a replacement that
                // runs straight first and saves one of the diagonals
                let mut ok = Ribi::toward3(self.at(straight_end), self.at(i + 1)) == ribi;
                let mut repl = vec![self.at(straight_end)];
                let end = self.at(i);
                let mut j = straight_end;
                while j < i && ok {
                    let back = *repl.last().unwrap_or(&end);
                    let diff = end - back;
                    let next = if diff.x.abs() >= diff.y.abs() {
                        let mut n = if diff.x > 0 { Ribi::EAST } else { Ribi::WEST };
                        if diff.x.abs() == diff.y.abs() && n == straight_ribi {
                            n = if diff.y > 0 { Ribi::SOUTH } else { Ribi::NORTH };
                        }
                        n
                    } else if diff.y > 0 {
                        Ribi::SOUTH
                    } else {
                        Ribi::NORTH
                    };
                    let d = next.to_delta();
                    let pos = waygrid_core::Coord3::new(back.x + d.x, back.y + d.y, back.z);
                    ok = false;
                    if let Some(t) = map.lookup(pos)
                        && t.water
                    {
                        ok = true;
                        repl.push(pos);
                    }
                    j += 1;
                }
                if ok {
                    for j in straight_end..i {
                        self.tiles[j] = repl[j - straight_end];
                    }
                    // rescan from the start of the rewritten part
                    i = straight_end;
                } else {
                    // treat the second straight part as the new first
                    straight_end = i - 1;
                }
                phase = 0;
            }
            i += 1;
        }
    }
}
