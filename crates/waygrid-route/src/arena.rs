//! Reusable node storage for searches.
//!
//! A search allocates nothing: it checks a pre-sized node buffer out of the
//! [`NodePool`], fills it, and hands it back when the guard drops. The pool
//! holds a small fixed number of buffers, which is therefore the hard upper
//! bound on concurrent searches; running out is a configuration bug, not
//! backpressure, and aborts the process.

use std::sync::{Mutex, MutexGuard, TryLockError};

use waygrid_core::{Coord, Coord3, Ribi};

/// Parent sentinel for the start node.
pub const NO_PARENT: u32 = u32::MAX;

/// Number of buffers in a pool; matches the expected worker thread count.
const POOL_SLOTS: usize = 4;

/// One A* open/closed-set entry. Nodes live in a [`NodeBuffer`] and refer
/// to their parent by index; they are never mutated after being pushed, so
/// the parent links always form a forest.
#[derive(Copy, Clone, Debug)]
pub struct SearchNode {
    pub parent: u32,
    pub pos: Coord3,
    /// Accumulated true cost from the start.
    pub g: u32,
    /// Heap key: `g` plus heuristic (scaled), or `g` alone in simplified
    /// modes.
    pub f: u32,
    /// Combined direction description of how this node was reached, used
    /// to grade turns.
    pub dir: Ribi,
    /// The single direction of the step that reached this node.
    pub ribi_from: Ribi,
    /// Hops from the start node; sizes the final path buffer.
    pub count: u32,
    /// Directions the water jump-point pruning still allows from here.
    pub jps_ribi: Ribi,
}

/// Fixed pool of node buffers shared by all searches.
pub struct NodePool {
    slots: Vec<Mutex<Vec<SearchNode>>>,
    max_step: u32,
}

impl NodePool {
    /// Size the pool from the configured step budget, capped by what the
    /// world could ever need (twice its tile count).
    pub fn new(max_route_steps: u32, world_size: Option<Coord>) -> Self {
        Self::with_slots(max_route_steps, world_size, POOL_SLOTS)
    }

    /// As [`NodePool::new`] with an explicit slot count, for worlds whose
    /// worker thread count differs from the default.
    pub fn with_slots(max_route_steps: u32, world_size: Option<Coord>, slots: usize) -> Self {
        assert!(slots > 0, "NodePool: need at least one buffer");
        let world_cap = match world_size {
            Some(s) => (s.x as u32).saturating_mul(s.y as u32).saturating_mul(2),
            None => max_route_steps,
        };
        let max_step = max_route_steps.min(world_cap).max(1);
        let slots = (0..slots)
            .map(|_| Mutex::new(Vec::with_capacity(max_step as usize + 6)))
            .collect();
        Self { slots, max_step }
    }

    /// The per-search node budget.
    #[inline]
    pub fn max_step(&self) -> u32 {
        self.max_step
    }

    /// Check out an empty buffer. The buffer returns to the pool when the
    /// guard drops, covering every search exit path.
    ///
    /// # Panics
    ///
    /// When all buffers are in use: more concurrent searches than the pool
    /// was configured for is an orchestration bug that cannot be handled
    /// at the call site.
    pub fn acquire(&self) -> NodeBuffer<'_> {
        for slot in &self.slots {
            let guard = match slot.try_lock() {
                Ok(g) => g,
                // A poisoned slot only means a previous search panicked;
                // the buffer content is cleared on checkout anyway.
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => continue,
            };
            let mut buf = NodeBuffer { nodes: guard };
            buf.nodes.clear();
            return buf;
        }
        panic!(
            "NodePool::acquire: all {} node buffers in use; too many concurrent searches",
            self.slots.len()
        );
    }
}

/// Scoped checkout of one node buffer.
pub struct NodeBuffer<'a> {
    nodes: MutexGuard<'a, Vec<SearchNode>>,
}

impl NodeBuffer<'_> {
    /// Append a node, returning its index.
    #[inline]
    pub fn push(&mut self, node: SearchNode) -> u32 {
        let idx = self.nodes.len() as u32;
        self.nodes.push(node);
        idx
    }

    /// Number of nodes created so far (the step count).
    #[inline]
    pub fn len(&self) -> u32 {
        self.nodes.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::ops::Index<u32> for NodeBuffer<'_> {
    type Output = SearchNode;
    #[inline]
    fn index(&self, idx: u32) -> &SearchNode {
        &self.nodes[idx as usize]
    }
}

impl std::ops::IndexMut<u32> for NodeBuffer<'_> {
    #[inline]
    fn index_mut(&mut self, idx: u32) -> &mut SearchNode {
        &mut self.nodes[idx as usize]
    }
}
