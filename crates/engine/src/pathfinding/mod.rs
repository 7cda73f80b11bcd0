mod astar;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::cells::CellGrid;
use crate::config::DEFAULT_MAX_COST_FIELDS;
use crate::geometry::CellCoord;

pub use astar::find_path;

/// Cost of cells no route reaches.
pub const UNREACHABLE: f32 = f32::INFINITY;
const ORTHOGONAL_COST: f32 = 1.0;

/// N, E, S, W, then NE, SE, SW, NW.
const STEPS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Moves out of `(x, y)` with their cost. Diagonals need `diagonal_cost > 0`
/// and both orthogonal cells they pass walkable.
pub(crate) fn walkable_steps<G: CellGrid + ?Sized>(
    cells: &G,
    x: i32,
    y: i32,
    diagonal_cost: f32,
) -> [Option<(CellCoord, f32)>; 8] {
    let mut steps = [None; 8];
    for (slot, (dx, dy)) in STEPS.iter().copied().enumerate() {
        let to_x = x + dx;
        let to_y = y + dy;
        if !cells.is_walkable(to_x, to_y) {
            continue;
        }
        let cost = if dx != 0 && dy != 0 {
            if diagonal_cost <= 0.0
                || !cells.is_walkable(x + dx, y)
                || !cells.is_walkable(x, y + dy)
            {
                continue;
            }
            diagonal_cost
        } else {
            ORTHOGONAL_COST
        };
        steps[slot] = Some((CellCoord::new(to_x, to_y), cost));
    }
    steps
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f32,
    index: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed so the max-heap pops the cheapest, lowest-index cell first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Shortest-path costs from one root to every cell, with back-links toward
/// the root. Tagged with the walkability generation it was built at.
#[derive(Debug, Clone, PartialEq)]
pub struct CostField {
    root: CellCoord,
    width: u32,
    height: u32,
    generation: u64,
    costs: Vec<f32>,
    toward_root: Vec<Option<u32>>,
}

impl CostField {
    pub fn build<G: CellGrid + ?Sized>(
        cells: &G,
        root: CellCoord,
        diagonal_cost: f32,
        generation: u64,
    ) -> Self {
        let width = cells.width();
        let height = cells.height();
        let node_count = width as usize * height as usize;
        let mut field = Self {
            root,
            width,
            height,
            generation,
            costs: vec![UNREACHABLE; node_count],
            toward_root: vec![None; node_count],
        };
        let Some(root_index) = field.index_of(root.x, root.y) else {
            return field;
        };
        field.costs[root_index] = 0.0;
        if !cells.is_walkable(root.x, root.y) {
            return field;
        }

        let mut frontier = BinaryHeap::new();
        frontier.push(Frontier {
            cost: 0.0,
            index: root_index,
        });
        while let Some(Frontier { cost, index }) = frontier.pop() {
            if cost > field.costs[index] {
                continue;
            }
            let (x, y) = field.coord_of(index);
            for (next, step_cost) in walkable_steps(cells, x, y, diagonal_cost)
                .into_iter()
                .flatten()
            {
                let Some(next_index) = field.index_of(next.x, next.y) else {
                    continue;
                };
                let next_cost = cost + step_cost;
                if next_cost < field.costs[next_index] {
                    field.costs[next_index] = next_cost;
                    field.toward_root[next_index] = Some(index as u32);
                    frontier.push(Frontier {
                        cost: next_cost,
                        index: next_index,
                    });
                }
            }
        }
        field
    }

    pub fn root(&self) -> CellCoord {
        self.root
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Raw cost, [`UNREACHABLE`] for unreachable or out-of-range cells.
    pub fn cost_at(&self, x: i32, y: i32) -> f32 {
        self.index_of(x, y)
            .map(|index| self.costs[index])
            .unwrap_or(UNREACHABLE)
    }

    pub fn distance(&self, x: i32, y: i32) -> Option<f32> {
        let cost = self.cost_at(x, y);
        cost.is_finite().then_some(cost)
    }

    pub fn is_reachable(&self, x: i32, y: i32) -> bool {
        self.distance(x, y).is_some()
    }

    /// Next cell from `(x, y)` toward the root.
    pub fn step_from(&self, x: i32, y: i32) -> Option<CellCoord> {
        let index = self.index_of(x, y)?;
        let previous = self.toward_root[index]?;
        let (px, py) = self.coord_of(previous as usize);
        Some(CellCoord::new(px, py))
    }

    /// Cells from the root to `target`, root excluded and target included.
    /// Empty when the target is the root or cannot be reached.
    pub fn path_to(&self, target_x: i32, target_y: i32) -> Vec<CellCoord> {
        if !self.is_reachable(target_x, target_y) {
            return Vec::new();
        }
        let mut path = Vec::new();
        let mut cursor = CellCoord::new(target_x, target_y);
        while cursor != self.root {
            path.push(cursor);
            let Some(next) = self.step_from(cursor.x, cursor.y) else {
                return Vec::new();
            };
            cursor = next;
        }
        path.reverse();
        path
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn coord_of(&self, index: usize) -> (i32, i32) {
        let width = self.width.max(1) as usize;
        ((index % width) as i32, (index / width) as i32)
    }
}

#[derive(Debug)]
struct CachedField {
    field: Arc<CostField>,
    last_used: u64,
}

/// Cost fields memoized by root, at most `capacity` of them. Entries from an
/// older walkability generation are never returned; moving to a new
/// generation drops the whole cache.
#[derive(Debug)]
pub struct CostFieldCache {
    entries: FxHashMap<CellCoord, CachedField>,
    capacity: usize,
    generation: u64,
    builds: u64,
    clock: u64,
}

impl Default for CostFieldCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_COST_FIELDS)
    }
}

impl CostFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
            generation: 0,
            builds: 0,
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops every field built before `generation`.
    pub fn invalidate(&mut self, generation: u64) {
        if generation == self.generation {
            return;
        }
        if !self.entries.is_empty() {
            debug!(
                stale_generation = self.generation,
                generation,
                evicted = self.entries.len(),
                "cost_cache_invalidated"
            );
        }
        self.entries.clear();
        self.generation = generation;
    }

    pub fn get_or_build<G: CellGrid + ?Sized>(
        &mut self,
        cells: &G,
        root: CellCoord,
        diagonal_cost: f32,
        generation: u64,
    ) -> Option<Arc<CostField>> {
        if !cells.contains(root.x, root.y) {
            return None;
        }
        self.invalidate(generation);
        self.clock = self.clock.wrapping_add(1);

        if let Some(cached) = self.entries.get_mut(&root) {
            cached.last_used = self.clock;
            return Some(Arc::clone(&cached.field));
        }

        if self.entries.len() >= self.capacity {
            self.evict_least_recently_used();
        }
        let field = Arc::new(CostField::build(cells, root, diagonal_cost, generation));
        self.builds = self.builds.saturating_add(1);
        trace!(
            root_x = root.x,
            root_y = root.y,
            generation,
            cached = self.entries.len() + 1,
            "cost_field_built"
        );
        self.entries.insert(
            root,
            CachedField {
                field: Arc::clone(&field),
                last_used: self.clock,
            },
        );
        Some(field)
    }

    fn evict_least_recently_used(&mut self) {
        let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, cached)| cached.last_used)
            .map(|(root, _)| *root)
        else {
            return;
        };
        self.entries.remove(&oldest);
        debug!(
            root_x = oldest.x,
            root_y = oldest.y,
            capacity = self.capacity,
            "cost_field_evicted"
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, root: CellCoord) -> bool {
        self.entries.contains_key(&root)
    }

    /// Fields built since creation, for observing cache hits.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}
