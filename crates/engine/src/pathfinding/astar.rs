use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cells::CellGrid;
use crate::geometry::CellCoord;

use super::{walkable_steps, UNREACHABLE};

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: CellCoord,
    g_cost: f32,
    h_cost: f32,
    f_cost: f32,
    insertion_order: u64,
}

impl OpenNode {
    fn search_order(&self, other: &Self) -> Ordering {
        self.f_cost
            .total_cmp(&other.f_cost)
            .then_with(|| self.h_cost.total_cmp(&other.h_cost))
            .then_with(|| self.coord.y.cmp(&other.coord.y))
            .then_with(|| self.coord.x.cmp(&other.coord.x))
            .then_with(|| self.insertion_order.cmp(&other.insertion_order))
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so the max-heap pops the lowest (f, h, y, x, insertion) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.search_order(self)
    }
}

/// A* from `start` to `goal` under the same movement rules as [`super::CostField`].
/// Returns cells with `start` excluded and `goal` included, or an empty path.
pub fn find_path<G: CellGrid + ?Sized>(
    cells: &G,
    start: CellCoord,
    goal: CellCoord,
    diagonal_cost: f32,
) -> Vec<CellCoord> {
    if start == goal
        || !cells.is_walkable(start.x, start.y)
        || !cells.is_walkable(goal.x, goal.y)
    {
        return Vec::new();
    }

    let width = cells.width();
    let node_count = width as usize * cells.height() as usize;
    let index_of = |coord: CellCoord| coord.y as usize * width as usize + coord.x as usize;
    let mut closed = vec![false; node_count];
    let mut best_g = vec![UNREACHABLE; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = BinaryHeap::new();
    let mut next_insertion = 0u64;

    let start_h = distance_lower_bound(start, goal, diagonal_cost);
    open.push(OpenNode {
        coord: start,
        g_cost: 0.0,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion = next_insertion.saturating_add(1);
    best_g[index_of(start)] = 0.0;

    while let Some(current) = open.pop() {
        let current_index = index_of(current.coord);
        // Superseded by a cheaper push of the same cell.
        if closed[current_index] || current.g_cost > best_g[current_index] {
            continue;
        }
        closed[current_index] = true;

        if current.coord == goal {
            return reconstruct_path(&parent, width, index_of(start), current_index);
        }

        for (neighbor, step_cost) in walkable_steps(cells, current.coord.x, current.coord.y, diagonal_cost)
            .into_iter()
            .flatten()
        {
            let neighbor_index = index_of(neighbor);
            if closed[neighbor_index] {
                continue;
            }
            let tentative_g = current.g_cost + step_cost;
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }

            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current_index);
            let h_cost = distance_lower_bound(neighbor, goal, diagonal_cost);
            open.push(OpenNode {
                coord: neighbor,
                g_cost: tentative_g,
                h_cost,
                f_cost: tentative_g + h_cost,
                insertion_order: next_insertion,
            });
            next_insertion = next_insertion.saturating_add(1);
        }
    }

    Vec::new()
}

fn reconstruct_path(
    parent: &[Option<usize>],
    width: u32,
    start_index: usize,
    goal_index: usize,
) -> Vec<CellCoord> {
    let width = width.max(1) as usize;
    let mut cursor = goal_index;
    let mut path = Vec::new();
    while cursor != start_index {
        path.push(CellCoord::new((cursor % width) as i32, (cursor / width) as i32));
        let Some(next) = parent.get(cursor).copied().flatten() else {
            return Vec::new();
        };
        cursor = next;
    }
    path.reverse();
    path
}

/// Cheapest possible cost between two cells on an open map, so never more
/// than the real route cost.
///
/// Below 1.0 a diagonal pair beats an orthogonal step, and the long axis
/// times the diagonal cost is the bound. From 1.0 up it is octile distance,
/// which turns into Manhattan once a diagonal costs two orthogonal steps.
fn distance_lower_bound(a: CellCoord, b: CellCoord, diagonal_cost: f32) -> f32 {
    let dx = a.x.abs_diff(b.x) as f32;
    let dy = a.y.abs_diff(b.y) as f32;
    if diagonal_cost <= 0.0 {
        return dx + dy;
    }
    let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
    if diagonal_cost < 1.0 {
        return long * diagonal_cost;
    }
    (long - short) + diagonal_cost.min(2.0) * short
}
