use crate::cells::CellGrid;
use crate::geometry::CellCoord;

use super::FovMask;

/// Octant transforms as `(xx, xy, yx, yy)`.
const OCTANTS: [(i32, i32, i32, i32); 8] = [
    (1, 0, 0, 1),
    (0, 1, 1, 0),
    (0, -1, 1, 0),
    (-1, 0, 0, 1),
    (-1, 0, 0, -1),
    (0, -1, -1, 0),
    (0, 1, -1, 0),
    (1, 0, 0, -1),
];

#[derive(Debug, Clone, Copy)]
struct Span {
    row: i32,
    start_slope: f64,
    end_slope: f64,
}

/// Recursive shadowcasting, driven by an explicit stack of pending spans.
pub(crate) fn cast<G: CellGrid + ?Sized>(
    cells: &G,
    origin: CellCoord,
    radius: i32,
    light_walls: bool,
    mask: &mut FovMask,
) {
    let radius_squared = radius as i64 * radius as i64;
    let mut pending = Vec::new();

    for transform in OCTANTS {
        pending.push(Span {
            row: 1,
            start_slope: 1.0,
            end_slope: 0.0,
        });
        while let Some(span) = pending.pop() {
            scan(
                cells,
                origin,
                radius,
                radius_squared,
                light_walls,
                transform,
                span,
                mask,
                &mut pending,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn scan<G: CellGrid + ?Sized>(
    cells: &G,
    origin: CellCoord,
    radius: i32,
    radius_squared: i64,
    light_walls: bool,
    (xx, xy, yx, yy): (i32, i32, i32, i32),
    span: Span,
    mask: &mut FovMask,
    pending: &mut Vec<Span>,
) {
    let mut start_slope = span.start_slope;
    if start_slope < span.end_slope {
        return;
    }

    let mut next_start_slope = start_slope;
    for row in span.row..=radius {
        let dy = -row;
        let mut blocked = false;
        for dx in -row..=0 {
            let left_slope = (dx as f64 - 0.5) / (dy as f64 + 0.5);
            let right_slope = (dx as f64 + 0.5) / (dy as f64 - 0.5);
            if start_slope < right_slope {
                continue;
            }
            if span.end_slope > left_slope {
                break;
            }

            let x = origin.x + dx * xx + dy * xy;
            let y = origin.y + dx * yx + dy * yy;
            let opaque = !cells.is_transparent(x, y);
            let in_range = (dx as i64 * dx as i64 + dy as i64 * dy as i64) <= radius_squared;
            if in_range && (!opaque || light_walls) {
                mask.mark(x, y);
            }

            if blocked {
                if opaque {
                    next_start_slope = right_slope;
                } else {
                    blocked = false;
                    start_slope = next_start_slope;
                }
            } else if opaque && row < radius {
                blocked = true;
                pending.push(Span {
                    row: row + 1,
                    start_slope,
                    end_slope: left_slope,
                });
                next_start_slope = right_slope;
            }
        }
        if blocked {
            break;
        }
    }
}
