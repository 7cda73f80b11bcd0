use crate::cells::CellGrid;
use crate::geometry::CellCoord;

use super::FovMask;

/// Casts a Bresenham ray to every cell on the perimeter of the radius box.
pub(crate) fn cast<G: CellGrid + ?Sized>(
    cells: &G,
    origin: CellCoord,
    radius: i32,
    light_walls: bool,
    mask: &mut FovMask,
) {
    let radius_squared = radius as i64 * radius as i64;
    for offset in -radius..=radius {
        for (dx, dy) in [
            (offset, -radius),
            (offset, radius),
            (-radius, offset),
            (radius, offset),
        ] {
            trace_ray(cells, origin, dx, dy, radius_squared, light_walls, mask);
        }
    }
}

fn trace_ray<G: CellGrid + ?Sized>(
    cells: &G,
    origin: CellCoord,
    target_dx: i32,
    target_dy: i32,
    radius_squared: i64,
    light_walls: bool,
    mask: &mut FovMask,
) {
    let step_x = target_dx.signum();
    let step_y = target_dy.signum();
    let delta_x = target_dx.abs();
    let delta_y = -target_dy.abs();
    let mut error = delta_x + delta_y;
    let (mut dx, mut dy) = (0, 0);

    while (dx, dy) != (target_dx, target_dy) {
        let doubled = 2 * error;
        if doubled >= delta_y {
            error += delta_y;
            dx += step_x;
        }
        if doubled <= delta_x {
            error += delta_x;
            dy += step_y;
        }

        if dx as i64 * dx as i64 + dy as i64 * dy as i64 > radius_squared {
            return;
        }
        let x = origin.x + dx;
        let y = origin.y + dy;
        if !cells.contains(x, y) {
            return;
        }
        if !cells.is_transparent(x, y) {
            if light_walls {
                mask.mark(x, y);
            }
            return;
        }
        mask.mark(x, y);
    }
}
