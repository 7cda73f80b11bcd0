use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::geometry::{CellCoord, CellRect, PixelRect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// View onto the grid. `center` is in grid pixels (cell size times cell units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    center: Vec2,
    zoom: f32,
    viewport: Viewport,
}

impl Camera {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            center: Vec2::default(),
            zoom: 1.0,
            viewport,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_center(&mut self, center: Vec2) -> bool {
        let changed = self.center != center;
        self.center = center;
        changed
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<bool, GridError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(GridError::InvalidZoom(zoom));
        }
        let changed = self.zoom != zoom;
        self.zoom = zoom;
        Ok(changed)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> bool {
        let changed = self.viewport != viewport;
        self.viewport = viewport;
        changed
    }

    /// Screen-space x of a grid-pixel x coordinate, before rounding.
    fn screen_x(&self, grid_x: f64) -> f64 {
        (grid_x - self.center.x as f64) * self.zoom as f64 + self.viewport.width as f64 * 0.5
    }

    fn screen_y(&self, grid_y: f64) -> f64 {
        (grid_y - self.center.y as f64) * self.zoom as f64 + self.viewport.height as f64 * 0.5
    }

    fn grid_x(&self, screen_x: f64) -> f64 {
        (screen_x - self.viewport.width as f64 * 0.5) / self.zoom as f64 + self.center.x as f64
    }

    fn grid_y(&self, screen_y: f64) -> f64 {
        (screen_y - self.viewport.height as f64 * 0.5) / self.zoom as f64 + self.center.y as f64
    }

    /// Grid-pixel position under a screen pixel's top-left corner.
    pub fn screen_to_grid(&self, screen_x: i32, screen_y: i32) -> Vec2 {
        Vec2::new(
            self.grid_x(screen_x as f64) as f32,
            self.grid_y(screen_y as f64) as f32,
        )
    }

    /// Cell under a screen pixel. Floors toward negative infinity, so pixels
    /// left of or above the grid origin land on cell -1, not 0. The result
    /// always agrees with [`Camera::cell_to_screen`].
    pub fn screen_to_cell(&self, screen_x: i32, screen_y: i32, cell_pixel_size: u32) -> CellCoord {
        let size = cell_pixel_size.max(1) as f64;
        let guess_x = (self.grid_x(screen_x as f64) / size).floor() as i64;
        let guess_y = (self.grid_y(screen_y as f64) / size).floor() as i64;
        let x = settle_cell(guess_x, screen_x, |edge| {
            self.screen_x(edge as f64 * size).ceil() as i64
        });
        let y = settle_cell(guess_y, screen_y, |edge| {
            self.screen_y(edge as f64 * size).ceil() as i64
        });
        CellCoord::new(saturate_i32(x), saturate_i32(y))
    }

    /// Half-open screen rect of exactly the pixels that map back to `cell`.
    pub fn cell_to_screen(&self, cell: CellCoord, cell_pixel_size: u32) -> PixelRect {
        let size = cell_pixel_size.max(1) as f64;
        let left = cell.x as f64 * size;
        let top = cell.y as f64 * size;
        self.grid_span_to_screen(left, top, left + size, top + size)
    }

    /// Maps a half-open grid-pixel span to `[ceil(L), ceil(R))` on screen.
    pub fn grid_span_to_screen(&self, left: f64, top: f64, right: f64, bottom: f64) -> PixelRect {
        PixelRect::new(
            saturate_i32(self.screen_x(left).ceil() as i64),
            saturate_i32(self.screen_y(top).ceil() as i64),
            saturate_i32(self.screen_x(right).ceil() as i64),
            saturate_i32(self.screen_y(bottom).ceil() as i64),
        )
    }

    pub fn grid_rect_to_screen(&self, rect: PixelRect) -> PixelRect {
        self.grid_span_to_screen(
            rect.left as f64,
            rect.top as f64,
            rect.right as f64,
            rect.bottom as f64,
        )
    }

    /// Grid-pixel rectangle covered by the viewport, rounded outward.
    pub fn visible_grid_rect(&self) -> PixelRect {
        PixelRect::new(
            saturate_i32(self.grid_x(0.0).floor() as i64),
            saturate_i32(self.grid_y(0.0).floor() as i64),
            saturate_i32(self.grid_x(self.viewport.width as f64).ceil() as i64),
            saturate_i32(self.grid_y(self.viewport.height as f64).ceil() as i64),
        )
    }

    /// Cells touched by at least one viewport pixel, clamped to the grid.
    pub fn visible_cells(&self, cell_pixel_size: u32, width: u32, height: u32) -> Option<CellRect> {
        if self.viewport.is_empty() || width == 0 || height == 0 {
            return None;
        }
        let first = self.screen_to_cell(0, 0, cell_pixel_size);
        let last = self.screen_to_cell(
            saturate_i32(self.viewport.width as i64 - 1),
            saturate_i32(self.viewport.height as i64 - 1),
            cell_pixel_size,
        );
        if last.x < 0 || last.y < 0 || first.x >= width as i32 || first.y >= height as i32 {
            return None;
        }
        Some(CellRect {
            x_min: first.x.max(0) as u32,
            x_max: (last.x as u32).min(width - 1),
            y_min: first.y.max(0) as u32,
            y_max: (last.y as u32).min(height - 1),
        })
    }
}

/// Nudges a floored guess so that `screen` lies in `[edge(cell), edge(cell + 1))`.
fn settle_cell(mut cell: i64, screen: i32, edge: impl Fn(i64) -> i64) -> i64 {
    let screen = screen as i64;
    for _ in 0..4 {
        if screen < edge(cell) {
            cell -= 1;
        } else if screen >= edge(cell + 1) {
            cell += 1;
        } else {
            break;
        }
    }
    cell
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
