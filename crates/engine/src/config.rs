use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rgba;
use crate::spatial::DEFAULT_BUCKET_SIZE;

pub const DEFAULT_CELL_PIXEL_SIZE: u32 = 16;
pub const DEFAULT_CHUNK_SIZE: u32 = 64;
pub const DEFAULT_FLAT_STORAGE_MAX_CELLS: u64 = 64 * 64;
pub const DEFAULT_DIAGONAL_COST: f32 = 1.41;
pub const DEFAULT_MAX_COST_FIELDS: usize = 64;
const MAX_CELL_PIXEL_SIZE: u32 = 256;
const MAX_CHUNK_SIZE: u32 = 1024;
/// Pixel budget for one chunk raster, 4096x4096 RGBA.
const MAX_CHUNK_RASTER_PIXELS: u64 = 4096 * 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse grid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid grid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub cell_pixel_size: u32,
    pub chunk_size: u32,
    /// Grids with at most this many cells are stored as a single chunk.
    pub flat_storage_max_cells: u64,
    pub spatial_bucket_size: f32,
    /// Step cost for diagonal moves; `0` disables diagonal movement.
    pub diagonal_cost: f32,
    /// Cost fields kept before the least recently used one is dropped.
    pub max_cost_fields: usize,
    pub background: Rgba,
    pub fog_unknown: Rgba,
    pub fog_remembered: Rgba,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_pixel_size: DEFAULT_CELL_PIXEL_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            flat_storage_max_cells: DEFAULT_FLAT_STORAGE_MAX_CELLS,
            spatial_bucket_size: DEFAULT_BUCKET_SIZE,
            diagonal_cost: DEFAULT_DIAGONAL_COST,
            max_cost_fields: DEFAULT_MAX_COST_FIELDS,
            background: [12, 12, 16, 255],
            fog_unknown: [0, 0, 0, 255],
            fog_remembered: [0, 0, 0, 150],
        }
    }
}

impl GridConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: GridConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_pixel_size == 0 || self.cell_pixel_size > MAX_CELL_PIXEL_SIZE {
            return Err(invalid(
                "cell_pixel_size",
                format!("must be within 1..={MAX_CELL_PIXEL_SIZE}, got {}", self.cell_pixel_size),
            ));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(invalid(
                "chunk_size",
                format!("must be within 1..={MAX_CHUNK_SIZE}, got {}", self.chunk_size),
            ));
        }
        let cell_pixels = u64::from(self.cell_pixel_size).pow(2);
        let chunk_pixels = u64::from(self.chunk_size).pow(2) * cell_pixels;
        if chunk_pixels > MAX_CHUNK_RASTER_PIXELS {
            return Err(invalid(
                "chunk_size",
                format!(
                    "{0}x{0} cells at {1}px exceed the {MAX_CHUNK_RASTER_PIXELS} pixel chunk raster budget",
                    self.chunk_size, self.cell_pixel_size
                ),
            ));
        }
        // A flat grid rasterizes every cell into its single chunk.
        if self.flat_storage_max_cells.saturating_mul(cell_pixels) > MAX_CHUNK_RASTER_PIXELS {
            return Err(invalid(
                "flat_storage_max_cells",
                format!(
                    "{} cells at {}px exceed the {MAX_CHUNK_RASTER_PIXELS} pixel chunk raster budget",
                    self.flat_storage_max_cells, self.cell_pixel_size
                ),
            ));
        }
        if !self.spatial_bucket_size.is_finite() || self.spatial_bucket_size <= 0.0 {
            return Err(invalid(
                "spatial_bucket_size",
                format!("must be finite and positive, got {}", self.spatial_bucket_size),
            ));
        }
        if !self.diagonal_cost.is_finite() || self.diagonal_cost < 0.0 {
            return Err(invalid(
                "diagonal_cost",
                format!("must be finite and non-negative, got {}", self.diagonal_cost),
            ));
        }
        if self.max_cost_fields == 0 {
            return Err(invalid("max_cost_fields", "must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn allows_diagonal_moves(&self) -> bool {
        self.diagonal_cost > 0.0
    }

    /// Chunk edge length used for a grid of the given size.
    pub fn chunk_size_for(&self, width: u32, height: u32) -> u32 {
        let cell_count = width as u64 * height as u64;
        if cell_count <= self.flat_storage_max_cells {
            width.max(height).max(1)
        } else {
            self.chunk_size
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
