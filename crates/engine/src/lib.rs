pub mod camera;
pub mod cells;
pub mod config;
pub mod entity;
mod error;
pub mod geometry;
mod grid;
pub mod layers;
pub mod pathfinding;
pub mod render;
pub mod spatial;
pub mod sync;
pub mod visibility;

pub use camera::{Camera, Viewport};
pub use cells::{CellGrid, CellRecord, Chunk, ChunkManager};
pub use config::{ConfigError, GridConfig};
pub use entity::{Entity, EntityId, EntitySpec};
pub use error::GridError;
pub use geometry::{CellCoord, CellRect, PixelRect, Rgba, Vec2};
pub use grid::{Grid, RenderPhase};
pub use layers::{Layer, LayerId, LayerKind, LayerStack, RESERVED_LAYER_NAMES};
pub use pathfinding::{CostField, CostFieldCache, UNREACHABLE};
pub use render::{
    AtlasError, BlitSource, DrawCommand, DrawList, FrameBuffer, NoSprites, RasterSummary,
    RasterTimings, RenderStats, RenderTarget, SpriteAtlas, SpriteAtlasSet, SpriteRef,
    SpriteSource, TextureId,
};
pub use spatial::SpatialHash;
pub use sync::{FrameGuard, FrameLock};
pub use visibility::{FovAlgorithm, FovMask, FovSettings, VisibilityField};

/// Upper bound for each grid dimension, in cells.
pub const MAX_GRID_DIMENSION: u32 = 8192;
