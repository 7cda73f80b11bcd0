mod framebuffer;
pub(crate) mod raster;
mod sprites;
mod stats;
mod target;

pub use framebuffer::FrameBuffer;
pub use sprites::{AtlasError, NoSprites, SpriteAtlas, SpriteAtlasSet, SpriteRef, SpriteSource, TextureId};
pub use stats::{RasterSummary, RasterTimings, RenderStats};
pub use target::{BlitSource, DrawCommand, DrawList, RenderTarget};

/// Color outside the grid's bounds.
pub const CLEAR_COLOR: crate::geometry::Rgba = [0, 0, 0, 255];
