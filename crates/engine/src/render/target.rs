use image::RgbaImage;

use crate::camera::Viewport;
use crate::geometry::{PixelRect, Rgba};
use crate::layers::LayerId;

use super::SpriteRef;

/// Which cached raster a blit reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlitSource {
    pub chunk: (u32, u32),
    /// `None` is the chunk's base (background) image.
    pub layer: Option<LayerId>,
}

/// Host drawing surface. The grid calls these in composite order once per frame.
pub trait RenderTarget {
    fn begin_frame(&mut self, viewport: Viewport, clear: Rgba);
    fn blit(&mut self, source: BlitSource, image: &RgbaImage, src: PixelRect, dst: PixelRect);
    fn draw_sprite(&mut self, sprite: SpriteRef, dst: PixelRect);
    fn fill_rect(&mut self, dst: PixelRect, color: Rgba);
    fn present(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    Clear {
        viewport: Viewport,
        color: Rgba,
    },
    Blit {
        source: BlitSource,
        src: PixelRect,
        dst: PixelRect,
    },
    Sprite {
        sprite: SpriteRef,
        dst: PixelRect,
    },
    Fill {
        dst: PixelRect,
        color: Rgba,
    },
}

/// Records the last frame's draw calls for a host renderer to replay.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
    presented_frames: u64,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    pub fn blits(&self) -> impl Iterator<Item = (BlitSource, PixelRect, PixelRect)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Blit { source, src, dst } => Some((*source, *src, *dst)),
            _ => None,
        })
    }
}

impl RenderTarget for DrawList {
    fn begin_frame(&mut self, viewport: Viewport, clear: Rgba) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear {
            viewport,
            color: clear,
        });
    }

    fn blit(&mut self, source: BlitSource, _image: &RgbaImage, src: PixelRect, dst: PixelRect) {
        self.commands.push(DrawCommand::Blit { source, src, dst });
    }

    fn draw_sprite(&mut self, sprite: SpriteRef, dst: PixelRect) {
        self.commands.push(DrawCommand::Sprite { sprite, dst });
    }

    fn fill_rect(&mut self, dst: PixelRect, color: Rgba) {
        self.commands.push(DrawCommand::Fill { dst, color });
    }

    fn present(&mut self) {
        self.presented_frames = self.presented_frames.saturating_add(1);
    }
}
