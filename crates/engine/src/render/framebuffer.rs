use image::RgbaImage;
use tracing::warn;

use crate::camera::Viewport;
use crate::geometry::{PixelRect, Rgba};

use super::raster::{blit_scaled, fill_rect, BlendMode};
use super::{BlitSource, RenderTarget, SpriteRef, SpriteSource};

const MISSING_SPRITE_COLOR: Rgba = [255, 0, 255, 255];

/// Software compositor that draws every call into an RGBA image.
pub struct FrameBuffer<'a> {
    image: RgbaImage,
    sprites: &'a dyn SpriteSource,
    presented_frames: u64,
    warned_missing_sprites: bool,
}

impl<'a> FrameBuffer<'a> {
    pub fn new(sprites: &'a dyn SpriteSource) -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            sprites,
            presented_frames: 0,
            warned_missing_sprites: false,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.image.width() || y >= self.image.height() {
            return None;
        }
        Some(self.image.get_pixel(x, y).0)
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }
}

impl RenderTarget for FrameBuffer<'_> {
    fn begin_frame(&mut self, viewport: Viewport, clear: Rgba) {
        if self.image.dimensions() != (viewport.width, viewport.height) {
            self.image = RgbaImage::new(viewport.width, viewport.height);
        }
        for pixel in self.image.chunks_exact_mut(4) {
            pixel.copy_from_slice(&clear);
        }
    }

    fn blit(&mut self, _source: BlitSource, image: &RgbaImage, src: PixelRect, dst: PixelRect) {
        let (width, height) = self.image.dimensions();
        blit_scaled(&mut self.image, width, height, image, src, dst, BlendMode::Over);
    }

    fn draw_sprite(&mut self, sprite: SpriteRef, dst: PixelRect) {
        let (width, height) = self.image.dimensions();
        match self.sprites.sprite(sprite.texture, sprite.index) {
            Some(pixels) => {
                let src = PixelRect::from_size(0, 0, pixels.width(), pixels.height());
                blit_scaled(&mut self.image, width, height, pixels, src, dst, BlendMode::Over);
            }
            None => {
                if !self.warned_missing_sprites {
                    self.warned_missing_sprites = true;
                    warn!(
                        texture = sprite.texture.0,
                        index = sprite.index,
                        "framebuffer_sprite_missing_using_placeholder"
                    );
                }
                fill_rect(
                    &mut self.image,
                    width,
                    height,
                    dst,
                    MISSING_SPRITE_COLOR,
                    BlendMode::Replace,
                );
            }
        }
    }

    fn fill_rect(&mut self, dst: PixelRect, color: Rgba) {
        let (width, height) = self.image.dimensions();
        fill_rect(&mut self.image, width, height, dst, color, BlendMode::Over);
    }

    fn present(&mut self) {
        self.presented_frames = self.presented_frames.saturating_add(1);
    }
}
