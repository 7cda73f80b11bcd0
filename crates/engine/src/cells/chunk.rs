use std::collections::HashMap;

use image::RgbaImage;
use tracing::debug;

use crate::geometry::{PixelRect, Rgba, TRANSPARENT};
use crate::layers::{Layer, LayerCells, LayerId, LayerStack};
use crate::render::raster::{blit_scaled, fill_rect, BlendMode};
use crate::render::SpriteSource;

use super::CellRecord;

#[derive(Debug)]
pub struct Chunk {
    chunk_x: u32,
    chunk_y: u32,
    origin_x: u32,
    origin_y: u32,
    span_width: u32,
    span_height: u32,
    cells: Vec<CellRecord>,
    base_raster: Option<RgbaImage>,
    layer_rasters: HashMap<LayerId, RgbaImage>,
    dirty: bool,
}

impl Chunk {
    pub(crate) fn new(
        chunk_x: u32,
        chunk_y: u32,
        origin_x: u32,
        origin_y: u32,
        span_width: u32,
        span_height: u32,
    ) -> Self {
        Self {
            chunk_x,
            chunk_y,
            origin_x,
            origin_y,
            span_width,
            span_height,
            cells: vec![CellRecord::default(); span_width as usize * span_height as usize],
            base_raster: None,
            layer_rasters: HashMap::new(),
            dirty: true,
        }
    }

    pub fn chunk_coords(&self) -> (u32, u32) {
        (self.chunk_x, self.chunk_y)
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.origin_x, self.origin_y)
    }

    pub fn span(&self) -> (u32, u32) {
        (self.span_width, self.span_height)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn contains_cell(&self, x: u32, y: u32) -> bool {
        x >= self.origin_x
            && y >= self.origin_y
            && x < self.origin_x + self.span_width
            && y < self.origin_y + self.span_height
    }

    /// Cell at chunk-local coordinates.
    pub fn at(&self, local_x: u32, local_y: u32) -> CellRecord {
        match self.local_index(local_x, local_y) {
            Some(index) => self.cells[index],
            None => {
                debug_assert!(
                    false,
                    "local cell ({local_x}, {local_y}) outside chunk span {}x{}",
                    self.span_width, self.span_height
                );
                CellRecord::default()
            }
        }
    }

    pub(crate) fn set(&mut self, local_x: u32, local_y: u32, cell: CellRecord) {
        match self.local_index(local_x, local_y) {
            Some(index) => self.cells[index] = cell,
            None => debug_assert!(
                false,
                "local cell ({local_x}, {local_y}) outside chunk span {}x{}",
                self.span_width, self.span_height
            ),
        }
    }

    /// Bounds of this chunk in unzoomed grid pixels.
    pub fn pixel_bounds(&self, cell_pixel_size: u32) -> PixelRect {
        let size = cell_pixel_size as i32;
        PixelRect::new(
            self.origin_x as i32 * size,
            self.origin_y as i32 * size,
            (self.origin_x + self.span_width) as i32 * size,
            (self.origin_y + self.span_height) as i32 * size,
        )
    }

    pub fn base_raster(&self) -> Option<&RgbaImage> {
        self.base_raster.as_ref()
    }

    pub fn layer_raster(&self, layer: LayerId) -> Option<&RgbaImage> {
        self.layer_rasters.get(&layer)
    }

    pub(crate) fn drop_layer_raster(&mut self, layer: LayerId) {
        self.layer_rasters.remove(&layer);
    }

    /// Redraws the cached images when dirty. Returns whether any work was done.
    pub fn ensure_raster(
        &mut self,
        layers: &LayerStack,
        sprites: &dyn SpriteSource,
        cell_pixel_size: u32,
        background: Rgba,
    ) -> bool {
        if !self.dirty {
            return false;
        }

        let pixel_width = self.span_width * cell_pixel_size;
        let pixel_height = self.span_height * cell_pixel_size;
        let base = reuse_or_allocate(self.base_raster.take(), pixel_width, pixel_height);
        self.base_raster = Some(fill_image(base, background));

        self.layer_rasters.retain(|id, _| layers.get(*id).is_some());
        let mut missing_sprites = 0usize;
        for layer in layers.iter() {
            let previous = self.layer_rasters.remove(&layer.id());
            let mut image = fill_image(
                reuse_or_allocate(previous, pixel_width, pixel_height),
                TRANSPARENT,
            );
            missing_sprites += self.rasterize_layer(&mut image, layer, sprites, cell_pixel_size);
            self.layer_rasters.insert(layer.id(), image);
        }
        if missing_sprites > 0 {
            debug!(
                chunk_x = self.chunk_x,
                chunk_y = self.chunk_y,
                missing_sprites,
                "chunk_raster_missing_sprites"
            );
        }

        self.dirty = false;
        true
    }

    fn rasterize_layer(
        &self,
        image: &mut RgbaImage,
        layer: &Layer,
        sprites: &dyn SpriteSource,
        cell_pixel_size: u32,
    ) -> usize {
        let (image_width, image_height) = image.dimensions();
        let mut missing_sprites = 0usize;
        for local_y in 0..self.span_height {
            for local_x in 0..self.span_width {
                let x = self.origin_x + local_x;
                let y = self.origin_y + local_y;
                let cell_rect = PixelRect::from_size(
                    (local_x * cell_pixel_size) as i32,
                    (local_y * cell_pixel_size) as i32,
                    cell_pixel_size,
                    cell_pixel_size,
                );
                match layer.cells() {
                    LayerCells::Color(colors) => {
                        let color = colors.at(x, y);
                        if color[3] != 0 {
                            fill_rect(
                                image,
                                image_width,
                                image_height,
                                cell_rect,
                                color,
                                BlendMode::Replace,
                            );
                        }
                    }
                    LayerCells::Tile(tiles) => {
                        let Some(index) = tiles.at(x, y) else {
                            continue;
                        };
                        let Some(texture) = tiles.texture() else {
                            missing_sprites += 1;
                            continue;
                        };
                        let Some(sprite) = sprites.sprite(texture, index) else {
                            missing_sprites += 1;
                            continue;
                        };
                        let source =
                            PixelRect::from_size(0, 0, sprite.width(), sprite.height());
                        blit_scaled(
                            image,
                            image_width,
                            image_height,
                            sprite,
                            source,
                            cell_rect,
                            BlendMode::Replace,
                        );
                    }
                }
            }
        }
        missing_sprites
    }

    fn local_index(&self, local_x: u32, local_y: u32) -> Option<usize> {
        if local_x >= self.span_width || local_y >= self.span_height {
            return None;
        }
        Some(local_y as usize * self.span_width as usize + local_x as usize)
    }
}

fn reuse_or_allocate(previous: Option<RgbaImage>, width: u32, height: u32) -> RgbaImage {
    match previous {
        Some(image) if image.dimensions() == (width, height) => image,
        _ => RgbaImage::new(width, height),
    }
}

fn fill_image(mut image: RgbaImage, color: Rgba) -> RgbaImage {
    for pixel in image.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerKind;
    use crate::render::NoSprites;

    fn open_layers(width: u32, height: u32) -> LayerStack {
        LayerStack::new(width, height)
    }

    #[test]
    fn new_chunks_start_dirty_and_clean_after_raster() {
        let layers = open_layers(4, 4);
        let mut chunk = Chunk::new(0, 0, 0, 0, 4, 4);
        assert!(chunk.is_dirty());
        assert!(chunk.ensure_raster(&layers, &NoSprites, 2, [9, 9, 9, 255]));
        assert!(!chunk.is_dirty());
        assert!(!chunk.ensure_raster(&layers, &NoSprites, 2, [9, 9, 9, 255]));
    }

    #[test]
    fn mark_dirty_is_idempotent() {
        let mut chunk = Chunk::new(0, 0, 0, 0, 2, 2);
        chunk.mark_dirty();
        chunk.mark_dirty();
        assert!(chunk.is_dirty());
    }

    #[test]
    fn base_raster_is_background_filled() {
        let layers = open_layers(2, 2);
        let mut chunk = Chunk::new(0, 0, 0, 0, 2, 2);
        chunk.ensure_raster(&layers, &NoSprites, 3, [1, 2, 3, 255]);
        let base = chunk.base_raster().expect("base raster");
        assert_eq!(base.dimensions(), (6, 6));
        assert_eq!(base.get_pixel(5, 5).0, [1, 2, 3, 255]);
    }

    #[test]
    fn color_layer_cells_land_at_local_offsets() {
        let mut layers = open_layers(8, 8);
        let id = layers
            .add(LayerKind::Color, None, -1, None)
            .expect("layer");
        layers
            .get_mut(id)
            .and_then(|layer| layer.color_cells_mut())
            .expect("color cells")
            .set(5, 6, [200, 0, 0, 255]);

        let mut chunk = Chunk::new(1, 1, 4, 4, 4, 4);
        chunk.ensure_raster(&layers, &NoSprites, 2, [0, 0, 0, 255]);
        let raster = chunk.layer_raster(id).expect("layer raster");
        assert_eq!(raster.get_pixel(2, 4).0, [200, 0, 0, 255]);
        assert_eq!(raster.get_pixel(3, 5).0, [200, 0, 0, 255]);
        assert_eq!(raster.get_pixel(0, 0).0, TRANSPARENT);
    }

    #[test]
    fn rasters_for_removed_layers_are_dropped_on_redraw() {
        let mut layers = open_layers(2, 2);
        let id = layers
            .add(LayerKind::Color, None, 0, None)
            .expect("layer");
        let mut chunk = Chunk::new(0, 0, 0, 0, 2, 2);
        chunk.ensure_raster(&layers, &NoSprites, 1, [0, 0, 0, 255]);
        assert!(chunk.layer_raster(id).is_some());

        layers.remove(id).expect("remove");
        chunk.mark_dirty();
        chunk.ensure_raster(&layers, &NoSprites, 1, [0, 0, 0, 255]);
        assert!(chunk.layer_raster(id).is_none());
    }
}
