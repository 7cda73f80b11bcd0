use crate::geometry::PixelRect;
use crate::layers::LayerId;

use super::{CellGrid, CellRecord, Chunk};

/// Row-major array of chunks covering the whole grid.
#[derive(Debug)]
pub struct ChunkManager {
    width: u32,
    height: u32,
    chunk_size: u32,
    chunks_x: u32,
    chunks_y: u32,
    chunks: Vec<Chunk>,
}

impl ChunkManager {
    pub fn new(width: u32, height: u32, chunk_size: u32) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be non-zero");
        let chunk_size = chunk_size.max(1);
        let chunks_x = width.div_ceil(chunk_size);
        let chunks_y = height.div_ceil(chunk_size);
        let mut chunks = Vec::with_capacity(chunks_x as usize * chunks_y as usize);
        for chunk_y in 0..chunks_y {
            for chunk_x in 0..chunks_x {
                let origin_x = chunk_x * chunk_size;
                let origin_y = chunk_y * chunk_size;
                chunks.push(Chunk::new(
                    chunk_x,
                    chunk_y,
                    origin_x,
                    origin_y,
                    chunk_size.min(width - origin_x),
                    chunk_size.min(height - origin_y),
                ));
            }
        }
        Self {
            width,
            height,
            chunk_size,
            chunks_x,
            chunks_y,
            chunks,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn chunks_across(&self) -> (u32, u32) {
        (self.chunks_x, self.chunks_y)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, chunk_x: u32, chunk_y: u32) -> Option<&Chunk> {
        if chunk_x >= self.chunks_x || chunk_y >= self.chunks_y {
            return None;
        }
        self.chunks
            .get(chunk_y as usize * self.chunks_x as usize + chunk_x as usize)
    }

    pub(crate) fn chunk_at_index(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub(crate) fn chunk_at_index_mut(&mut self, index: usize) -> Option<&mut Chunk> {
        self.chunks.get_mut(index)
    }

    pub fn chunk_index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let chunk_x = x / self.chunk_size;
        let chunk_y = y / self.chunk_size;
        Some(chunk_y as usize * self.chunks_x as usize + chunk_x as usize)
    }

    pub fn chunk_containing(&self, x: u32, y: u32) -> Option<&Chunk> {
        self.chunk_index_of(x, y)
            .and_then(|index| self.chunks.get(index))
    }

    /// Out-of-range reads assert in debug builds and return a default cell otherwise.
    pub fn at(&self, x: u32, y: u32) -> CellRecord {
        match self.chunk_containing(x, y) {
            Some(chunk) => chunk.at(x % self.chunk_size, y % self.chunk_size),
            None => {
                debug_assert!(
                    false,
                    "cell ({x}, {y}) outside {}x{} grid",
                    self.width, self.height
                );
                CellRecord::default()
            }
        }
    }

    pub fn set(&mut self, x: u32, y: u32, cell: CellRecord) {
        let chunk_size = self.chunk_size;
        match self.chunk_index_of(x, y) {
            Some(index) => self.chunks[index].set(x % chunk_size, y % chunk_size, cell),
            None => debug_assert!(
                false,
                "cell ({x}, {y}) outside {}x{} grid",
                self.width, self.height
            ),
        }
    }

    pub fn mark_dirty_at(&mut self, x: u32, y: u32) {
        if let Some(index) = self.chunk_index_of(x, y) {
            self.chunks[index].mark_dirty();
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for chunk in &mut self.chunks {
            chunk.mark_dirty();
        }
    }

    pub fn dirty_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|chunk| chunk.is_dirty()).count()
    }

    pub(crate) fn drop_layer_rasters(&mut self, layer: LayerId) {
        for chunk in &mut self.chunks {
            chunk.drop_layer_raster(layer);
        }
    }

    /// Indices of exactly the chunks whose grid-pixel bounds intersect `rect`.
    pub fn visible_chunks(&self, rect: PixelRect, cell_pixel_size: u32) -> Vec<usize> {
        let mut visible = Vec::new();
        if rect.is_empty() || self.chunks.is_empty() || cell_pixel_size == 0 {
            return visible;
        }
        let chunk_px = self.chunk_size as i64 * cell_pixel_size as i64;
        let clamp_x = |value: i64| value.clamp(0, self.chunks_x as i64 - 1);
        let clamp_y = |value: i64| value.clamp(0, self.chunks_y as i64 - 1);
        let cx_min = clamp_x((rect.left as i64).div_euclid(chunk_px));
        let cx_max = clamp_x((rect.right as i64 - 1).div_euclid(chunk_px));
        let cy_min = clamp_y((rect.top as i64).div_euclid(chunk_px));
        let cy_max = clamp_y((rect.bottom as i64 - 1).div_euclid(chunk_px));

        for chunk_y in cy_min..=cy_max {
            for chunk_x in cx_min..=cx_max {
                let index = chunk_y as usize * self.chunks_x as usize + chunk_x as usize;
                if self.chunks[index]
                    .pixel_bounds(cell_pixel_size)
                    .intersects(&rect)
                {
                    visible.push(index);
                }
            }
        }
        visible
    }

    /// Rebuilds the chunk array for new dimensions, keeping every cell that still exists.
    pub fn resize(&mut self, new_width: u32, new_height: u32, chunk_size: u32) {
        let mut resized = ChunkManager::new(new_width, new_height, chunk_size);
        let copy_width = self.width.min(new_width);
        let copy_height = self.height.min(new_height);
        for y in 0..copy_height {
            for x in 0..copy_width {
                resized.set(x, y, self.at(x, y));
            }
        }
        *self = resized;
    }
}

impl CellGrid for ChunkManager {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn cell(&self, x: u32, y: u32) -> Option<CellRecord> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.at(x, y))
    }
}
