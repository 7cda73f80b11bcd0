use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::entity::EntityId;
use crate::geometry::{CellCoord, PixelRect};
use crate::render::{BlitSource, RenderStats, RenderTarget, SpriteSource, CLEAR_COLOR};
use crate::visibility::VisibilityField;

use super::Grid;

/// Per-frame render states, run in declaration order every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPhase {
    Cull,
    Rasterize,
    CompositeBelow,
    CompositeEntities,
    CompositeAbove,
    Present,
}

impl RenderPhase {
    pub const ALL: [RenderPhase; 6] = [
        RenderPhase::Cull,
        RenderPhase::Rasterize,
        RenderPhase::CompositeBelow,
        RenderPhase::CompositeEntities,
        RenderPhase::CompositeAbove,
        RenderPhase::Present,
    ];

    fn name(self) -> &'static str {
        match self {
            RenderPhase::Cull => "cull",
            RenderPhase::Rasterize => "rasterize",
            RenderPhase::CompositeBelow => "composite_below",
            RenderPhase::CompositeEntities => "composite_entities",
            RenderPhase::CompositeAbove => "composite_above",
            RenderPhase::Present => "present",
        }
    }
}

#[derive(Debug, Default)]
struct FrameState {
    visible_chunks: Vec<usize>,
    stats: RenderStats,
}

impl Grid {
    /// Draws one frame into `target`. Only dirty chunks in view are
    /// re-rasterized; everything else is composited from cached images.
    pub fn render(&mut self, target: &mut dyn RenderTarget, sprites: &dyn SpriteSource) -> RenderStats {
        let lock = Arc::clone(&self.frame_lock);
        let _guard = lock.acquire();

        target.begin_frame(self.camera.viewport(), CLEAR_COLOR);
        let mut frame = FrameState::default();
        for phase in RenderPhase::ALL {
            trace!(phase = phase.name(), "render_phase");
            match phase {
                RenderPhase::Cull => self.cull(&mut frame),
                RenderPhase::Rasterize => self.rasterize(&mut frame, sprites),
                RenderPhase::CompositeBelow => self.composite_below(&mut frame, target),
                RenderPhase::CompositeEntities => self.composite_entities(&mut frame, target),
                RenderPhase::CompositeAbove => self.composite_above(&mut frame, target),
                RenderPhase::Present => target.present(),
            }
        }

        self.composite_dirty = false;
        self.frames_rendered = self.frames_rendered.saturating_add(1);
        self.last_stats = frame.stats;
        if frame.stats.rasterized_chunks > 0 {
            debug!(
                frame = self.frames_rendered,
                visible_chunks = frame.stats.visible_chunks,
                rasterized_chunks = frame.stats.rasterized_chunks,
                raster_ms = self.raster_timings.summary().last_ms,
                "frame_rasterized"
            );
        }
        frame.stats
    }

    fn cull(&self, frame: &mut FrameState) {
        if self.camera.viewport().is_empty() {
            return;
        }
        let rect = self.camera.visible_grid_rect();
        frame.visible_chunks = self.chunks.visible_chunks(rect, self.cell_pixel_size());
        frame.stats.visible_chunks = frame.visible_chunks.len();
    }

    fn rasterize(&mut self, frame: &mut FrameState, sprites: &dyn SpriteSource) {
        let started = Instant::now();
        let cell_pixel_size = self.config.cell_pixel_size;
        let background = self.config.background;
        for index in &frame.visible_chunks {
            let Some(chunk) = self.chunks.chunk_at_index_mut(*index) else {
                continue;
            };
            if chunk.ensure_raster(&self.layers, sprites, cell_pixel_size, background) {
                frame.stats.rasterized_chunks += 1;
            }
        }
        self.raster_timings
            .record(started.elapsed(), frame.stats.rasterized_chunks);
    }

    fn composite_below(&self, frame: &mut FrameState, target: &mut dyn RenderTarget) {
        for index in &frame.visible_chunks {
            let Some(chunk) = self.chunks.chunk_at_index(*index) else {
                continue;
            };
            let Some(image) = chunk.base_raster() else {
                continue;
            };
            let source = BlitSource {
                chunk: chunk.chunk_coords(),
                layer: None,
            };
            let dst = self
                .camera
                .grid_rect_to_screen(chunk.pixel_bounds(self.cell_pixel_size()));
            target.blit(source, image, full_image_rect(image), dst);
        }
        self.composite_layers(frame, target, true);
    }

    fn composite_above(&self, frame: &mut FrameState, target: &mut dyn RenderTarget) {
        self.composite_layers(frame, target, false);
        if let Some(viewer) = self.viewer() {
            frame.stats.fog_cells = self.composite_fog(viewer, target);
        }
    }

    fn composite_layers(&self, frame: &mut FrameState, target: &mut dyn RenderTarget, below: bool) {
        let cell_pixel_size = self.cell_pixel_size();
        for layer in self.layers.iter() {
            if !layer.is_visible() || layer.renders_below_entities() != below {
                continue;
            }
            let mut drawn = false;
            for index in &frame.visible_chunks {
                let Some(chunk) = self.chunks.chunk_at_index(*index) else {
                    continue;
                };
                let Some(image) = chunk.layer_raster(layer.id()) else {
                    continue;
                };
                let source = BlitSource {
                    chunk: chunk.chunk_coords(),
                    layer: Some(layer.id()),
                };
                let dst = self
                    .camera
                    .grid_rect_to_screen(chunk.pixel_bounds(cell_pixel_size));
                target.blit(source, image, full_image_rect(image), dst);
                drawn = true;
            }
            if drawn {
                frame.stats.layers_composited += 1;
            }
        }
    }

    fn composite_entities(&self, frame: &mut FrameState, target: &mut dyn RenderTarget) {
        let size = self.cell_pixel_size() as f64;
        let viewport = self.camera.viewport();
        let screen = PixelRect::from_size(0, 0, viewport.width, viewport.height);
        let viewer = self.viewer();

        for entity in self.entities.iter() {
            if !entity.is_visible() {
                continue;
            }
            if let Some(viewer) = viewer {
                let cell = entity.cell();
                if viewer.id != entity.id() && !viewer.sees(cell.x, cell.y) {
                    continue;
                }
            }
            let position = entity.position();
            let left = position.x as f64 * size;
            let top = position.y as f64 * size;
            let dst = self
                .camera
                .grid_span_to_screen(left, top, left + size, top + size);
            if !dst.intersects(&screen) {
                continue;
            }
            match entity.sprite {
                Some(sprite) => target.draw_sprite(sprite, dst),
                None => target.fill_rect(dst, entity.color),
            }
            frame.stats.entities_drawn += 1;
        }
    }

    fn composite_fog(&self, viewer: Viewer<'_>, target: &mut dyn RenderTarget) -> usize {
        let Some(cells) =
            self.camera
                .visible_cells(self.cell_pixel_size(), self.width(), self.height())
        else {
            return 0;
        };
        let mut fogged = 0usize;
        for y in cells.y_min..=cells.y_max {
            for x in cells.x_min..=cells.x_max {
                let (x, y) = (x as i32, y as i32);
                let color = if !viewer.remembers(x, y) {
                    self.config.fog_unknown
                } else if !viewer.sees(x, y) {
                    self.config.fog_remembered
                } else {
                    continue;
                };
                target.fill_rect(self.cell_to_screen(CellCoord::new(x, y)), color);
                fogged += 1;
            }
        }
        fogged
    }

    fn viewer(&self) -> Option<Viewer<'_>> {
        let id = self.perspective?;
        let entity = self.entities.get(id)?;
        Some(Viewer {
            id,
            field: entity.fov(),
        })
    }
}

/// The perspective entity. Before its first FOV pass it has seen nothing.
#[derive(Debug, Clone, Copy)]
struct Viewer<'a> {
    id: EntityId,
    field: Option<&'a VisibilityField>,
}

impl Viewer<'_> {
    fn sees(&self, x: i32, y: i32) -> bool {
        self.field.is_some_and(|field| field.is_visible(x, y))
    }

    fn remembers(&self, x: i32, y: i32) -> bool {
        self.field.is_some_and(|field| field.is_discovered(x, y))
    }
}

fn full_image_rect(image: &image::RgbaImage) -> PixelRect {
    PixelRect::from_size(0, 0, image.width(), image.height())
}
