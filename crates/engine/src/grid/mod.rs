mod render_pass;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::camera::{Camera, Viewport};
use crate::cells::{CellGrid, CellRecord, ChunkManager};
use crate::config::GridConfig;
use crate::entity::{Entity, EntityArena, EntityId, EntitySpec};
use crate::error::GridError;
use crate::geometry::{CellCoord, PixelRect, Rgba, Vec2};
use crate::layers::{Layer, LayerId, LayerKind, LayerStack};
use crate::pathfinding::{self, CostField, CostFieldCache};
use crate::render::{RasterTimings, RenderStats, SpriteRef, TextureId};
use crate::spatial::SpatialHash;
use crate::sync::FrameLock;
use crate::visibility::{self, FovMask, FovSettings, VisibilityField};
use crate::MAX_GRID_DIMENSION;

pub use render_pass::RenderPhase;

/// Owns cell storage, layers, entities and caches for one world grid.
#[derive(Debug)]
pub struct Grid {
    config: GridConfig,
    chunks: ChunkManager,
    layers: LayerStack,
    entities: EntityArena,
    spatial: SpatialHash,
    cost_cache: CostFieldCache,
    walkability_generation: u64,
    camera: Camera,
    perspective: Option<EntityId>,
    composite_dirty: bool,
    frame_lock: Arc<FrameLock>,
    last_stats: RenderStats,
    raster_timings: RasterTimings,
    frames_rendered: u64,
}

impl Grid {
    pub fn new(width: u32, height: u32, config: GridConfig) -> Result<Self, GridError> {
        check_dimensions(width, height)?;
        if let Err(error) = config.validate() {
            warn!(error = %error, "grid_config_rejected");
            return Err(error.into());
        }

        let chunk_size = config.chunk_size_for(width, height);
        let chunks = ChunkManager::new(width, height, chunk_size);
        info!(
            width,
            height,
            chunk_size,
            chunks = chunks.chunk_count(),
            "grid_created"
        );
        Ok(Self {
            spatial: SpatialHash::new(config.spatial_bucket_size),
            chunks,
            layers: LayerStack::new(width, height),
            entities: EntityArena::new(),
            cost_cache: CostFieldCache::with_capacity(config.max_cost_fields),
            walkability_generation: 0,
            camera: Camera::new(Viewport::new(0, 0)),
            perspective: None,
            composite_dirty: true,
            frame_lock: Arc::new(FrameLock::new()),
            last_stats: RenderStats::default(),
            raster_timings: RasterTimings::default(),
            frames_rendered: 0,
            config,
        })
    }

    pub fn width(&self) -> u32 {
        self.chunks.width()
    }

    pub fn height(&self) -> u32 {
        self.chunks.height()
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn cell_pixel_size(&self) -> u32 {
        self.config.cell_pixel_size
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.chunks.contains(x, y)
    }

    /// Read-only cell storage, also usable as a [`CellGrid`].
    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    /// Rebuilds storage for new dimensions. Overlapping cells and layer
    /// values survive; cost fields do not.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GridError> {
        check_dimensions(width, height)?;
        let chunk_size = self.config.chunk_size_for(width, height);
        self.chunks.resize(width, height, chunk_size);
        self.layers.resize(width, height);
        for entity in self.entities.iter_mut() {
            if let Some(field) = entity.fov.as_mut() {
                field.resize(width, height);
            }
        }
        self.bump_walkability_generation();
        self.composite_dirty = true;
        info!(
            width,
            height,
            chunk_size,
            chunks = self.chunks.chunk_count(),
            "grid_resized"
        );
        Ok(())
    }

    // Cells

    pub fn cell(&self, x: i32, y: i32) -> Option<CellRecord> {
        if !self.contains(x, y) {
            return None;
        }
        Some(self.chunks.at(x as u32, y as u32))
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.chunks.is_walkable(x, y)
    }

    pub fn is_transparent(&self, x: i32, y: i32) -> bool {
        self.chunks.is_transparent(x, y)
    }

    pub fn set_cell(&mut self, x: i32, y: i32, cell: CellRecord) -> Result<(), GridError> {
        let previous = self.cell(x, y).ok_or_else(|| self.out_of_bounds(x, y))?;
        if previous == cell {
            return Ok(());
        }
        self.chunks.set(x as u32, y as u32, cell);
        if previous.walkable != cell.walkable {
            self.bump_walkability_generation();
        }
        Ok(())
    }

    pub fn set_walkable(&mut self, x: i32, y: i32, walkable: bool) -> Result<(), GridError> {
        let cell = self.cell(x, y).ok_or_else(|| self.out_of_bounds(x, y))?;
        self.set_cell(x, y, CellRecord { walkable, ..cell })
    }

    pub fn set_transparent(&mut self, x: i32, y: i32, transparent: bool) -> Result<(), GridError> {
        let cell = self.cell(x, y).ok_or_else(|| self.out_of_bounds(x, y))?;
        self.set_cell(x, y, CellRecord { transparent, ..cell })
    }

    pub fn fill_cells(&mut self, cell: CellRecord) {
        for y in 0..self.height() {
            for x in 0..self.width() {
                self.chunks.set(x, y, cell);
            }
        }
        self.bump_walkability_generation();
    }

    /// Bumped on every walkability change; cost fields from older
    /// generations are never served.
    pub fn walkability_generation(&self) -> u64 {
        self.walkability_generation
    }

    fn bump_walkability_generation(&mut self) {
        self.walkability_generation = self.walkability_generation.wrapping_add(1);
        self.cost_cache.invalidate(self.walkability_generation);
    }

    // Layers

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn get_layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get_layer(name)
    }

    pub fn add_color_layer(&mut self, name: Option<&str>, z_index: i32) -> Result<LayerId, GridError> {
        let id = self.layers.add(LayerKind::Color, name, z_index, None)?;
        self.composite_dirty = true;
        Ok(id)
    }

    pub fn add_tile_layer(
        &mut self,
        name: Option<&str>,
        z_index: i32,
        texture: Option<TextureId>,
    ) -> Result<LayerId, GridError> {
        let id = self.layers.add(LayerKind::Tile, name, z_index, texture)?;
        self.composite_dirty = true;
        Ok(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), GridError> {
        let removed = self.layers.remove(id)?;
        self.chunks.drop_layer_rasters(id);
        self.composite_dirty = true;
        debug!(layer = id.raw(), name = ?removed.name(), "layer_removed");
        Ok(())
    }

    pub fn rename_layer(&mut self, id: LayerId, name: Option<&str>) -> Result<(), GridError> {
        self.layers.rename(id, name)
    }

    /// Re-sorts only; cached chunk images are reused.
    pub fn set_layer_z_index(&mut self, id: LayerId, z_index: i32) -> Result<(), GridError> {
        if self.layers.set_z_index(id, z_index)? {
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> Result<(), GridError> {
        if self.layers.set_visible(id, visible)? {
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn layer_color(&self, id: LayerId, x: i32, y: i32) -> Option<Rgba> {
        if !self.contains(x, y) {
            return None;
        }
        self.layers.get(id)?.color_at(x as u32, y as u32)
    }

    pub fn layer_tile(&self, id: LayerId, x: i32, y: i32) -> Option<Option<u32>> {
        if !self.contains(x, y) {
            return None;
        }
        self.layers.get(id)?.tile_at(x as u32, y as u32)
    }

    /// Dirties only the chunk that owns `(x, y)`, and only on a real change.
    pub fn set_color(&mut self, id: LayerId, x: i32, y: i32, color: Rgba) -> Result<(), GridError> {
        if !self.contains(x, y) {
            return Err(self.out_of_bounds(x, y));
        }
        let colors = self
            .layers
            .get_mut(id)
            .ok_or(GridError::UnknownLayer(id))?
            .color_cells_mut()
            .ok_or(GridError::LayerKindMismatch {
                layer: id,
                expected: LayerKind::Color,
            })?;
        if colors.set(x as u32, y as u32, color) {
            self.chunks.mark_dirty_at(x as u32, y as u32);
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn set_tile(
        &mut self,
        id: LayerId,
        x: i32,
        y: i32,
        sprite: Option<u32>,
    ) -> Result<(), GridError> {
        if !self.contains(x, y) {
            return Err(self.out_of_bounds(x, y));
        }
        let tiles = self.tile_cells_mut(id)?;
        if tiles.plane_mut().set(x as u32, y as u32, sprite) {
            self.chunks.mark_dirty_at(x as u32, y as u32);
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn fill_color(&mut self, id: LayerId, color: Rgba) -> Result<(), GridError> {
        self.layers
            .get_mut(id)
            .ok_or(GridError::UnknownLayer(id))?
            .color_cells_mut()
            .ok_or(GridError::LayerKindMismatch {
                layer: id,
                expected: LayerKind::Color,
            })?
            .fill(color);
        self.chunks.mark_all_dirty();
        self.composite_dirty = true;
        Ok(())
    }

    pub fn fill_tiles(&mut self, id: LayerId, sprite: Option<u32>) -> Result<(), GridError> {
        self.tile_cells_mut(id)?.plane_mut().fill(sprite);
        self.chunks.mark_all_dirty();
        self.composite_dirty = true;
        Ok(())
    }

    pub fn set_layer_texture(&mut self, id: LayerId, texture: Option<TextureId>) -> Result<(), GridError> {
        if self.tile_cells_mut(id)?.set_texture(texture) {
            self.chunks.mark_all_dirty();
            self.composite_dirty = true;
        }
        Ok(())
    }

    fn tile_cells_mut(&mut self, id: LayerId) -> Result<&mut crate::layers::TileCells, GridError> {
        self.layers
            .get_mut(id)
            .ok_or(GridError::UnknownLayer(id))?
            .tile_cells_mut()
            .ok_or(GridError::LayerKindMismatch {
                layer: id,
                expected: LayerKind::Tile,
            })
    }

    // Entities

    pub fn spawn(&mut self, spec: EntitySpec) -> EntityId {
        let id = self.entities.spawn(spec);
        self.spatial.insert(id, spec.position);
        self.composite_dirty = true;
        debug!(
            index = id.index,
            generation = id.generation,
            x = spec.position.x,
            y = spec.position.y,
            "entity_spawned"
        );
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Result<Entity, GridError> {
        let entity = self.entities.despawn(id).ok_or(GridError::UnknownEntity(id))?;
        self.spatial.remove(id, entity.position());
        if self.perspective == Some(id) {
            self.perspective = None;
        }
        self.composite_dirty = true;
        debug!(index = id.index, generation = id.generation, "entity_despawned");
        Ok(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn move_entity(&mut self, id: EntityId, position: Vec2) -> Result<(), GridError> {
        let entity = self.entities.get_mut(id).ok_or(GridError::UnknownEntity(id))?;
        let previous = entity.position;
        if previous == position {
            return Ok(());
        }
        entity.position = position;
        self.spatial.update(id, previous, position);
        self.composite_dirty = true;
        Ok(())
    }

    pub fn set_entity_visible(&mut self, id: EntityId, visible: bool) -> Result<(), GridError> {
        let entity = self.entities.get_mut(id).ok_or(GridError::UnknownEntity(id))?;
        if entity.visible != visible {
            entity.visible = visible;
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn set_entity_sprite(&mut self, id: EntityId, sprite: Option<SpriteRef>) -> Result<(), GridError> {
        let entity = self.entities.get_mut(id).ok_or(GridError::UnknownEntity(id))?;
        if entity.sprite != sprite {
            entity.sprite = sprite;
            self.composite_dirty = true;
        }
        Ok(())
    }

    /// Live entities within `radius` cells of `center`, in no particular order.
    pub fn entities_in_radius(&mut self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let entities = &self.entities;
        self.spatial.query_radius(center, radius, |id| {
            entities.get(id).map(Entity::position)
        })
    }

    pub fn spatial_hash(&self) -> &SpatialHash {
        &self.spatial
    }

    // Visibility

    /// Recomputes an entity's field of view from its current cell,
    /// allocating its visibility memory on first use.
    pub fn compute_fov(&mut self, id: EntityId, settings: FovSettings) -> Result<(), GridError> {
        let (width, height) = (self.width(), self.height());
        let entity = self.entities.get_mut(id).ok_or(GridError::UnknownEntity(id))?;
        let origin = entity.cell();
        let field = entity
            .fov
            .get_or_insert_with(|| VisibilityField::new(width, height));
        field.compute(&self.chunks, origin, settings);
        if self.perspective == Some(id) {
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn visibility(&self, id: EntityId) -> Option<&VisibilityField> {
        self.entities.get(id)?.fov()
    }

    pub fn is_in_fov(&self, id: EntityId, x: i32, y: i32) -> bool {
        self.visibility(id)
            .map(|field| field.is_visible(x, y))
            .unwrap_or(false)
    }

    pub fn is_discovered(&self, id: EntityId, x: i32, y: i32) -> bool {
        self.visibility(id)
            .map(|field| field.is_discovered(x, y))
            .unwrap_or(false)
    }

    /// One-off sight check that touches no entity's memory.
    pub fn compute_fov_mask(&self, origin: CellCoord, settings: FovSettings) -> FovMask {
        visibility::compute_fov_mask(&self.chunks, origin, settings)
    }

    // Pathfinding

    pub fn cost_field(&mut self, root: CellCoord) -> Result<Arc<CostField>, GridError> {
        self.cost_cache
            .get_or_build(
                &self.chunks,
                root,
                self.config.diagonal_cost,
                self.walkability_generation,
            )
            .ok_or_else(|| self.out_of_bounds(root.x, root.y))
    }

    /// Route from `root` to `target` through the cached cost field for `root`.
    pub fn path_to(&mut self, root: CellCoord, target: CellCoord) -> Result<Vec<CellCoord>, GridError> {
        Ok(self.cost_field(root)?.path_to(target.x, target.y))
    }

    pub fn find_path(&self, start: CellCoord, goal: CellCoord) -> Vec<CellCoord> {
        pathfinding::find_path(&self.chunks, start, goal, self.config.diagonal_cost)
    }

    pub fn cost_cache(&self) -> &CostFieldCache {
        &self.cost_cache
    }

    pub fn clear_cost_cache(&mut self) {
        self.cost_cache.clear();
    }

    // Camera

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera_center(&mut self, center: Vec2) {
        if self.camera.set_center(center) {
            self.composite_dirty = true;
        }
    }

    /// Centers the camera on the middle of `cell`.
    pub fn center_on_cell(&mut self, cell: CellCoord) {
        let size = self.cell_pixel_size() as f32;
        let center = cell.center();
        self.set_camera_center(Vec2::new(center.x * size, center.y * size));
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), GridError> {
        if self.camera.set_zoom(zoom)? {
            self.composite_dirty = true;
        }
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.camera.set_viewport(viewport) {
            self.composite_dirty = true;
        }
    }

    pub fn screen_to_cell(&self, screen_x: i32, screen_y: i32) -> CellCoord {
        self.camera
            .screen_to_cell(screen_x, screen_y, self.cell_pixel_size())
    }

    pub fn cell_to_screen(&self, cell: CellCoord) -> PixelRect {
        self.camera.cell_to_screen(cell, self.cell_pixel_size())
    }

    // Perspective

    pub fn perspective(&self) -> Option<EntityId> {
        self.perspective
    }

    /// Renders through `entity`'s eyes: fog over unseen cells and only
    /// entities it can see. `None` shows everything.
    pub fn set_perspective(&mut self, entity: Option<EntityId>) -> Result<(), GridError> {
        if let Some(id) = entity {
            if !self.entities.contains(id) {
                return Err(GridError::UnknownEntity(id));
            }
        }
        if self.perspective != entity {
            self.perspective = entity;
            self.composite_dirty = true;
        }
        Ok(())
    }

    // Frame state

    pub fn frame_lock(&self) -> Arc<FrameLock> {
        Arc::clone(&self.frame_lock)
    }

    /// Whether the next frame would differ from the last one presented.
    pub fn needs_redraw(&self) -> bool {
        if self.composite_dirty {
            return true;
        }
        let rect = self.camera.visible_grid_rect();
        self.chunks
            .visible_chunks(rect, self.cell_pixel_size())
            .into_iter()
            .filter_map(|index| self.chunks.chunk_at_index(index))
            .any(|chunk| chunk.is_dirty())
    }

    pub fn last_render_stats(&self) -> RenderStats {
        self.last_stats
    }

    pub fn raster_timings(&self) -> &RasterTimings {
        &self.raster_timings
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn out_of_bounds(&self, x: i32, y: i32) -> GridError {
        GridError::OutOfBounds {
            x,
            y,
            width: self.width(),
            height: self.height(),
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), GridError> {
    let valid = |value: u32| (1..=MAX_GRID_DIMENSION).contains(&value);
    if valid(width) && valid(height) {
        return Ok(());
    }
    warn!(width, height, "grid_dimensions_rejected");
    Err(GridError::InvalidDimensions {
        width,
        height,
        max: MAX_GRID_DIMENSION,
    })
}
