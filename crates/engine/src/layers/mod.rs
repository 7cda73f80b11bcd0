mod plane;

use tracing::debug;

use crate::error::GridError;
use crate::geometry::Rgba;
use crate::render::TextureId;

pub use plane::{Plane, TileCells};

/// Names with built-in meaning on the grid; user layers may not take them.
pub const RESERVED_LAYER_NAMES: [&str; 4] = ["walkable", "transparent", "entities", "perspective"];

/// Creation-ordered handle; ids are never reused within a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Color,
    Tile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerCells {
    Color(Plane<Rgba>),
    Tile(TileCells),
}

#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: Option<String>,
    z_index: i32,
    visible: bool,
    cells: LayerCells,
}

impl Layer {
    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Negative z-indices composite below entities.
    pub fn renders_below_entities(&self) -> bool {
        self.z_index < 0
    }

    pub fn kind(&self) -> LayerKind {
        match self.cells {
            LayerCells::Color(_) => LayerKind::Color,
            LayerCells::Tile(_) => LayerKind::Tile,
        }
    }

    pub fn cells(&self) -> &LayerCells {
        &self.cells
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<Rgba> {
        match &self.cells {
            LayerCells::Color(colors) => colors.get(x, y),
            LayerCells::Tile(_) => None,
        }
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<Option<u32>> {
        match &self.cells {
            LayerCells::Tile(tiles) => tiles.get(x, y),
            LayerCells::Color(_) => None,
        }
    }

    pub(crate) fn color_cells_mut(&mut self) -> Option<&mut Plane<Rgba>> {
        match &mut self.cells {
            LayerCells::Color(colors) => Some(colors),
            LayerCells::Tile(_) => None,
        }
    }

    pub(crate) fn tile_cells_mut(&mut self) -> Option<&mut TileCells> {
        match &mut self.cells {
            LayerCells::Tile(tiles) => Some(tiles),
            LayerCells::Color(_) => None,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        match &mut self.cells {
            LayerCells::Color(colors) => colors.resize(width, height),
            LayerCells::Tile(tiles) => tiles.plane_mut().resize(width, height),
        }
    }
}

/// Layers of one grid, kept sorted by `(z_index, creation order)`.
#[derive(Debug, Clone)]
pub struct LayerStack {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    next_id: u32,
}

impl LayerStack {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in composite order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    pub fn get_layer(&self, name: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|layer| layer.name.as_deref() == Some(name))
    }

    pub fn add(
        &mut self,
        kind: LayerKind,
        name: Option<&str>,
        z_index: i32,
        texture: Option<TextureId>,
    ) -> Result<LayerId, GridError> {
        if let Some(name) = name {
            self.check_name_available(name, None)?;
        }
        let id = LayerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let cells = match kind {
            LayerKind::Color => LayerCells::Color(Plane::new(self.width, self.height)),
            LayerKind::Tile => LayerCells::Tile(TileCells::new(self.width, self.height, texture)),
        };
        self.layers.push(Layer {
            id,
            name: name.map(str::to_string),
            z_index,
            visible: true,
            cells,
        });
        self.sort();
        debug!(layer = id.0, ?kind, z_index, name = ?name, "layer_added");
        Ok(id)
    }

    pub fn remove(&mut self, id: LayerId) -> Result<Layer, GridError> {
        let position = self
            .layers
            .iter()
            .position(|layer| layer.id == id)
            .ok_or(GridError::UnknownLayer(id))?;
        Ok(self.layers.remove(position))
    }

    pub fn rename(&mut self, id: LayerId, name: Option<&str>) -> Result<(), GridError> {
        if let Some(name) = name {
            self.check_name_available(name, Some(id))?;
        }
        let layer = self.get_mut(id).ok_or(GridError::UnknownLayer(id))?;
        layer.name = name.map(str::to_string);
        Ok(())
    }

    /// Returns whether the composite order may have changed.
    pub fn set_z_index(&mut self, id: LayerId, z_index: i32) -> Result<bool, GridError> {
        let layer = self.get_mut(id).ok_or(GridError::UnknownLayer(id))?;
        if layer.z_index == z_index {
            return Ok(false);
        }
        layer.z_index = z_index;
        self.sort();
        Ok(true)
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<bool, GridError> {
        let layer = self.get_mut(id).ok_or(GridError::UnknownLayer(id))?;
        if layer.visible == visible {
            return Ok(false);
        }
        layer.visible = visible;
        Ok(true)
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for layer in &mut self.layers {
            layer.resize(width, height);
        }
    }

    fn sort(&mut self) {
        self.layers.sort_by_key(|layer| (layer.z_index, layer.id));
    }

    fn check_name_available(&self, name: &str, renaming: Option<LayerId>) -> Result<(), GridError> {
        if name.is_empty() {
            return Err(GridError::EmptyLayerName);
        }
        if RESERVED_LAYER_NAMES.contains(&name) {
            return Err(GridError::ReservedLayerName(name.to_string()));
        }
        let taken = self
            .layers
            .iter()
            .any(|layer| layer.name.as_deref() == Some(name) && Some(layer.id) != renaming);
        if taken {
            return Err(GridError::DuplicateLayerName(name.to_string()));
        }
        Ok(())
    }
}
