use serde::{Deserialize, Serialize};

use crate::geometry::{CellCoord, Rgba, Vec2};
use crate::render::SpriteRef;
use crate::visibility::VisibilityField;

pub const DEFAULT_ENTITY_COLOR: Rgba = [230, 200, 90, 255];

/// Arena slot plus the generation it was issued at; a despawned id never
/// resolves again even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub position: Vec2,
    pub sprite: Option<SpriteRef>,
    pub color: Rgba,
    pub visible: bool,
}

impl EntitySpec {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            sprite: None,
            color: DEFAULT_ENTITY_COLOR,
            visible: true,
        }
    }

    pub fn with_sprite(mut self, sprite: SpriteRef) -> Self {
        self.sprite = Some(sprite);
        self
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    pub(crate) position: Vec2,
    pub sprite: Option<SpriteRef>,
    pub color: Rgba,
    pub(crate) visible: bool,
    pub(crate) fov: Option<VisibilityField>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Position in cell units; may be fractional or outside the grid.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn cell(&self) -> CellCoord {
        self.position.cell()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn fov(&self) -> Option<&VisibilityField> {
        self.fov.as_ref()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn spawn(&mut self, spec: EntitySpec) -> EntityId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entity: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = EntityId {
            index,
            generation: slot.generation,
        };
        slot.entity = Some(Entity {
            id,
            position: spec.position,
            sprite: spec.sprite,
            color: spec.color,
            visible: spec.visible,
            fov: None,
        });
        self.live += 1;
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entity.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entity.as_mut()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().filter_map(|slot| slot.entity.as_mut())
    }
}
