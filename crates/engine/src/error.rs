use thiserror::Error;

use crate::config::ConfigError;
use crate::entity::EntityId;
use crate::layers::{LayerId, LayerKind};

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid dimensions {width}x{height} must each be within 1..={max}")]
    InvalidDimensions { width: u32, height: u32, max: u32 },
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    #[error("zoom must be finite and greater than zero, got {0}")]
    InvalidZoom(f32),
    #[error("layer name `{0}` is reserved")]
    ReservedLayerName(String),
    #[error("layer name `{0}` is already in use")]
    DuplicateLayerName(String),
    #[error("layer names must not be empty")]
    EmptyLayerName,
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerId),
    #[error("layer {layer:?} is not a {expected:?} layer")]
    LayerKindMismatch { layer: LayerId, expected: LayerKind },
    #[error("unknown or despawned entity {0:?}")]
    UnknownEntity(EntityId),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}
