mod chunk;
mod manager;

use serde::{Deserialize, Serialize};

pub use chunk::Chunk;
pub use manager::ChunkManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRecord {
    pub walkable: bool,
    pub transparent: bool,
}

impl CellRecord {
    pub const OPEN: CellRecord = CellRecord {
        walkable: true,
        transparent: true,
    };
    pub const WALL: CellRecord = CellRecord {
        walkable: false,
        transparent: false,
    };
}

/// Read access to per-cell flags, shared by the FOV and pathfinding passes.
pub trait CellGrid {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn cell(&self, x: u32, y: u32) -> Option<CellRecord>;

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.contains(x, y)
            && self
                .cell(x as u32, y as u32)
                .map(|cell| cell.walkable)
                .unwrap_or(false)
    }

    fn is_transparent(&self, x: i32, y: i32) -> bool {
        self.contains(x, y)
            && self
                .cell(x as u32, y as u32)
                .map(|cell| cell.transparent)
                .unwrap_or(false)
    }
}
