mod raycast;
mod shadowcast;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cells::CellGrid;
use crate::geometry::CellCoord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FovAlgorithm {
    #[default]
    Shadowcast,
    Raycast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FovSettings {
    /// `<= 0` is unlimited (bounded by the grid).
    pub radius: i32,
    /// Mark the opaque cells that stop sight as visible too.
    pub light_walls: bool,
    pub algorithm: FovAlgorithm,
}

impl Default for FovSettings {
    fn default() -> Self {
        Self {
            radius: 0,
            light_walls: true,
            algorithm: FovAlgorithm::Shadowcast,
        }
    }
}

impl FovSettings {
    pub fn with_radius(radius: i32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }
}

/// One FOV pass's result: the cells in line of sight, nothing remembered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FovMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl FovMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_visible(&self, x: i32, y: i32) -> bool {
        self.index_of(x, y)
            .map(|index| self.cells[index])
            .unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.cells.iter().filter(|visible| **visible).count()
    }

    pub fn visible_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, visible)| **visible)
            .map(move |(index, _)| {
                CellCoord::new((index as u32 % width) as i32, (index as u32 / width) as i32)
            })
    }

    pub(crate) fn mark(&mut self, x: i32, y: i32) {
        if let Some(index) = self.index_of(x, y) {
            self.cells[index] = true;
        }
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Cells in line of sight from `origin` over the grid's transparent flags.
/// Out-of-bounds origins see nothing; the origin itself is always visible.
pub fn compute_fov_mask<G: CellGrid + ?Sized>(
    cells: &G,
    origin: CellCoord,
    settings: FovSettings,
) -> FovMask {
    let mut mask = FovMask::empty(cells.width(), cells.height());
    if !cells.contains(origin.x, origin.y) {
        return mask;
    }

    let radius = effective_radius(settings.radius, cells.width(), cells.height());
    mask.mark(origin.x, origin.y);
    match settings.algorithm {
        FovAlgorithm::Shadowcast => {
            shadowcast::cast(cells, origin, radius, settings.light_walls, &mut mask)
        }
        FovAlgorithm::Raycast => raycast::cast(cells, origin, radius, settings.light_walls, &mut mask),
    }
    trace!(
        x = origin.x,
        y = origin.y,
        radius,
        visible = mask.visible_count(),
        "fov_mask_computed"
    );
    mask
}

fn effective_radius(radius: i32, width: u32, height: u32) -> i32 {
    if radius > 0 {
        radius
    } else {
        width.saturating_add(height).min(i32::MAX as u32) as i32
    }
}

/// Per-entity sight memory: what is visible now, and what has ever been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityField {
    width: u32,
    height: u32,
    visible: Vec<bool>,
    discovered: Vec<bool>,
}

impl VisibilityField {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            visible: vec![false; len],
            discovered: vec![false; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_visible(&self, x: i32, y: i32) -> bool {
        self.index_of(x, y)
            .map(|index| self.visible[index])
            .unwrap_or(false)
    }

    pub fn is_discovered(&self, x: i32, y: i32) -> bool {
        self.index_of(x, y)
            .map(|index| self.discovered[index])
            .unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|cell| **cell).count()
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.iter().filter(|cell| **cell).count()
    }

    /// Replaces the visible set with `mask`. Newly seen cells become
    /// discovered; cells that drop out keep their discovered flag.
    pub fn apply(&mut self, mask: &FovMask) {
        if mask.width != self.width || mask.height != self.height {
            self.resize(mask.width, mask.height);
        }
        for (index, seen) in mask.cells.iter().copied().enumerate() {
            self.visible[index] = seen;
            if seen {
                self.discovered[index] = true;
            }
        }
    }

    pub fn compute<G: CellGrid + ?Sized>(
        &mut self,
        cells: &G,
        origin: CellCoord,
        settings: FovSettings,
    ) {
        let mask = compute_fov_mask(cells, origin, settings);
        self.apply(&mask);
    }

    /// Keeps memory for cells that still exist; new cells start unseen.
    pub fn resize(&mut self, width: u32, height: u32) {
        let mut resized = VisibilityField::new(width, height);
        for y in 0..self.height.min(height) {
            for x in 0..self.width.min(width) {
                let from = y as usize * self.width as usize + x as usize;
                let to = y as usize * width as usize + x as usize;
                resized.visible[to] = self.visible[from];
                resized.discovered[to] = self.discovered[from];
            }
        }
        *self = resized;
    }

    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::test_support::FlatCells;
    use crate::cells::CellRecord;

    fn walled_room() -> FlatCells {
        let mut cells = FlatCells::open(21, 11);
        for y in 0..11 {
            cells.set(10, y, CellRecord::WALL);
        }
        cells
    }

    fn both_algorithms() -> [FovAlgorithm; 2] {
        [FovAlgorithm::Shadowcast, FovAlgorithm::Raycast]
    }

    #[test]
    fn open_field_is_bounded_by_radius() {
        let cells = FlatCells::open(31, 31);
        for algorithm in both_algorithms() {
            let settings = FovSettings {
                radius: 5,
                algorithm,
                ..FovSettings::default()
            };
            let mask = compute_fov_mask(&cells, CellCoord::new(15, 15), settings);
            assert!(mask.is_visible(15, 15));
            assert!(mask.is_visible(20, 15), "{algorithm:?}");
            assert!(mask.is_visible(15, 10), "{algorithm:?}");
            assert!(mask.is_visible(18, 19), "{algorithm:?}");
            assert!(!mask.is_visible(21, 15), "{algorithm:?}");
            assert!(!mask.is_visible(19, 19), "{algorithm:?}");
        }
    }

    #[test]
    fn walls_stop_sight() {
        let cells = walled_room();
        for algorithm in both_algorithms() {
            let settings = FovSettings {
                algorithm,
                ..FovSettings::default()
            };
            let mask = compute_fov_mask(&cells, CellCoord::new(3, 5), settings);
            assert!(mask.is_visible(10, 5), "{algorithm:?} lights the wall");
            assert!(mask.visible_cells().all(|cell| cell.x <= 10), "{algorithm:?}");
        }
    }

    #[test]
    fn unlit_walls_stay_dark() {
        let cells = walled_room();
        for algorithm in both_algorithms() {
            let settings = FovSettings {
                light_walls: false,
                algorithm,
                ..FovSettings::default()
            };
            let mask = compute_fov_mask(&cells, CellCoord::new(3, 5), settings);
            assert!(!mask.is_visible(10, 5), "{algorithm:?}");
            assert!(mask.is_visible(9, 5), "{algorithm:?}");
        }
    }

    #[test]
    fn origin_outside_grid_sees_nothing() {
        let cells = FlatCells::open(5, 5);
        let mut field = VisibilityField::new(5, 5);
        field.compute(&cells, CellCoord::new(2, 2), FovSettings::default());
        assert!(field.visible_count() > 0);

        field.compute(&cells, CellCoord::new(-1, 2), FovSettings::default());
        assert_eq!(field.visible_count(), 0);
        assert_eq!(field.discovered_count(), 25);
    }

    #[test]
    fn origin_inside_a_wall_still_sees_itself() {
        let mut cells = FlatCells::open(5, 5);
        cells.set(2, 2, CellRecord::WALL);
        let mask = compute_fov_mask(&cells, CellCoord::new(2, 2), FovSettings::default());
        assert!(mask.is_visible(2, 2));
    }

    #[test]
    fn discovered_survives_moving_away() {
        let cells = walled_room();
        let mut field = VisibilityField::new(21, 11);
        let settings = FovSettings::with_radius(3);
        field.compute(&cells, CellCoord::new(2, 5), settings);
        assert!(field.is_visible(0, 5));

        field.compute(&cells, CellCoord::new(8, 5), settings);
        assert!(!field.is_visible(0, 5));
        assert!(field.is_discovered(0, 5));
        assert!(field.is_visible(8, 5));
    }

    #[test]
    fn recompute_without_changes_is_idempotent() {
        let cells = walled_room();
        let mut field = VisibilityField::new(21, 11);
        field.compute(&cells, CellCoord::new(4, 4), FovSettings::with_radius(6));
        let first = field.clone();
        field.compute(&cells, CellCoord::new(4, 4), FovSettings::with_radius(6));
        assert_eq!(field, first);
    }

    #[test]
    fn resize_keeps_overlapping_memory() {
        let cells = FlatCells::open(6, 6);
        let mut field = VisibilityField::new(6, 6);
        field.compute(&cells, CellCoord::new(1, 1), FovSettings::default());
        field.resize(3, 8);
        assert!(field.is_discovered(2, 2));
        assert!(!field.is_discovered(2, 7));
        assert!(!field.is_visible(5, 5));
    }
}
