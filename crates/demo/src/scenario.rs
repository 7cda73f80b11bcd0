use image::{Rgba as Pixel, RgbaImage};
use tilegrid::{
    CellCoord, CellRecord, EntityId, EntitySpec, FovSettings, Grid, GridError, LayerId,
    RenderStats, RenderTarget, SpriteAtlas, SpriteAtlasSet, SpriteRef, SpriteSource, TextureId,
    Vec2, Viewport,
};
use tracing::{debug, info};

use crate::config::DemoConfig;
use crate::error::DemoError;

pub const SPRITE_SIZE: u32 = 16;
pub const FLOOR_SPRITE: u32 = 0;
pub const WALL_SPRITE: u32 = 1;
pub const PLAYER_SPRITE: u32 = 2;
pub const MONSTER_SPRITE: u32 = 3;
const SPRITE_COUNT: u32 = 4;
const PATH_COLOR: [u8; 4] = [80, 160, 255, 96];

/// A map split by one wall column with a single opening, a player on the
/// left and a monster on the right.
pub struct Scenario {
    pub grid: Grid,
    pub route: LayerId,
    pub player: EntityId,
    pub monster: EntityId,
    pub opening: CellCoord,
    pub fov: FovSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioReport {
    pub route: Vec<CellCoord>,
    pub steps_walked: u32,
    pub frames: u64,
    pub last_stats: RenderStats,
    pub visible_cells: usize,
    pub discovered_cells: usize,
    pub bystanders_near_monster: usize,
}

/// Four flat-shaded 16x16 sprites: floor, wall, player, monster.
pub fn build_sprite_sheet() -> RgbaImage {
    const FILLS: [[u8; 4]; SPRITE_COUNT as usize] = [
        [40, 40, 48, 255],
        [120, 110, 100, 255],
        [90, 220, 120, 255],
        [220, 70, 60, 255],
    ];
    RgbaImage::from_fn(SPRITE_SIZE * SPRITE_COUNT, SPRITE_SIZE, |x, y| {
        let sprite = (x / SPRITE_SIZE) as usize;
        let (local_x, local_y) = (x % SPRITE_SIZE, y % SPRITE_SIZE);
        let edge = local_x == 0 || local_y == 0;
        let mut color = FILLS[sprite];
        if edge {
            for channel in &mut color[..3] {
                *channel = channel.saturating_sub(24);
            }
        }
        Pixel(color)
    })
}

impl Scenario {
    /// Registers the demo sprites in `sprites` and lays out the map.
    pub fn build(config: &DemoConfig, sprites: &mut SpriteAtlasSet) -> Result<Self, DemoError> {
        config.validate()?;
        let atlas = SpriteAtlas::from_sheet(&build_sprite_sheet(), SPRITE_SIZE, SPRITE_SIZE)?;
        let texture = sprites.register(atlas);

        let (width, height) = (config.width, config.height);
        let mut grid = Grid::new(width, height, config.grid.clone())?;
        grid.fill_cells(CellRecord::OPEN);
        let terrain = grid.add_tile_layer(Some("terrain"), -1, Some(texture))?;
        grid.fill_tiles(terrain, Some(FLOOR_SPRITE))?;
        let route = grid.add_color_layer(Some("route"), 1)?;

        let wall_x = (width / 2) as i32;
        let opening = CellCoord::new(wall_x, (height * 9 / 10) as i32);
        for y in 0..height as i32 {
            if y == opening.y {
                continue;
            }
            grid.set_cell(wall_x, y, CellRecord::WALL)?;
            grid.set_tile(terrain, wall_x, y, Some(WALL_SPRITE))?;
        }

        let middle = (height / 2) as f32;
        let player = grid.spawn(
            EntitySpec::at((width / 8) as f32, middle).with_sprite(SpriteRef {
                texture,
                index: PLAYER_SPRITE,
            }),
        );
        let monster = grid.spawn(
            EntitySpec::at((width * 3 / 4) as f32, middle).with_sprite(SpriteRef {
                texture,
                index: MONSTER_SPRITE,
            }),
        );
        for offset in [-1.0f32, 1.0] {
            grid.spawn(EntitySpec::at(
                (width * 3 / 4) as f32 + offset,
                middle + offset,
            ));
        }

        grid.set_viewport(Viewport::new(config.viewport_width, config.viewport_height));
        grid.set_zoom(config.zoom)?;
        info!(
            width,
            height,
            wall_x,
            opening_y = opening.y,
            entities = grid.entity_count(),
            "scenario_built"
        );
        Ok(Self {
            grid,
            route,
            player,
            monster,
            opening,
            fov: FovSettings::with_radius(config.fov_radius),
        })
    }

    fn cell_of(&self, id: EntityId) -> Result<CellCoord, GridError> {
        self.grid
            .entity(id)
            .map(|entity| entity.cell())
            .ok_or(GridError::UnknownEntity(id))
    }

    /// Plans the player's route to the monster, paints it, then walks up to
    /// `steps` cells of it, rendering one perspective frame per step.
    pub fn run(
        &mut self,
        steps: u32,
        target: &mut dyn RenderTarget,
        sprites: &dyn SpriteSource,
    ) -> Result<ScenarioReport, DemoError> {
        let start = self.cell_of(self.player)?;
        let goal = self.cell_of(self.monster)?;
        let route = self.grid.path_to(start, goal)?;
        for cell in &route {
            self.grid.set_color(self.route, cell.x, cell.y, PATH_COLOR)?;
        }
        info!(
            from_x = start.x,
            from_y = start.y,
            to_x = goal.x,
            to_y = goal.y,
            length = route.len(),
            "route_planned"
        );

        self.grid.set_perspective(Some(self.player))?;
        self.grid.compute_fov(self.player, self.fov)?;
        self.grid.center_on_cell(start);
        let mut report = ScenarioReport {
            last_stats: self.grid.render(target, sprites),
            route,
            ..ScenarioReport::default()
        };

        // Stop short of the monster's own cell.
        let walkable = report.route.len().saturating_sub(1);
        for cell in report.route.iter().take(walkable.min(steps as usize)) {
            self.grid
                .move_entity(self.player, Vec2::new(cell.x as f32, cell.y as f32))?;
            self.grid.compute_fov(self.player, self.fov)?;
            self.grid.center_on_cell(*cell);
            report.last_stats = self.grid.render(target, sprites);
            report.steps_walked += 1;
            debug!(
                step = report.steps_walked,
                x = cell.x,
                y = cell.y,
                entities_drawn = report.last_stats.entities_drawn,
                "player_stepped"
            );
        }

        report.bystanders_near_monster = self
            .grid
            .entities_in_radius(Vec2::new(goal.x as f32, goal.y as f32), 2.0)
            .into_iter()
            .filter(|id| *id != self.monster)
            .count();
        if let Some(field) = self.grid.visibility(self.player) {
            report.visible_cells = field.visible_count();
            report.discovered_cells = field.discovered_count();
        }
        report.frames = self.grid.frames_rendered();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use tilegrid::{FrameBuffer, NoSprites};

    use super::*;

    fn small_config() -> DemoConfig {
        DemoConfig {
            viewport_width: 320,
            viewport_height: 200,
            steps: 4,
            ..DemoConfig::default()
        }
    }

    #[test]
    fn sprite_sheet_slices_into_four_sprites() {
        let sheet = build_sprite_sheet();
        let atlas = SpriteAtlas::from_sheet(&sheet, SPRITE_SIZE, SPRITE_SIZE).expect("atlas");
        assert_eq!(atlas.len(), SPRITE_COUNT as usize);
        let wall = atlas.get(WALL_SPRITE).expect("wall");
        assert_eq!(wall.get_pixel(5, 5).0, [120, 110, 100, 255]);
        assert_eq!(wall.get_pixel(0, 5).0, [96, 86, 76, 255]);
    }

    #[test]
    fn default_scenario_matches_the_walled_map() {
        let mut sprites = SpriteAtlasSet::new();
        let scenario = Scenario::build(&small_config(), &mut sprites).expect("scenario");
        assert!(sprites.get(TextureId(0)).is_some());
        let grid = &scenario.grid;
        let terrain = grid.get_layer("terrain").map(|layer| layer.id()).expect("terrain");
        assert_eq!((grid.width(), grid.height()), (80, 50));
        assert_eq!(scenario.opening, CellCoord::new(40, 45));
        assert!(grid.is_walkable(40, 45));
        assert!(!grid.is_walkable(40, 44));
        assert!(!grid.is_transparent(40, 0));
        assert_eq!(grid.layer_tile(terrain, 40, 3), Some(Some(WALL_SPRITE)));
        assert_eq!(grid.layer_tile(terrain, 3, 3), Some(Some(FLOOR_SPRITE)));
        assert_eq!(grid.entity_count(), 4);
        assert_eq!(
            grid.entity(scenario.player).map(|entity| entity.cell()),
            Some(CellCoord::new(10, 25))
        );
    }

    #[test]
    fn run_walks_toward_the_opening_and_renders_each_step() {
        let mut sprites = SpriteAtlasSet::new();
        let mut scenario = Scenario::build(&small_config(), &mut sprites).expect("scenario");
        let mut frame = FrameBuffer::new(&sprites);
        let report = scenario.run(4, &mut frame, &sprites).expect("run");

        assert!(report.route.contains(&CellCoord::new(40, 45)));
        assert_eq!(report.route.last(), Some(&CellCoord::new(60, 25)));
        assert_eq!(report.steps_walked, 4);
        assert_eq!(report.frames, 5);
        assert_eq!(
            scenario.grid.entity(scenario.player).map(|entity| entity.cell()),
            Some(report.route[3])
        );
        assert_eq!(report.bystanders_near_monster, 2);
        assert!(report.visible_cells > 0);
        assert!(report.discovered_cells >= report.visible_cells);
        assert_eq!(frame.image().dimensions(), (320, 200));
        assert_eq!(frame.presented_frames(), 5);
        assert!(!scenario.grid.is_in_fov(scenario.player, 60, 25));
    }

    #[test]
    fn route_cells_are_painted_on_the_route_layer() {
        let mut sprites = SpriteAtlasSet::new();
        let mut scenario = Scenario::build(&small_config(), &mut sprites).expect("scenario");
        let mut frame = FrameBuffer::new(&NoSprites);
        let report = scenario.run(0, &mut frame, &NoSprites).expect("run");
        assert_eq!(report.steps_walked, 0);
        for cell in &report.route {
            assert_eq!(
                scenario.grid.layer_color(scenario.route, cell.x, cell.y),
                Some(PATH_COLOR)
            );
        }
        assert_eq!(
            scenario.grid.layer_color(scenario.route, 10, 25),
            Some([0, 0, 0, 0])
        );
    }
}
