use super::*;
use crate::entity::DEFAULT_ENTITY_COLOR;
use crate::render::{DrawCommand, DrawList, FrameBuffer, NoSprites};

fn open_grid(width: u32, height: u32, config: GridConfig) -> Grid {
    let mut grid = Grid::new(width, height, config).expect("grid");
    grid.fill_cells(CellRecord::OPEN);
    grid
}

fn chunked(chunk_size: u32) -> GridConfig {
    GridConfig {
        chunk_size,
        flat_storage_max_cells: 0,
        ..GridConfig::default()
    }
}

/// Viewport showing the whole grid with screen pixels equal to grid pixels.
fn fit_camera(grid: &mut Grid) {
    let size = grid.cell_pixel_size();
    let (width, height) = (grid.width() * size, grid.height() * size);
    grid.set_viewport(Viewport::new(width, height));
    grid.set_camera_center(Vec2::new(width as f32 / 2.0, height as f32 / 2.0));
}

fn walled_80_by_50() -> Grid {
    let mut grid = open_grid(80, 50, GridConfig::default());
    for y in 0..50 {
        if y != 45 {
            grid.set_cell(40, y, CellRecord::WALL).expect("wall");
        }
    }
    grid
}

#[test]
fn fov_stops_at_the_wall_in_the_80_by_50_scenario() {
    let mut grid = walled_80_by_50();
    let viewer = grid.spawn(EntitySpec::at(30.0, 25.0));
    grid.compute_fov(viewer, FovSettings::with_radius(20)).expect("fov");

    let field = grid.visibility(viewer).expect("field allocated");
    assert!(field.is_visible(30, 25));
    assert!(field.is_visible(12, 25));
    assert!(field.is_visible(40, 25), "lit wall");
    for y in 0..50 {
        for x in 41..80 {
            assert!(!grid.is_in_fov(viewer, x, y), "({x}, {y}) seen through the wall");
        }
    }
}

#[test]
fn fov_from_the_player_start_never_crosses_the_wall() {
    let mut grid = walled_80_by_50();
    let viewer = grid.spawn(EntitySpec::at(10.0, 25.0));
    grid.compute_fov(viewer, FovSettings::with_radius(20)).expect("fov");

    let field = grid.visibility(viewer).expect("field allocated");
    assert!(field.is_visible(10, 25));
    assert!(field.is_visible(29, 25));
    assert!(field.is_visible(10, 6));
    assert!(!field.is_visible(40, 25), "wall lies past the radius");
    for y in 0..50 {
        for x in 41..80 {
            assert!(!grid.is_in_fov(viewer, x, y), "({x}, {y}) seen through the wall");
        }
    }
}

#[test]
fn cost_field_cache_holds_at_most_the_configured_roots() {
    let config = GridConfig {
        max_cost_fields: 2,
        ..GridConfig::default()
    };
    let mut grid = open_grid(6, 6, config);
    for x in 0..4 {
        grid.cost_field(CellCoord::new(x, 0)).expect("field");
    }
    assert_eq!(grid.cost_cache().len(), 2);
    assert_eq!(grid.cost_cache().capacity(), 2);
    assert!(grid.cost_cache().contains(CellCoord::new(3, 0)));
    assert!(!grid.cost_cache().contains(CellCoord::new(0, 0)));
}

#[test]
fn path_routes_around_the_wall_in_the_80_by_50_scenario() {
    let mut grid = walled_80_by_50();
    let path = grid
        .path_to(CellCoord::new(10, 25), CellCoord::new(60, 25))
        .expect("path");

    assert_eq!(path.last(), Some(&CellCoord::new(60, 25)));
    assert!(!path.contains(&CellCoord::new(10, 25)));
    assert!(path.iter().all(|cell| grid.is_walkable(cell.x, cell.y)));
    let crossings: Vec<&CellCoord> = path.iter().filter(|cell| cell.x == 40).collect();
    assert_eq!(crossings, vec![&CellCoord::new(40, 45)]);

    let astar = grid.find_path(CellCoord::new(10, 25), CellCoord::new(60, 25));
    assert!(astar.contains(&CellCoord::new(40, 45)));
}

#[test]
fn resize_from_10_by_10_to_5_by_5_keeps_overlap_and_clears_costs() {
    let mut grid = open_grid(10, 10, chunked(4));
    let floor = grid.add_color_layer(Some("floor"), -1).expect("layer");
    grid.set_cell(2, 3, CellRecord::WALL).expect("set");
    grid.set_cell(4, 4, CellRecord { walkable: true, transparent: false }).expect("set");
    grid.set_color(floor, 1, 1, [9, 8, 7, 255]).expect("color");
    grid.cost_field(CellCoord::new(0, 0)).expect("field");
    assert_eq!(grid.cost_cache().len(), 1);
    assert_eq!(grid.chunks().chunk_count(), 9);

    grid.resize(5, 5).expect("resize");

    assert_eq!((grid.width(), grid.height()), (5, 5));
    assert_eq!(grid.chunks().chunk_count(), 4);
    assert!(grid.cost_cache().is_empty());
    assert_eq!(grid.cell(2, 3), Some(CellRecord::WALL));
    assert_eq!(
        grid.cell(4, 4),
        Some(CellRecord { walkable: true, transparent: false })
    );
    assert_eq!(grid.cell(0, 0), Some(CellRecord::OPEN));
    assert_eq!(grid.cell(5, 0), None);
    assert_eq!(grid.layer_color(floor, 1, 1), Some([9, 8, 7, 255]));

    grid.resize(7, 7).expect("grow");
    assert_eq!(grid.cell(6, 6), Some(CellRecord::default()));
}

#[test]
fn invalid_dimensions_are_rejected_without_changes() {
    assert!(matches!(
        Grid::new(0, 4, GridConfig::default()),
        Err(GridError::InvalidDimensions { .. })
    ));
    let mut grid = open_grid(4, 4, GridConfig::default());
    assert!(grid.resize(4, MAX_GRID_DIMENSION + 1).is_err());
    assert_eq!((grid.width(), grid.height()), (4, 4));
}

#[test]
fn layer_set_dirties_only_the_owning_chunk() {
    let mut grid = open_grid(32, 32, chunked(8));
    let paint = grid.add_color_layer(Some("paint"), 0).expect("layer");
    fit_camera(&mut grid);
    let stats = grid.render(&mut DrawList::new(), &NoSprites);
    assert_eq!(stats.rasterized_chunks, 16);
    assert_eq!(grid.chunks().dirty_chunk_count(), 0);

    grid.set_color(paint, 9, 17, [255, 0, 0, 255]).expect("color");

    let owner = grid.chunks().chunk_index_of(9, 17).expect("owner");
    for (index, chunk) in grid.chunks().chunks().iter().enumerate() {
        assert_eq!(chunk.is_dirty(), index == owner, "chunk {:?}", chunk.chunk_coords());
    }
    assert_eq!(grid.chunks().chunk(1, 2).map(|chunk| chunk.is_dirty()), Some(true));

    let stats = grid.render(&mut DrawList::new(), &NoSprites);
    assert_eq!(stats.rasterized_chunks, 1);
}

#[test]
fn rewriting_the_same_value_keeps_chunks_clean() {
    let mut grid = open_grid(16, 16, chunked(8));
    let paint = grid.add_color_layer(None, 0).expect("layer");
    fit_camera(&mut grid);
    grid.render(&mut DrawList::new(), &NoSprites);

    grid.set_color(paint, 3, 3, [0, 0, 0, 0]).expect("color");
    assert_eq!(grid.chunks().dirty_chunk_count(), 0);
    assert!(!grid.needs_redraw());
}

#[test]
fn fill_and_texture_changes_dirty_every_chunk() {
    let mut grid = open_grid(16, 16, chunked(8));
    let paint = grid.add_color_layer(None, 0).expect("layer");
    let tiles = grid.add_tile_layer(None, 1, None).expect("layer");
    fit_camera(&mut grid);
    grid.render(&mut DrawList::new(), &NoSprites);

    grid.fill_color(paint, [1, 2, 3, 255]).expect("fill");
    assert_eq!(grid.chunks().dirty_chunk_count(), 4);
    grid.render(&mut DrawList::new(), &NoSprites);

    grid.set_layer_texture(tiles, Some(TextureId(3))).expect("texture");
    assert_eq!(grid.chunks().dirty_chunk_count(), 4);
}

#[test]
fn layer_setters_validate_inputs() {
    let mut grid = open_grid(4, 4, GridConfig::default());
    let paint = grid.add_color_layer(Some("paint"), 0).expect("layer");
    let tiles = grid.add_tile_layer(Some("tiles"), 0, None).expect("layer");

    assert!(matches!(
        grid.set_color(paint, 4, 0, [1; 4]),
        Err(GridError::OutOfBounds { x: 4, y: 0, .. })
    ));
    assert!(matches!(
        grid.set_color(tiles, 0, 0, [1; 4]),
        Err(GridError::LayerKindMismatch { .. })
    ));
    assert!(matches!(
        grid.set_tile(paint, 0, 0, Some(1)),
        Err(GridError::LayerKindMismatch { .. })
    ));
    assert!(matches!(
        grid.add_color_layer(Some("walkable"), 0),
        Err(GridError::ReservedLayerName(_))
    ));
    assert!(matches!(
        grid.add_color_layer(Some("paint"), 0),
        Err(GridError::DuplicateLayerName(_))
    ));

    grid.remove_layer(paint).expect("remove");
    assert!(matches!(
        grid.set_color(paint, 0, 0, [1; 4]),
        Err(GridError::UnknownLayer(_))
    ));
    assert!(grid.get_layer("paint").is_none());
    grid.rename_layer(tiles, Some("ground")).expect("rename");
    assert_eq!(grid.get_layer("ground").map(Layer::id), Some(tiles));

    grid.set_tile(tiles, 2, 2, Some(5)).expect("tile");
    assert_eq!(grid.layer_tile(tiles, 2, 2), Some(Some(5)));
    assert_eq!(grid.layer_tile(tiles, 1, 2), Some(None));
}

#[test]
fn walkability_change_rebuilds_cached_cost_fields() {
    let mut grid = open_grid(9, 3, GridConfig::default());
    let root = CellCoord::new(0, 1);
    let before = grid.cost_field(root).expect("field");
    assert_eq!(before.distance(8, 1), Some(8.0));
    let cached = grid.cost_field(root).expect("field");
    assert!(Arc::ptr_eq(&before, &cached));

    grid.set_walkable(4, 0, false).expect("wall");
    assert!(grid.cost_cache().is_empty());
    assert!(!grid.cost_cache().contains(root));
    for y in 1..3 {
        grid.set_walkable(4, y, false).expect("wall");
    }
    let after = grid.cost_field(root).expect("field");
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.distance(8, 1), None);
    assert!(grid.path_to(root, CellCoord::new(8, 1)).expect("path").is_empty());
    assert_eq!(grid.cost_cache().builds(), 2);
}

#[test]
fn transparency_changes_leave_cost_fields_alone() {
    let mut grid = open_grid(5, 5, GridConfig::default());
    let generation = grid.walkability_generation();
    grid.set_transparent(2, 2, false).expect("opaque");
    assert_eq!(grid.walkability_generation(), generation);

    grid.set_walkable(2, 2, false).expect("blocked");
    assert_ne!(grid.walkability_generation(), generation);
    assert!(grid.set_walkable(-1, 0, true).is_err());
    assert!(grid.cost_field(CellCoord::new(5, 0)).is_err());
}

#[test]
fn fov_is_idempotent_and_discovered_is_monotonic() {
    let mut grid = walled_80_by_50();
    let viewer = grid.spawn(EntitySpec::at(38.0, 20.0));
    let settings = FovSettings::with_radius(8);

    grid.compute_fov(viewer, settings).expect("fov");
    let first = grid.visibility(viewer).cloned().expect("field");
    grid.compute_fov(viewer, settings).expect("fov");
    assert_eq!(grid.visibility(viewer), Some(&first));

    grid.move_entity(viewer, Vec2::new(5.0, 5.0)).expect("move");
    grid.compute_fov(viewer, settings).expect("fov");
    let after = grid.visibility(viewer).expect("field");
    for y in 0..50 {
        for x in 0..80 {
            if first.is_discovered(x, y) {
                assert!(after.is_discovered(x, y), "({x}, {y}) forgotten");
            }
        }
    }
    assert!(!after.is_visible(38, 20));
    assert!(after.is_discovered(38, 20));
}

#[test]
fn fov_for_an_entity_off_the_grid_sees_nothing() {
    let mut grid = open_grid(6, 6, GridConfig::default());
    let lost = grid.spawn(EntitySpec::at(-2.0, 3.0));
    grid.compute_fov(lost, FovSettings::default()).expect("fov");
    assert_eq!(grid.visibility(lost).map(VisibilityField::visible_count), Some(0));

    let mask = grid.compute_fov_mask(CellCoord::new(3, 3), FovSettings::default());
    assert_eq!(mask.visible_count(), 36);
    assert_eq!(grid.visibility(lost).map(VisibilityField::discovered_count), Some(0));
}

#[test]
fn flat_and_chunked_grids_answer_identically() {
    let build = |config: GridConfig| {
        let mut grid = open_grid(20, 12, config);
        for y in 0..10 {
            grid.set_cell(7, y, CellRecord::WALL).expect("wall");
        }
        grid.set_cell(12, 5, CellRecord { walkable: false, transparent: true }).expect("set");
        grid
    };
    let mut flat = build(GridConfig::default());
    let mut chunked_grid = build(chunked(4));
    assert_eq!(flat.chunks().chunk_count(), 1);
    assert_eq!(chunked_grid.chunks().chunk_count(), 15);

    for y in 0..12 {
        for x in 0..20 {
            assert_eq!(flat.cell(x, y), chunked_grid.cell(x, y));
        }
    }
    let origin = CellCoord::new(2, 2);
    assert_eq!(
        flat.compute_fov_mask(origin, FovSettings::default()),
        chunked_grid.compute_fov_mask(origin, FovSettings::default())
    );
    assert_eq!(
        flat.path_to(origin, CellCoord::new(18, 2)).expect("path"),
        chunked_grid.path_to(origin, CellCoord::new(18, 2)).expect("path")
    );
}

#[test]
fn spatial_queries_follow_moves_and_despawns() {
    let mut grid = open_grid(64, 64, GridConfig::default());
    let a = grid.spawn(EntitySpec::at(10.0, 10.0));
    let b = grid.spawn(EntitySpec::at(12.0, 10.0));
    let far = grid.spawn(EntitySpec::at(60.0, 60.0));

    let mut near = grid.entities_in_radius(Vec2::new(10.0, 10.0), 2.0);
    near.sort();
    assert_eq!(near, vec![a, b]);

    grid.move_entity(far, Vec2::new(10.5, 10.5)).expect("move");
    assert!(grid.entities_in_radius(Vec2::new(10.0, 10.0), 1.0).contains(&far));
    assert_eq!(grid.spatial_hash().total_count(), 3);

    grid.despawn(b).expect("despawn");
    assert!(!grid.entities_in_radius(Vec2::new(12.0, 10.0), 0.5).contains(&b));
    assert!(matches!(grid.despawn(b), Err(GridError::UnknownEntity(_))));
    assert!(matches!(
        grid.move_entity(b, Vec2::default()),
        Err(GridError::UnknownEntity(_))
    ));
    assert_eq!(grid.entity_count(), 2);
}

#[test]
fn composite_order_is_base_then_below_then_entities_then_above() {
    let mut grid = open_grid(4, 4, GridConfig::default());
    let floor = grid.add_color_layer(Some("floor"), -1).expect("layer");
    let roof = grid.add_color_layer(Some("roof"), 2).expect("layer");
    let deep = grid.add_color_layer(Some("deep"), -5).expect("layer");
    let hidden = grid.add_color_layer(Some("hidden"), 1).expect("layer");
    grid.set_layer_visible(hidden, false).expect("hide");
    grid.spawn(EntitySpec::at(1.0, 1.0));
    fit_camera(&mut grid);

    let mut list = DrawList::new();
    let stats = grid.render(&mut list, &NoSprites);
    let order: Vec<&str> = list
        .commands()
        .iter()
        .map(|command| match command {
            DrawCommand::Clear { .. } => "clear",
            DrawCommand::Blit { source, .. } => match source.layer {
                None => "base",
                Some(id) if id == deep => "deep",
                Some(id) if id == floor => "floor",
                Some(id) if id == roof => "roof",
                Some(_) => "other",
            },
            DrawCommand::Sprite { .. } | DrawCommand::Fill { .. } => "entity",
        })
        .collect();
    assert_eq!(order, vec!["clear", "base", "deep", "floor", "entity", "roof"]);
    assert_eq!(stats.layers_composited, 3);
    assert_eq!(stats.entities_drawn, 1);
    assert_eq!(list.presented_frames(), 1);

    grid.set_layer_z_index(roof, -10).expect("z");
    assert!(grid.needs_redraw());
    let stats = grid.render(&mut list, &NoSprites);
    assert_eq!(stats.rasterized_chunks, 0);
    let layers: Vec<Option<LayerId>> = list.blits().map(|(source, _, _)| source.layer).collect();
    assert_eq!(layers, vec![None, Some(roof), Some(deep), Some(floor)]);
}

#[test]
fn needs_redraw_tracks_content_and_composite_changes() {
    let mut grid = open_grid(8, 8, chunked(4));
    let paint = grid.add_color_layer(None, 0).expect("layer");
    let mover = grid.spawn(EntitySpec::at(1.0, 1.0));
    fit_camera(&mut grid);
    assert!(grid.needs_redraw());

    grid.render(&mut DrawList::new(), &NoSprites);
    assert!(!grid.needs_redraw());

    grid.move_entity(mover, Vec2::new(2.0, 1.0)).expect("move");
    assert!(grid.needs_redraw());
    grid.render(&mut DrawList::new(), &NoSprites);

    grid.set_color(paint, 7, 7, [5, 5, 5, 255]).expect("color");
    assert!(grid.needs_redraw());
    grid.render(&mut DrawList::new(), &NoSprites);

    grid.set_zoom(2.0).expect("zoom");
    assert!(grid.needs_redraw());
    assert!(grid.set_zoom(0.0).is_err());
    assert_eq!(grid.camera().zoom(), 2.0);
}

#[test]
fn framebuffer_shows_layers_at_their_cells() {
    let config = GridConfig {
        cell_pixel_size: 4,
        ..GridConfig::default()
    };
    let mut grid = open_grid(6, 6, config);
    let paint = grid.add_color_layer(Some("paint"), -1).expect("layer");
    grid.set_color(paint, 2, 3, [200, 10, 10, 255]).expect("color");
    grid.spawn(EntitySpec::at(4.0, 4.0));
    fit_camera(&mut grid);

    let mut frame = FrameBuffer::new(&NoSprites);
    grid.render(&mut frame, &NoSprites);
    assert_eq!(frame.image().dimensions(), (24, 24));
    assert_eq!(frame.pixel(9, 13), Some([200, 10, 10, 255]));
    assert_eq!(frame.pixel(1, 1), Some(grid.config().background));
    assert_eq!(frame.pixel(17, 17), Some(DEFAULT_ENTITY_COLOR));
    assert_eq!(
        grid.screen_to_cell(9, 13),
        CellCoord::new(2, 3)
    );
    assert_eq!(grid.cell_to_screen(CellCoord::new(2, 3)), PixelRect::new(8, 12, 12, 16));
}

#[test]
fn perspective_fogs_unseen_cells_and_hides_unseen_entities() {
    let config = GridConfig {
        cell_pixel_size: 4,
        ..GridConfig::default()
    };
    let mut grid = open_grid(12, 4, config);
    for y in 0..4 {
        grid.set_cell(8, y, CellRecord::WALL).expect("wall");
    }
    let viewer = grid.spawn(EntitySpec::at(1.0, 1.0));
    grid.spawn(EntitySpec::at(10.0, 1.0));
    grid.compute_fov(viewer, FovSettings::with_radius(2)).expect("fov");
    grid.move_entity(viewer, Vec2::new(5.0, 1.0)).expect("move");
    grid.compute_fov(viewer, FovSettings::with_radius(2)).expect("fov");
    grid.set_perspective(Some(viewer)).expect("perspective");
    fit_camera(&mut grid);

    let mut frame = FrameBuffer::new(&NoSprites);
    let stats = grid.render(&mut frame, &NoSprites);
    let background = grid.config().background;

    assert_eq!(stats.entities_drawn, 1);
    assert!(stats.fog_cells > 0);
    assert_eq!(frame.pixel(41, 5), Some(grid.config().fog_unknown));
    assert_eq!(frame.pixel(13, 5), Some(background));
    let remembered = frame.pixel(5, 5).expect("pixel");
    assert_ne!(remembered, background);
    assert_ne!(remembered, grid.config().fog_unknown);
    assert_eq!(remembered[3], 255);
    assert_eq!(frame.pixel(21, 5), Some(DEFAULT_ENTITY_COLOR));

    grid.set_perspective(None).expect("perspective");
    let stats = grid.render(&mut frame, &NoSprites);
    assert_eq!(stats.entities_drawn, 2);
    assert_eq!(stats.fog_cells, 0);
    assert_eq!(frame.pixel(41, 5), Some(DEFAULT_ENTITY_COLOR));
}

#[test]
fn despawning_the_perspective_entity_clears_perspective() {
    let mut grid = open_grid(4, 4, GridConfig::default());
    let viewer = grid.spawn(EntitySpec::at(1.0, 1.0));
    grid.set_perspective(Some(viewer)).expect("perspective");
    grid.despawn(viewer).expect("despawn");
    assert_eq!(grid.perspective(), None);
    assert!(matches!(
        grid.set_perspective(Some(viewer)),
        Err(GridError::UnknownEntity(_))
    ));
}

#[test]
fn offscreen_chunks_are_neither_rasterized_nor_blitted() {
    let mut grid = open_grid(64, 64, chunked(16));
    grid.set_viewport(Viewport::new(64, 64));
    grid.center_on_cell(CellCoord::new(2, 2));

    let mut list = DrawList::new();
    let stats = grid.render(&mut list, &NoSprites);
    assert_eq!(stats.visible_chunks, 1);
    assert_eq!(stats.rasterized_chunks, 1);
    assert_eq!(grid.chunks().dirty_chunk_count(), 15);
    assert_eq!(list.blits().count(), 1);
    assert_eq!(grid.raster_timings().frames_recorded(), 1);
}

#[test]
fn render_holds_the_frame_lock_reentrantly() {
    let mut grid = open_grid(4, 4, GridConfig::default());
    fit_camera(&mut grid);
    let lock = grid.frame_lock();
    let guard = lock.acquire();
    grid.render(&mut DrawList::new(), &NoSprites);
    assert!(lock.is_held_by_current_thread());
    drop(guard);
    assert!(!lock.is_held());
    assert_eq!(grid.frames_rendered(), 1);
}
