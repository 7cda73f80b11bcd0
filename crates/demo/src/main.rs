mod config;
mod error;
mod scenario;
mod snapshot;

use std::env;

use tilegrid::{FrameBuffer, SpriteAtlasSet};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{config_path_from, DemoConfig, CONFIG_ENV_VAR};
use crate::error::DemoError;
use crate::scenario::Scenario;
use crate::snapshot::{frame_digest, GridSnapshot, OutputDir};

const FRAME_FILE_NAME: &str = "frame.png";
const SNAPSHOT_FILE_NAME: &str = "grid.json";

fn main() {
    init_tracing();
    info!("=== tilegrid demo ===");

    if let Err(err) = run() {
        error!(error = %err, "demo_failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let config_path = config_path_from(env::args_os(), env::var_os(CONFIG_ENV_VAR));
    let config = DemoConfig::load(config_path.as_deref())?;
    info!(
        config = ?config_path,
        width = config.width,
        height = config.height,
        steps = config.steps,
        "demo_config_loaded"
    );

    let mut sprites = SpriteAtlasSet::new();
    let mut scenario = Scenario::build(&config, &mut sprites)?;
    let mut frame = FrameBuffer::new(&sprites);
    let report = scenario.run(config.steps, &mut frame, &sprites)?;

    let raster = scenario.grid.raster_timings().summary();
    info!(
        route_len = report.route.len(),
        opening_x = scenario.opening.x,
        opening_y = scenario.opening.y,
        steps = report.steps_walked,
        frames = report.frames,
        visible_cells = report.visible_cells,
        discovered_cells = report.discovered_cells,
        bystanders = report.bystanders_near_monster,
        visible_chunks = report.last_stats.visible_chunks,
        entities_drawn = report.last_stats.entities_drawn,
        fog_cells = report.last_stats.fog_cells,
        rasterized_frames = raster.frames,
        raster_ms_per_chunk = raster.ms_per_chunk,
        raster_max_ms = raster.max_ms,
        "demo_scenario_finished"
    );

    let output = OutputDir::create(&config.output_dir)?;
    let image = frame.into_image();
    let frame_path = output.publish_png(FRAME_FILE_NAME, &image)?;
    info!(
        path = %frame_path.display(),
        sha256 = %frame_digest(&image),
        "frame_written"
    );

    let snapshot_path =
        output.publish_snapshot(SNAPSHOT_FILE_NAME, &GridSnapshot::capture(&scenario.grid))?;
    info!(path = %snapshot_path.display(), "grid_snapshot_written");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
