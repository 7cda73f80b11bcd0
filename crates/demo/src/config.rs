use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tilegrid::{GridConfig, MAX_GRID_DIMENSION};

use crate::error::DemoError;

pub const CONFIG_ENV_VAR: &str = "TILEGRID_DEMO_CONFIG";
const MIN_WIDTH: u32 = 8;
const MIN_HEIGHT: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub width: u32,
    pub height: u32,
    pub grid: GridConfig,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub zoom: f32,
    /// `<= 0` lets the player see across the whole map.
    pub fov_radius: i32,
    /// Player steps walked (one rendered frame each) before the snapshot.
    pub steps: u32,
    pub output_dir: PathBuf,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 50,
            grid: GridConfig::default(),
            viewport_width: 640,
            viewport_height: 400,
            zoom: 0.5,
            fov_radius: 12,
            steps: 8,
            output_dir: PathBuf::from("demo_output"),
        }
    }
}

impl DemoConfig {
    /// Loads `path`, or the defaults when no path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, DemoError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| DemoError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        parse_demo_config(&raw)
    }

    pub fn validate(&self) -> Result<(), DemoError> {
        if self.width < MIN_WIDTH || self.width > MAX_GRID_DIMENSION {
            return Err(DemoError::InvalidConfig {
                field: "width",
                reason: format!("must be within {MIN_WIDTH}..={MAX_GRID_DIMENSION}, got {}", self.width),
            });
        }
        if self.height < MIN_HEIGHT || self.height > MAX_GRID_DIMENSION {
            return Err(DemoError::InvalidConfig {
                field: "height",
                reason: format!("must be within {MIN_HEIGHT}..={MAX_GRID_DIMENSION}, got {}", self.height),
            });
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(DemoError::InvalidConfig {
                field: "viewport_width",
                reason: format!(
                    "viewport must be non-empty, got {}x{}",
                    self.viewport_width, self.viewport_height
                ),
            });
        }
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(DemoError::InvalidConfig {
                field: "zoom",
                reason: format!("must be finite and positive, got {}", self.zoom),
            });
        }
        self.grid
            .validate()
            .map_err(|error| DemoError::InvalidConfig {
                field: "grid",
                reason: error.to_string(),
            })
    }
}

pub fn parse_demo_config(raw: &str) -> Result<DemoConfig, DemoError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config: DemoConfig = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let location = error.path().to_string();
        DemoError::ParseConfig {
            location,
            message: error.into_inner().to_string(),
        }
    })?;
    config.validate()?;
    Ok(config)
}

/// First non-empty of the CLI argument and the environment variable.
pub fn config_path_from(
    args: impl IntoIterator<Item = OsString>,
    env_value: Option<OsString>,
) -> Option<PathBuf> {
    let non_empty = |raw: &OsString| !raw.is_empty();
    args.into_iter()
        .nth(1)
        .filter(non_empty)
        .or_else(|| env_value.filter(non_empty))
        .map(PathBuf::from)
}
