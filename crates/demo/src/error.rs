use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tilegrid::{AtlasError, GridError};

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json at {location}: {message}")]
    ParseConfig { location: String, message: String },
    #[error("invalid demo config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    #[error("write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode png: {0}")]
    EncodePng(#[from] image::ImageError),
    #[error("encode snapshot json: {0}")]
    EncodeJson(#[from] serde_json::Error),
}
