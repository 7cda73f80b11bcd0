use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tilegrid::{Grid, LayerKind, Rgba};

use crate::error::DemoError;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Plain-data capture of a grid: one character per cell plus every layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub snapshot_version: u32,
    pub width: u32,
    pub height: u32,
    /// Rows top to bottom. `.` open, `#` wall, `+` walkable but opaque,
    /// `~` see-through but blocked.
    pub cells: Vec<String>,
    pub layers: Vec<LayerSnapshot>,
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub name: Option<String>,
    pub z_index: i32,
    pub visible: bool,
    pub contents: LayerContents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum LayerContents {
    Color(Vec<Rgba>),
    Tile(Vec<Option<u32>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub index: u32,
    pub generation: u32,
    pub x: f32,
    pub y: f32,
    pub visible: bool,
}

impl GridSnapshot {
    pub fn capture(grid: &Grid) -> Self {
        let (width, height) = (grid.width() as i32, grid.height() as i32);
        let cells = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| match grid.cell(x, y) {
                        Some(cell) => match (cell.walkable, cell.transparent) {
                            (true, true) => '.',
                            (true, false) => '+',
                            (false, true) => '~',
                            (false, false) => '#',
                        },
                        None => ' ',
                    })
                    .collect::<String>()
            })
            .collect();

        let layers = grid
            .layers()
            .iter()
            .map(|layer| {
                let id = layer.id();
                let row_major = (0..height).flat_map(|y| (0..width).map(move |x| (x, y)));
                let contents = match layer.kind() {
                    LayerKind::Color => LayerContents::Color(
                        row_major
                            .map(|(x, y)| grid.layer_color(id, x, y).unwrap_or_default())
                            .collect(),
                    ),
                    LayerKind::Tile => LayerContents::Tile(
                        row_major
                            .map(|(x, y)| grid.layer_tile(id, x, y).flatten())
                            .collect(),
                    ),
                };
                LayerSnapshot {
                    name: layer.name().map(str::to_string),
                    z_index: layer.z_index(),
                    visible: layer.is_visible(),
                    contents,
                }
            })
            .collect();

        let entities = grid
            .entities()
            .map(|entity| EntitySnapshot {
                index: entity.id().index,
                generation: entity.id().generation,
                x: entity.position().x,
                y: entity.position().y,
                visible: entity.is_visible(),
            })
            .collect();

        Self {
            snapshot_version: SNAPSHOT_VERSION,
            width: grid.width(),
            height: grid.height(),
            cells,
            layers,
            entities,
        }
    }

    pub fn to_json(&self) -> Result<String, DemoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Lowercase hex SHA-256 over the frame size and its raw RGBA bytes.
pub fn frame_digest(image: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(image.as_raw());
    format!("{:x}", hasher.finalize())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, DemoError> {
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageFormat::Png)?;
    Ok(encoded.into_inner())
}

/// Directory the demo publishes its frame and snapshot into. Each file is
/// staged as `.<name>.partial` and renamed over the old one, so readers
/// never see a half-written frame.
#[derive(Debug)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn create(root: &Path) -> Result<Self, DemoError> {
        fs::create_dir_all(root).map_err(|source| DemoError::Write {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn staging_path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{name}.partial"))
    }

    /// Writes `bytes` as `name` and returns the published path.
    pub fn publish(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, DemoError> {
        let staged = self.staging_path_of(name);
        let published = self.path_of(name);
        let result = fs::write(&staged, bytes).and_then(|()| fs::rename(&staged, &published));
        if let Err(source) = result {
            let _ = fs::remove_file(&staged);
            return Err(DemoError::Write {
                path: published,
                source,
            });
        }
        Ok(published)
    }

    pub fn publish_png(&self, name: &str, image: &RgbaImage) -> Result<PathBuf, DemoError> {
        self.publish(name, &encode_png(image)?)
    }

    pub fn publish_snapshot(&self, name: &str, snapshot: &GridSnapshot) -> Result<PathBuf, DemoError> {
        self.publish(name, snapshot.to_json()?.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use tilegrid::{CellRecord, EntitySpec, GridConfig};

    use super::*;

    fn small_grid() -> Grid {
        let mut grid = Grid::new(3, 2, GridConfig::default()).expect("grid");
        grid.fill_cells(CellRecord::OPEN);
        grid.set_cell(1, 0, CellRecord::WALL).expect("wall");
        grid.set_transparent(2, 1, false).expect("opaque");
        let paint = grid.add_color_layer(Some("paint"), 0).expect("layer");
        grid.set_color(paint, 0, 1, [1, 2, 3, 4]).expect("color");
        let tiles = grid.add_tile_layer(None, -2, None).expect("layer");
        grid.set_tile(tiles, 2, 0, Some(7)).expect("tile");
        grid.spawn(EntitySpec::at(0.5, 1.5));
        grid
    }

    #[test]
    fn capture_reads_cells_layers_and_entities() {
        let snapshot = GridSnapshot::capture(&small_grid());
        assert_eq!(snapshot.cells, vec![".#.".to_string(), "..+".to_string()]);
        assert_eq!(snapshot.layers.len(), 2);

        let tiles = &snapshot.layers[0];
        assert_eq!(tiles.z_index, -2);
        assert_eq!(
            tiles.contents,
            LayerContents::Tile(vec![None, None, Some(7), None, None, None])
        );
        let paint = &snapshot.layers[1];
        assert_eq!(paint.name.as_deref(), Some("paint"));
        match &paint.contents {
            LayerContents::Color(values) => assert_eq!(values[3], [1, 2, 3, 4]),
            other => panic!("unexpected contents: {other:?}"),
        }
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!((snapshot.entities[0].x, snapshot.entities[0].y), (0.5, 1.5));
    }

    #[test]
    fn snapshot_json_survives_a_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = OutputDir::create(&dir.path().join("nested")).expect("output dir");
        let snapshot = GridSnapshot::capture(&small_grid());
        let path = output.publish_snapshot("grid.json", &snapshot).expect("write");
        assert_eq!(path, dir.path().join("nested").join("grid.json"));

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"kind\": \"tile\""));
        let reloaded: GridSnapshot = serde_json::from_str(&raw).expect("parse");
        assert_eq!(reloaded, snapshot);
        assert!(!output.staging_path_of("grid.json").exists());
    }

    #[test]
    fn publishing_again_replaces_the_previous_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = OutputDir::create(dir.path()).expect("output dir");
        output.publish("frame.png", b"first").expect("first write");
        let path = output.publish("frame.png", b"second").expect("second write");
        assert_eq!(fs::read(&path).expect("read"), b"second");
        assert_eq!(
            output.staging_path_of("frame.png"),
            dir.path().join(".frame.png.partial")
        );
        assert!(!output.staging_path_of("frame.png").exists());
    }

    #[test]
    fn failed_publish_reports_the_target_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = OutputDir::create(dir.path()).expect("output dir");
        fs::create_dir(dir.path().join("taken")).expect("blocking dir");
        fs::write(dir.path().join("taken").join("inner"), b"x").expect("inner");

        let error = output.publish("taken", b"bytes").expect_err("directory in the way");
        assert!(matches!(error, DemoError::Write { path, .. } if path == dir.path().join("taken")));
        assert!(!output.staging_path_of("taken").exists());
    }

    #[test]
    fn png_output_decodes_to_the_same_pixels() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = OutputDir::create(dir.path()).expect("output dir");
        let image = RgbaImage::from_fn(4, 3, |x, y| image::Rgba([x as u8 * 60, y as u8 * 80, 7, 255]));
        let path = output.publish_png("frame.png", &image).expect("png");

        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn digest_depends_on_size_and_pixels() {
        let a = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        let b = RgbaImage::from_pixel(4, 1, image::Rgba([1, 2, 3, 255]));
        let mut c = a.clone();
        c.put_pixel(1, 1, image::Rgba([1, 2, 4, 255]));

        let digest = frame_digest(&a);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, frame_digest(&a.clone()));
        assert_ne!(digest, frame_digest(&b));
        assert_ne!(digest, frame_digest(&c));
    }
}
