use std::collections::HashMap;

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle to a host-owned texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteRef {
    pub texture: TextureId,
    pub index: u32,
}

/// Resolves sprite handles to already-decoded pixels.
pub trait SpriteSource {
    fn sprite(&self, texture: TextureId, index: u32) -> Option<&RgbaImage>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSprites;

impl SpriteSource for NoSprites {
    fn sprite(&self, _texture: TextureId, _index: u32) -> Option<&RgbaImage> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    #[error("sprite size must be non-zero, got {width}x{height}")]
    ZeroSpriteSize { width: u32, height: u32 },
    #[error(
        "sheet {sheet_width}x{sheet_height} is not a whole number of {sprite_width}x{sprite_height} sprites"
    )]
    SheetSizeMismatch {
        sheet_width: u32,
        sheet_height: u32,
        sprite_width: u32,
        sprite_height: u32,
    },
}

/// Equal-size sprites sliced row-major from one sheet.
#[derive(Debug, Clone)]
pub struct SpriteAtlas {
    sprite_width: u32,
    sprite_height: u32,
    sprites: Vec<RgbaImage>,
}

impl SpriteAtlas {
    pub fn from_sheet(
        sheet: &RgbaImage,
        sprite_width: u32,
        sprite_height: u32,
    ) -> Result<Self, AtlasError> {
        if sprite_width == 0 || sprite_height == 0 {
            return Err(AtlasError::ZeroSpriteSize {
                width: sprite_width,
                height: sprite_height,
            });
        }
        let (sheet_width, sheet_height) = sheet.dimensions();
        if sheet_width % sprite_width != 0 || sheet_height % sprite_height != 0 {
            return Err(AtlasError::SheetSizeMismatch {
                sheet_width,
                sheet_height,
                sprite_width,
                sprite_height,
            });
        }

        let columns = sheet_width / sprite_width;
        let rows = sheet_height / sprite_height;
        let mut sprites = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for column in 0..columns {
                let view = imageops::crop_imm(
                    sheet,
                    column * sprite_width,
                    row * sprite_height,
                    sprite_width,
                    sprite_height,
                );
                sprites.push(view.to_image());
            }
        }
        Ok(Self {
            sprite_width,
            sprite_height,
            sprites,
        })
    }

    pub fn sprite_size(&self) -> (u32, u32) {
        (self.sprite_width, self.sprite_height)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&RgbaImage> {
        self.sprites.get(index as usize)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpriteAtlasSet {
    atlases: HashMap<TextureId, SpriteAtlas>,
    next_id: u32,
}

impl SpriteAtlasSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, atlas: SpriteAtlas) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.atlases.insert(id, atlas);
        id
    }

    pub fn get(&self, texture: TextureId) -> Option<&SpriteAtlas> {
        self.atlases.get(&texture)
    }
}

impl SpriteSource for SpriteAtlasSet {
    fn sprite(&self, texture: TextureId, index: u32) -> Option<&RgbaImage> {
        self.atlases.get(&texture)?.get(index)
    }
}
