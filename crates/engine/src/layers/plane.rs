use crate::render::TextureId;

/// Full-grid, row-major array of per-cell layer values.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    width: u32,
    height: u32,
    values: Vec<T>,
}

impl<T: Copy + Default> Plane<T> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![T::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        self.index_of(x, y).map(|index| self.values[index])
    }

    /// Out-of-range reads assert in debug builds and return `T::default()` otherwise.
    pub fn at(&self, x: u32, y: u32) -> T {
        match self.get(x, y) {
            Some(value) => value,
            None => {
                debug_assert!(
                    false,
                    "layer cell ({x}, {y}) outside {}x{} plane",
                    self.width, self.height
                );
                T::default()
            }
        }
    }

    /// Returns `true` when the stored value changed.
    pub(crate) fn set(&mut self, x: u32, y: u32, value: T) -> bool
    where
        T: PartialEq,
    {
        let Some(index) = self.index_of(x, y) else {
            debug_assert!(
                false,
                "layer cell ({x}, {y}) outside {}x{} plane",
                self.width, self.height
            );
            return false;
        };
        if self.values[index] == value {
            return false;
        }
        self.values[index] = value;
        true
    }

    pub(crate) fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    pub(crate) fn resize(&mut self, new_width: u32, new_height: u32) {
        let mut resized = Plane::new(new_width, new_height);
        for y in 0..self.height.min(new_height) {
            for x in 0..self.width.min(new_width) {
                let from = y as usize * self.width as usize + x as usize;
                let to = y as usize * new_width as usize + x as usize;
                resized.values[to] = self.values[from];
            }
        }
        *self = resized;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileCells {
    sprites: Plane<Option<u32>>,
    texture: Option<TextureId>,
}

impl TileCells {
    pub fn new(width: u32, height: u32, texture: Option<TextureId>) -> Self {
        Self {
            sprites: Plane::new(width, height),
            texture,
        }
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub(crate) fn set_texture(&mut self, texture: Option<TextureId>) -> bool {
        if self.texture == texture {
            return false;
        }
        self.texture = texture;
        true
    }

    pub fn at(&self, x: u32, y: u32) -> Option<u32> {
        self.sprites.at(x, y)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Option<u32>> {
        self.sprites.get(x, y)
    }

    pub fn plane(&self) -> &Plane<Option<u32>> {
        &self.sprites
    }

    pub(crate) fn plane_mut(&mut self) -> &mut Plane<Option<u32>> {
        &mut self.sprites
    }
}
