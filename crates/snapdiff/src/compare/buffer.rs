use image::RgbaImage;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pack four channels into a pixel word.
///
/// Words are little-endian over the pixel's bytes `[r, g, b, a]`:
/// `R` occupies bits 0..8, `G` 8..16, `B` 16..24 and `A` 24..32.
pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

/// Split a pixel word back into `[r, g, b, a]`.
pub const fn channels(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

/// Owned RGBA8 pixel buffer, row-major, 4 bytes per pixel.
///
/// Pixels can be accessed as bytes (`row`, `row_mut`) or as packed
/// words (`pixel`, `set_pixel`); both views go through the same `Vec<u8>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl PixelBuffer {
    /// Fully transparent buffer of `width x height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// Read the pixel at `(x, y)` as a packed word.
    ///
    /// Panics when `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        let i = self.offset(x, y);
        u32::from_le_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ])
    }

    /// Write a packed word at `(x, y)`.
    pub fn set_pixel(&mut self, x: u32, y: u32, word: u32) {
        let i = self.offset(x, y);
        self.bytes[i..i + BYTES_PER_PIXEL].copy_from_slice(&word.to_le_bytes());
    }

    /// Fill `len` pixels of row `y`, starting at column `x`, with `word`.
    pub fn fill_span(&mut self, x: u32, y: u32, len: u32, word: u32) {
        let start = self.offset(x, y);
        let end = start + len as usize * BYTES_PER_PIXEL;
        for px in self.bytes[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = self.offset(0, y);
        &self.bytes[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// Mutable bytes of row `y`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = self.offset(0, y);
        let len = self.width as usize * BYTES_PER_PIXEL;
        &mut self.bytes[start..start + len]
    }

    /// Hand the buffer to the `image` crate for encoding.
    pub fn into_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.bytes)
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            bytes: img.into_raw(),
        }
    }
}
