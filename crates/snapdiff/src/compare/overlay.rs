use super::buffer::PixelBuffer;

/// Number of blocks along the shorter side of the comparison region.
const GRID_DIVISIONS: u32 = 8;

/// Coarse grid of mismatch counters over the comparison region.
pub struct LowResGrid {
    scale: u32,
    cols: u32,
    rows: u32,
    cells: Vec<u32>,
}

impl LowResGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let scale = width.min(height).div_ceil(GRID_DIVISIONS).max(1);
        let cols = width.div_ceil(scale);
        let rows = height.div_ceil(scale);
        Self {
            scale,
            cols,
            rows,
            cells: vec![0; cols as usize * rows as usize],
        }
    }

    /// Side length of a block in pixels.
    #[cfg(test)]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Count a mismatch at comparison-region pixel `(x, y)`.
    pub fn mark(&mut self, x: u32, y: u32) {
        let i = self.index(x / self.scale, y / self.scale);
        self.cells[i] += 1;
    }

    pub fn count(&self, col: u32, row: u32) -> u32 {
        self.cells[self.index(col, row)]
    }

    /// Tint every pixel of the panel starting at column `panel_x` that lies in
    /// a flagged block, except pixels already equal to `highlight` and empty
    /// cells neither image covers.
    ///
    /// `width`/`height` bound the panel so edge blocks are clipped.
    pub fn apply(
        &self,
        canvas: &mut PixelBuffer,
        panel_x: u32,
        width: u32,
        height: u32,
        highlight: u32,
    ) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.count(col, row) == 0 {
                    continue;
                }
                let x0 = col * self.scale;
                let y0 = row * self.scale;
                let x1 = (x0 + self.scale).min(width);
                let y1 = (y0 + self.scale).min(height);
                for y in y0..y1 {
                    for x in x0..x1 {
                        let p = canvas.pixel(panel_x + x, y);
                        if p != highlight && p != 0 {
                            canvas.set_pixel(panel_x + x, y, glow(p, highlight));
                        }
                    }
                }
            }
        }
    }
}

/// Half-and-half blend of `p` with `highlight`, forced opaque.
pub fn glow(p: u32, highlight: u32) -> u32 {
    (((p >> 1) & 0x7F7F_7F7F) + ((highlight >> 1) & 0x7F7F_7F7F)) | 0xFF00_0000
}
