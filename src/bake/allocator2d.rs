//! Bitset rasters for lightmap chart placement.
//!
//! [`Allocator2D`] is the atlas: one bit per texel, rows padded to whole
//! `u64` words. A chart is described by a [`Footprint`], its own small bitset
//! of covered texels. Placement tests shift footprint rows into atlas words,
//! so a test costs one AND per overlapped word rather than one per texel.

const WORD_BITS: u32 = 64;

fn words_for(width: u32) -> usize {
    width.div_ceil(WORD_BITS) as usize
}

/// Covered texels of one chart at a fixed orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footprint {
    width: u32,
    height: u32,
    pitch: usize,
    bits: Vec<u64>,
}

impl Footprint {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let pitch = words_for(width.max(1));
        Self { width, height, pitch, bits: vec![0; pitch * height as usize] }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let word = y as usize * self.pitch + (x / WORD_BITS) as usize;
            self.bits[word] |= 1u64 << (x % WORD_BITS);
        }
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let word = y as usize * self.pitch + (x / WORD_BITS) as usize;
        self.bits[word] & (1u64 << (x % WORD_BITS)) != 0
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn row(&self, y: u32) -> &[u64] {
        let start = y as usize * self.pitch;
        &self.bits[start..start + self.pitch]
    }

    /// Grows the footprint by `padding` texels on every side and marks every
    /// texel within `padding` (chessboard distance) of a covered one.
    #[must_use]
    pub fn dilated(&self, padding: u32) -> Self {
        if padding == 0 {
            return self.clone();
        }
        let mut out = Self::new(self.width + 2 * padding, self.height + 2 * padding);
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                for dy in 0..=2 * padding {
                    for dx in 0..=2 * padding {
                        out.set(x + dx, y + dy);
                    }
                }
            }
        }
        out
    }

    /// Footprint rotated by `quarter_turns * 90°` counter-clockwise.
    #[must_use]
    pub fn rotated(&self, quarter_turns: u8) -> Self {
        let turns = quarter_turns % 4;
        let (w, h) = (self.width, self.height);
        let mut out = if turns % 2 == 0 { Self::new(w, h) } else { Self::new(h, w) };
        for y in 0..h {
            for x in 0..w {
                if !self.get(x, y) {
                    continue;
                }
                let (nx, ny) = match turns {
                    0 => (x, y),
                    1 => (h - 1 - y, x),
                    2 => (w - 1 - x, h - 1 - y),
                    _ => (y, w - 1 - x),
                };
                out.set(nx, ny);
            }
        }
        out
    }
}

/// Atlas occupancy grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocator2D {
    width: u32,
    height: u32,
    pitch: usize,
    bits: Vec<u64>,
}

impl Allocator2D {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let pitch = words_for(width.max(1));
        Self { width, height, pitch, bits: vec![0; pitch * height as usize] }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    #[must_use]
    pub fn used_texels(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.pitch + (x / WORD_BITS) as usize] & (1u64 << (x % WORD_BITS)) != 0
    }

    /// Calls `f(atlas_word_index, shifted_bits)` for every non-empty piece of
    /// the footprint placed at `(x, y)`.
    fn for_each_word(&self, footprint: &Footprint, x: u32, y: u32, mut f: impl FnMut(usize, u64) -> bool) -> bool {
        let shift = x % WORD_BITS;
        let base_word = (x / WORD_BITS) as usize;
        for fy in 0..footprint.height {
            let row_start = (y + fy) as usize * self.pitch;
            for (k, &word) in footprint.row(fy).iter().enumerate() {
                if word == 0 {
                    continue;
                }
                let lo = word << shift;
                let dest = row_start + base_word + k;
                if lo != 0 && !f(dest, lo) {
                    return false;
                }
                if shift > 0 {
                    let hi = word >> (WORD_BITS - shift);
                    if hi != 0 && !f(dest + 1, hi) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn fits_bounds(&self, footprint: &Footprint, x: u32, y: u32) -> bool {
        x.checked_add(footprint.width).is_some_and(|r| r <= self.width)
            && y.checked_add(footprint.height).is_some_and(|b| b <= self.height)
    }

    /// `true` when the footprint at `(x, y)` lies inside the atlas and
    /// touches no occupied texel.
    #[must_use]
    pub fn test(&self, footprint: &Footprint, x: u32, y: u32) -> bool {
        self.fits_bounds(footprint, x, y)
            && self.for_each_word(footprint, x, y, |dest, bits| self.bits[dest] & bits == 0)
    }

    /// Marks the footprint texels as occupied. Does not test first.
    pub fn add(&mut self, footprint: &Footprint, x: u32, y: u32) {
        if !self.fits_bounds(footprint, x, y) {
            return;
        }
        let mut writes = Vec::new();
        self.for_each_word(footprint, x, y, |dest, bits| {
            writes.push((dest, bits));
            true
        });
        for (dest, bits) in writes {
            self.bits[dest] |= bits;
        }
    }

    pub fn remove(&mut self, footprint: &Footprint, x: u32, y: u32) {
        if !self.fits_bounds(footprint, x, y) {
            return;
        }
        let mut writes = Vec::new();
        self.for_each_word(footprint, x, y, |dest, bits| {
            writes.push((dest, bits));
            true
        });
        for (dest, bits) in writes {
            self.bits[dest] &= !bits;
        }
    }

    /// First free position in row-major order.
    #[must_use]
    pub fn find_position(&self, footprint: &Footprint) -> Option<(u32, u32)> {
        if footprint.width > self.width || footprint.height > self.height {
            return None;
        }
        for y in 0..=self.height - footprint.height {
            for x in 0..=self.width - footprint.width {
                if self.test(footprint, x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> Footprint {
        let mut f = Footprint::new(w, h);
        for y in 0..h {
            for x in 0..w {
                f.set(x, y);
            }
        }
        f
    }

    #[test]
    fn add_then_test_rejects_overlap() {
        let mut atlas = Allocator2D::new(100, 10);
        let block = solid(5, 5);
        assert!(atlas.test(&block, 62, 0));
        atlas.add(&block, 62, 0);
        assert_eq!(atlas.used_texels(), 25);
        assert!(atlas.is_set(64, 2));
        assert!(!atlas.test(&block, 60, 2));
        assert!(atlas.test(&block, 67, 0));
        atlas.remove(&block, 62, 0);
        assert_eq!(atlas.used_texels(), 0);
    }

    #[test]
    fn find_position_packs_row_major() {
        let mut atlas = Allocator2D::new(8, 8);
        let block = solid(4, 4);
        let mut placed = Vec::new();
        while let Some((x, y)) = atlas.find_position(&block) {
            atlas.add(&block, x, y);
            placed.push((x, y));
        }
        assert_eq!(placed, vec![(0, 0), (4, 0), (0, 4), (4, 4)]);
        assert!(atlas.find_position(&solid(1, 1)).is_none());
        atlas.clear();
        assert_eq!(atlas.used_texels(), 0);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let atlas = Allocator2D::new(4, 4);
        assert!(!atlas.test(&solid(2, 2), 3, 0));
        assert!(atlas.find_position(&solid(5, 1)).is_none());
    }

    #[test]
    fn rotation_and_dilation() {
        let mut l = Footprint::new(3, 2);
        l.set(0, 0);
        l.set(0, 1);
        l.set(1, 1);
        l.set(2, 1);
        let r = l.rotated(1);
        assert_eq!((r.width(), r.height()), (2, 3));
        assert_eq!(r.count(), 4);
        assert_eq!(l.rotated(4), l);
        let d = solid(1, 1).dilated(1);
        assert_eq!((d.width(), d.height(), d.count()), (3, 3, 9));
    }
}
