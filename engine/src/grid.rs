//! Grid extents and flat cell indexing.

use crate::options::Dimensions;

/// Width × height × depth of a grid; depth is 1 for images.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Cells along x
    pub width: u32,
    /// Cells along y
    pub height: u32,
    /// Cells along z
    pub depth: u32,
}

impl Extent {
    /// Extent with every axis at least one cell.
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width: width.max(1), height: height.max(1), depth: depth.max(1) }
    }

    /// Cube or square of side `resolution`.
    pub fn square(resolution: u32, dims: Dimensions) -> Self {
        match dims {
            Dimensions::Two => Self::new(resolution, resolution, 1),
            Dimensions::Three => Self::new(resolution, resolution, resolution),
        }
    }

    /// Total cell count.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Axes as an array `[x, y, z]`.
    pub fn axes(&self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }

    /// True for volumes.
    pub fn is_volume(&self) -> bool {
        self.depth > 1
    }

    /// Row-major flat index, x fastest.
    pub fn flat_index(&self, loc: [u32; 3]) -> usize {
        let [x, y, z] = loc.map(|v| v as usize);
        (z * self.height as usize + y) * self.width as usize + x
    }

    /// Inverse of [`Extent::flat_index`].
    pub fn location(&self, flat: usize) -> [u32; 3] {
        let w = self.width as usize;
        let h = self.height as usize;
        [(flat % w) as u32, ((flat / w) % h) as u32, (flat / (w * h)) as u32]
    }

    /// Every location in flat order.
    pub fn locations(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        (0..self.cells()).map(|flat| self.location(flat))
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_round_trips() {
        let e = Extent::new(5, 3, 4);
        for flat in 0..e.cells() {
            assert_eq!(e.flat_index(e.location(flat)), flat);
        }
        assert_eq!(e.flat_index([1, 2, 3]), 3 * 15 + 2 * 5 + 1);
    }

    #[test]
    fn square_extents() {
        assert_eq!(Extent::square(64, Dimensions::Two).cells(), 64 * 64);
        assert_eq!(Extent::square(64, Dimensions::Three).cells(), 64 * 64 * 64);
        assert_eq!(Extent::new(0, 0, 0).cells(), 1);
    }
}
