/// Axis-aligned detection rectangle in preprocessed-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// True when the two rectangles share any interior pixel. Touching edges
    /// do not count.
    pub fn intersects(&self, other: &Region) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Keep the regions whose area is strictly greater than `min_area`.
///
/// Pure and order-preserving. A region at exactly `min_area` is noise by
/// definition and is dropped.
pub fn significant(regions: &[Region], min_area: u32) -> Vec<Region> {
    regions
        .iter()
        .copied()
        .filter(|r| r.area() > min_area)
        .collect()
}
