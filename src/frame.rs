use image::RgbImage;

/// A decoded camera frame with acquisition metadata.
///
/// Owned by the monitor loop for exactly one tick, then either dropped or
/// moved whole into an alert event. Nothing holds a borrow across ticks.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at_ms: i64,
    /// Acquisition order within one source, starting at 0.
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Capture time as a UTC datetime, falling back to now for frames whose
    /// millis fall outside chrono's representable range.
    pub fn captured_at(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now)
    }
}
