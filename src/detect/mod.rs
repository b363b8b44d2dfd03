mod silhouette;

pub use silhouette::SilhouetteDetector;

use image::GrayImage;

use crate::region::Region;

/// Trait for per-frame weapon classifiers.
///
/// Infallible by contract: an implementation that fails internally on a frame
/// logs the failure and returns no regions, so a bad frame can only ever look
/// like "nothing detected". Anything that can fail permanently (loading the
/// classifier resource) belongs in the implementation's constructor.
pub trait Detector: Send + Sync {
    /// Scan one preprocessed (grayscale, working-size) frame and return every
    /// candidate region found.
    fn detect(&mut self, gray: &GrayImage) -> Vec<Region>;

    /// Name of the detector (for logging).
    fn name(&self) -> &str {
        "unnamed"
    }
}
