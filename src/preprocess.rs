use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Working width every frame is normalized to before detection.
pub const TARGET_WIDTH: u32 = 500;

// Sigma equivalent of the classic 5x5 gaussian kernel.
const BLUR_SIGMA: f32 = 1.1;

/// Fixed per-frame transform: downscale to a 500-pixel-wide working size
/// (aspect preserved), grayscale, gaussian blur. Detection regions and the
/// significance threshold both live in this working coordinate space.
pub fn prepare(image: &RgbImage) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(0, 0);
    }
    let target_h = ((TARGET_WIDTH as u64 * h as u64) / w as u64).max(1) as u32;
    let resized = imageops::resize(image, TARGET_WIDTH, target_h, FilterType::Triangle);
    let gray = imageops::grayscale(&resized);
    imageops::blur(&gray, BLUR_SIGMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscales_to_target_width() {
        let out = prepare(&RgbImage::new(1000, 600));
        assert_eq!(out.dimensions(), (500, 300));
    }

    #[test]
    fn upscales_small_frames() {
        let out = prepare(&RgbImage::new(250, 100));
        assert_eq!(out.dimensions(), (500, 200));
    }

    #[test]
    fn is_deterministic() {
        let mut img = RgbImage::new(600, 400);
        for (x, y, p) in img.enumerate_pixels_mut() {
            p.0 = [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8];
        }
        assert_eq!(prepare(&img), prepare(&img));
    }

    #[test]
    fn empty_frame_stays_empty() {
        let out = prepare(&RgbImage::new(0, 0));
        assert_eq!(out.dimensions(), (0, 0));
    }
}
