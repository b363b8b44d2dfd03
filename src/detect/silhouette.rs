use image::imageops::FilterType;
use image::GrayImage;
use std::path::Path;
use tracing::{debug, info};

use super::Detector;
use crate::config::ConfigError;
use crate::region::Region;

/// Side length of the internal template, in cells.
const TEMPLATE_SIZE: u32 = 24;
const TEMPLATE_LEN: usize = (TEMPLATE_SIZE * TEMPLATE_SIZE) as usize;

/// Ratio between consecutive window sizes in the scale ladder.
const WINDOW_SCALE_STEP: f64 = 1.35;

/// Template-correlation silhouette detector.
///
/// The classifier resource is a grayscale silhouette image, loaded once at
/// construction and downsampled to a small zero-mean template. Per frame, a
/// square window slides over the working image at several scales; each window
/// is point-sampled down to the template grid and scored by normalized
/// cross-correlation. Windows above the match threshold survive a greedy
/// strongest-first overlap suppression and come back as regions.
pub struct SilhouetteDetector {
    /// Zero-mean template luma, row-major, TEMPLATE_SIZE^2 cells.
    template: Vec<f64>,
    template_norm: f64,
    match_threshold: f64,
    min_window: u32,
}

impl SilhouetteDetector {
    pub fn new(path: &Path, match_threshold: f64, min_window: u32) -> Result<Self, ConfigError> {
        let img = image::open(path)
            .map_err(|e| ConfigError::Classifier(path.display().to_string(), e))?;
        let small = img
            .resize_exact(TEMPLATE_SIZE, TEMPLATE_SIZE, FilterType::Triangle)
            .to_luma8();

        let pixels: Vec<f64> = small.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        let template: Vec<f64> = pixels.iter().map(|&v| v - mean).collect();
        let norm = template.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return Err(ConfigError::Invalid(format!(
                "classifier template {} is uniform and can never match",
                path.display()
            )));
        }

        info!(
            template = %path.display(),
            match_threshold,
            min_window,
            "silhouette classifier loaded"
        );

        Ok(Self {
            template,
            template_norm: norm,
            match_threshold,
            min_window,
        })
    }

    /// Normalized cross-correlation between the template and the window at
    /// (x0, y0). Returns a score in [-1, 1]; flat windows score 0.
    fn correlate(&self, gray: &GrayImage, x0: u32, y0: u32, window: u32) -> f64 {
        let ts = TEMPLATE_SIZE;
        let mut patch = [0f64; TEMPLATE_LEN];
        let mut sum = 0f64;
        for ty in 0..ts {
            for tx in 0..ts {
                // Nearest sample at the center of each template cell.
                let sx = x0 + (tx * window + window / 2) / ts;
                let sy = y0 + (ty * window + window / 2) / ts;
                let v = gray.get_pixel(sx, sy).0[0] as f64;
                patch[(ty * ts + tx) as usize] = v;
                sum += v;
            }
        }
        let mean = sum / TEMPLATE_LEN as f64;

        let mut dot = 0f64;
        let mut norm_sq = 0f64;
        for (i, &v) in patch.iter().enumerate() {
            let centered = v - mean;
            dot += centered * self.template[i];
            norm_sq += centered * centered;
        }
        if norm_sq <= f64::EPSILON {
            return 0.0;
        }
        dot / (norm_sq.sqrt() * self.template_norm)
    }
}

impl Detector for SilhouetteDetector {
    fn detect(&mut self, gray: &GrayImage) -> Vec<Region> {
        let (fw, fh) = gray.dimensions();
        let max_window = fw.min(fh);
        if max_window < self.min_window {
            return Vec::new();
        }

        let mut candidates: Vec<(Region, f64)> = Vec::new();
        let mut window = self.min_window;
        while window <= max_window {
            let stride = (window / 4).max(1);
            let mut y = 0;
            while y + window <= fh {
                let mut x = 0;
                while x + window <= fw {
                    let score = self.correlate(gray, x, y, window);
                    if score >= self.match_threshold {
                        candidates.push((Region::new(x, y, window, window), score));
                    }
                    x += stride;
                }
                y += stride;
            }
            let next = (window as f64 * WINDOW_SCALE_STEP) as u32;
            if next == window {
                break;
            }
            window = next;
        }

        // Greedy suppression: the strongest candidate claims any overlap.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        let mut kept: Vec<Region> = Vec::new();
        for (region, _) in candidates {
            if !kept.iter().any(|k| k.intersects(&region)) {
                kept.push(region);
            }
        }

        if !kept.is_empty() {
            debug!(regions = kept.len(), "silhouette matches in frame");
        }
        kept
    }

    fn name(&self) -> &str {
        "silhouette"
    }
}
