use chrono::{DateTime, TimeZone, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::warn;

const JPEG_QUALITY: u8 = 85;

fn fmt_ts(ms: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now);
    dt.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Snapshot filename for one confirmed episode.
/// e.g. "gun_detected_20260218T093000123Z_001.jpg"
pub fn snapshot_name(captured_at_ms: i64, episode: u64) -> String {
    format!("gun_detected_{}_{episode:03}.jpg", fmt_ts(captured_at_ms))
}

/// Encode the confirming frame as JPEG for the snapshot and the attachment.
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode_image(image)?;
    Ok(buf)
}

pub async fn write_snapshot(dir: &Path, name: &str, jpeg: &[u8]) -> Result<PathBuf, std::io::Error> {
    let path = dir.join(name);
    tokio::fs::write(&path, jpeg).await?;
    Ok(path)
}

/// Best-effort removal after a successful send. Failure is logged, never
/// propagated.
pub async fn remove_snapshot(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = path.display().to_string(), error = %e, "failed to delete snapshot file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_embeds_timestamp_and_episode() {
        // 2026-02-18T09:30:00.123Z
        let name = snapshot_name(1771407000123, 1);
        assert_eq!(name, "gun_detected_20260218T093000123Z_001.jpg");
    }

    #[test]
    fn names_unique_across_episodes_and_times() {
        let a = snapshot_name(1771407000123, 1);
        let b = snapshot_name(1771407000123, 2);
        let c = snapshot_name(1771407000124, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn encoded_jpeg_decodes_back() {
        let img = RgbImage::from_pixel(16, 12, image::Rgb([200, 40, 40]));
        let jpeg = encode_jpeg(&img).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 12);
    }

    #[tokio::test]
    async fn write_then_remove_roundtrip() {
        let dir = std::env::temp_dir();
        let name = format!("sentry-snap-{}.jpg", std::process::id());
        let path = write_snapshot(&dir, &name, b"\xFF\xD8fake\xFF\xD9")
            .await
            .unwrap();
        assert!(path.exists());
        remove_snapshot(&path).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn remove_missing_file_does_not_panic() {
        remove_snapshot(Path::new("/nonexistent/sentry-snap.jpg")).await;
    }
}
