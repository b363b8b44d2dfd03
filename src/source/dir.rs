use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{decode_jpeg, FrameSource, SourceError};
use crate::frame::Frame;

/// Directory playback source: feeds the JPEG files of a directory in name
/// order at a fixed rate, then ends the stream. Used for recorded footage
/// and for exercising the pipeline without a camera.
pub struct DirSource {
    files: std::vec::IntoIter<PathBuf>,
    ticker: tokio::time::Interval,
    dir: String,
    seq: u64,
}

impl DirSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, SourceError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| SourceError::ReadDir(dir.display().to_string(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        info!(dir = %dir.display(), frames = files.len(), "opened frame directory");

        Ok(Self {
            files: files.into_iter(),
            ticker: tokio::time::interval(Duration::from_secs_f64(1.0 / fps)),
            dir: dir.display().to_string(),
            seq: 0,
        })
    }
}

#[async_trait]
impl FrameSource for DirSource {
    async fn next(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            let Some(path) = self.files.next() else {
                return Ok(None);
            };
            self.ticker.tick().await;

            let data = match tokio::fs::read(&path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "skipping unreadable frame file");
                    continue;
                }
            };

            match decode_jpeg(&data) {
                Ok(image) => {
                    let frame = Frame::new(image, Utc::now().timestamp_millis(), self.seq);
                    debug!(seq = self.seq, path = %path.display(), "frame loaded");
                    self.seq += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "skipping undecodable frame file");
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("frame directory {}", self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn make_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sentry-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_jpeg(dir: &Path, name: &str, luma: u8) {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([luma, luma, luma]));
        img.save(dir.join(name)).unwrap();
    }

    #[tokio::test]
    async fn plays_files_in_name_order_then_ends() {
        let dir = make_dir("order");
        write_jpeg(&dir, "b.jpg", 120);
        write_jpeg(&dir, "a.jpg", 10);
        write_jpeg(&dir, "c.jpg", 240);

        let mut source = DirSource::open(&dir, 1000.0).unwrap();
        let mut brightness = Vec::new();
        while let Some(frame) = source.next().await.unwrap() {
            brightness.push(frame.image.get_pixel(0, 0).0[0]);
        }
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(brightness.len(), 3);
        // JPEG is lossy, so compare coarsely: a < b < c by brightness.
        assert!(brightness[0] < 60);
        assert!(brightness[1] > 60 && brightness[1] < 180);
        assert!(brightness[2] > 180);
    }

    #[tokio::test]
    async fn corrupt_file_skipped_with_seq_intact() {
        let dir = make_dir("corrupt");
        write_jpeg(&dir, "00.jpg", 50);
        std::fs::write(dir.join("01.jpg"), b"definitely not a jpeg").unwrap();
        write_jpeg(&dir, "02.jpg", 50);

        let mut source = DirSource::open(&dir, 1000.0).unwrap();
        let mut seqs = Vec::new();
        while let Some(frame) = source.next().await.unwrap() {
            seqs.push(frame.seq);
        }
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(seqs, vec![0, 1]);
    }

    #[tokio::test]
    async fn non_jpeg_extensions_ignored() {
        let dir = make_dir("ext");
        write_jpeg(&dir, "frame.jpg", 50);
        std::fs::write(dir.join("notes.txt"), b"ignore me").unwrap();

        let mut source = DirSource::open(&dir, 1000.0).unwrap();
        let mut count = 0;
        while source.next().await.unwrap().is_some() {
            count += 1;
        }
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let result = DirSource::open(Path::new("/nonexistent/frames"), 10.0);
        assert!(matches!(result, Err(SourceError::ReadDir(_, _))));
    }
}
