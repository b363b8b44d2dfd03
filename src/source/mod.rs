mod dir;
mod mjpeg;
mod polling;

pub use dir::DirSource;
pub use mjpeg::MjpegSource;
pub use polling::PollingSource;

use async_trait::async_trait;
use image::RgbImage;
use std::io::Cursor;

use crate::frame::Frame;

/// Trait for frame acquisition backends.
///
/// `Ok(None)` is a clean end of stream. `Err` means acquisition cannot
/// continue. The monitor treats both as a graceful stop; recovery and
/// reconnect policy live outside the loop.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame, the end of the stream, or an acquisition
    /// failure. Corrupt frames are skipped internally, never surfaced.
    async fn next(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Human-readable description of the source (for logging).
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to read frame directory {0}: {1}")]
    ReadDir(String, std::io::Error),
}

/// Decode one JPEG into the pipeline's RGB frame format.
pub(crate) fn decode_jpeg(data: &[u8]) -> Result<RgbImage, image::ImageError> {
    let img = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;
    Ok(img.to_rgb8())
}
