use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{decode_jpeg, FrameSource, SourceError};
use crate::frame::Frame;

/// Polling source: fetch single JPEG frames from an HTTP endpoint at a fixed
/// rate. For cameras that expose a still endpoint but no multipart stream.
pub struct PollingSource {
    client: reqwest::Client,
    url: String,
    ticker: tokio::time::Interval,
    seq: u64,
}

impl PollingSource {
    pub fn new(url: &str, fps: f64) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(SourceError::HttpConnect)?;
        let ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps));
        Ok(Self {
            client,
            url: url.to_string(),
            ticker,
            seq: 0,
        })
    }
}

#[async_trait]
impl FrameSource for PollingSource {
    async fn next(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            self.ticker.tick().await;

            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(SourceError::HttpConnect)?;
            if !response.status().is_success() {
                return Err(SourceError::HttpStatus(response.status().as_u16()));
            }
            let data = response.bytes().await.map_err(SourceError::HttpStream)?;

            match decode_jpeg(&data) {
                Ok(image) => {
                    let frame = Frame::new(image, Utc::now().timestamp_millis(), self.seq);
                    debug!(seq = self.seq, bytes = data.len(), "polled frame");
                    self.seq += 1;
                    return Ok(Some(frame));
                }
                Err(e) => {
                    warn!(error = %e, bytes = data.len(), "skipping undecodable polled frame");
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("polling {}", self.url)
    }
}
