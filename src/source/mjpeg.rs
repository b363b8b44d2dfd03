use async_trait::async_trait;
use bytes::BytesMut;
use chrono::Utc;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{decode_jpeg, FrameSource, SourceError};
use crate::frame::Frame;

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental multipart parser: push raw stream chunks in, get complete
/// JPEG parts out. Parts may span any number of chunks.
pub struct MultipartAssembler {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MultipartAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed one chunk of stream bytes; returns every JPEG part it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        // Discard everything up to and including the boundary
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case the boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        // Discard headers
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    // The next boundary tells us where this JPEG ends
                    if let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY) {
                        let jpeg_end = self.jpeg_start + pos;
                        // Strip trailing \r\n before the boundary
                        let end = if jpeg_end >= 2
                            && self.buffer[jpeg_end - 2] == b'\r'
                            && self.buffer[jpeg_end - 1] == b'\n'
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };

                        let jpeg_data = self.buffer[..end].to_vec();
                        let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                        if !jpeg_data.is_empty() {
                            parts.push(jpeg_data);
                        }

                        // Already past the boundary, go to header parsing
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // No boundary yet; remember where to resume scanning
                        self.jpeg_start = if self.buffer.len() > BOUNDARY.len() {
                            self.buffer.len() - BOUNDARY.len()
                        } else {
                            0
                        };
                        break;
                    }
                }
            }
        }
        parts
    }
}

impl Default for MultipartAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Live MJPEG multipart HTTP stream source.
pub struct MjpegSource {
    stream: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    assembler: MultipartAssembler,
    pending: VecDeque<Vec<u8>>,
    url: String,
    seq: u64,
}

impl MjpegSource {
    /// Connect to the stream endpoint. A refused or non-success response is
    /// an acquisition error before the first frame.
    pub async fn connect(url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(SourceError::HttpConnect)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(SourceError::HttpConnect)?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status().as_u16()));
        }

        info!(status = %response.status(), url, "connected to MJPEG stream");

        Ok(Self {
            stream: response.bytes_stream().boxed(),
            assembler: MultipartAssembler::new(),
            pending: VecDeque::new(),
            url: url.to_string(),
            seq: 0,
        })
    }

    fn frame_from_part(&mut self, part: Vec<u8>) -> Option<Frame> {
        match decode_jpeg(&part) {
            Ok(image) => {
                let frame = Frame::new(image, Utc::now().timestamp_millis(), self.seq);
                debug!(seq = self.seq, bytes = part.len(), "mjpeg frame assembled");
                self.seq += 1;
                Some(frame)
            }
            Err(e) => {
                warn!(error = %e, bytes = part.len(), "skipping undecodable JPEG part");
                None
            }
        }
    }
}

#[async_trait]
impl FrameSource for MjpegSource {
    async fn next(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            while let Some(part) = self.pending.pop_front() {
                if let Some(frame) = self.frame_from_part(part) {
                    return Ok(Some(frame));
                }
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    self.pending.extend(self.assembler.push(&chunk));
                }
                Some(Err(e)) => return Err(SourceError::HttpStream(e)),
                None => return Ok(None),
            }
        }
    }

    fn describe(&self) -> String {
        format!("mjpeg stream {}", self.url)
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrap parts in multipart framing, with a final boundary so the last
    /// part closes.
    fn wrap(parts: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in parts {
            out.extend_from_slice(b"--frame\r\n");
            out.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
            out.extend_from_slice(p);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--frame\r\n");
        out
    }

    #[test]
    fn single_part_single_chunk() {
        let mut asm = MultipartAssembler::new();
        let parts = asm.push(&wrap(&[b"\xFF\xD8jpegbytes\xFF\xD9"]));
        assert_eq!(parts, vec![b"\xFF\xD8jpegbytes\xFF\xD9".to_vec()]);
    }

    #[test]
    fn two_parts_single_chunk() {
        let mut asm = MultipartAssembler::new();
        let parts = asm.push(&wrap(&[b"first", b"second"]));
        assert_eq!(parts, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn part_split_byte_by_byte() {
        let mut asm = MultipartAssembler::new();
        let stream = wrap(&[b"\xFF\xD8split across many chunks\xFF\xD9", b"tail"]);
        let mut parts = Vec::new();
        for byte in stream {
            parts.extend(asm.push(&[byte]));
        }
        assert_eq!(
            parts,
            vec![
                b"\xFF\xD8split across many chunks\xFF\xD9".to_vec(),
                b"tail".to_vec()
            ]
        );
    }

    #[test]
    fn garbage_before_first_boundary_ignored() {
        let mut asm = MultipartAssembler::new();
        let mut stream = b"HTTP noise that is not a boundary".to_vec();
        stream.extend_from_slice(&wrap(&[b"payload"]));
        let parts = asm.push(&stream);
        assert_eq!(parts, vec![b"payload".to_vec()]);
    }

    #[test]
    fn empty_part_not_emitted() {
        let mut asm = MultipartAssembler::new();
        let parts = asm.push(&wrap(&[b"", b"real"]));
        assert_eq!(parts, vec![b"real".to_vec()]);
    }

    #[test]
    fn incomplete_part_waits_for_boundary() {
        let mut asm = MultipartAssembler::new();
        let parts = asm.push(b"--frame\r\nContent-Type: image/jpeg\r\n\r\ndangling");
        assert!(parts.is_empty());
        // The closing boundary arrives later and releases the part.
        let parts = asm.push(b"\r\n--frame\r\n");
        assert_eq!(parts, vec![b"dangling".to_vec()]);
    }
}
