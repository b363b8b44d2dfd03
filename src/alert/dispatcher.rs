use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::notifier::{Notifier, TransportError};
use super::snapshot;
use crate::frame::Frame;

/// One confirmed episode's worth of alert work, handed off the frame loop.
/// Owns the confirming frame outright.
#[derive(Debug)]
pub struct AlertEvent {
    pub episode: u64,
    pub frame: Frame,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to encode snapshot: {0}")]
    Encode(image::ImageError),
    #[error("failed to write snapshot {0}: {1}")]
    Write(String, std::io::Error),
    #[error("notification transport failed: {0}")]
    Transport(#[from] TransportError),
}

/// Turns one confirmed episode into a snapshot on disk plus a notification.
///
/// Runs entirely on the dispatch worker; the frame loop only ever hands an
/// event over a channel and moves on.
pub struct AlertDispatcher<N: Notifier> {
    notifier: N,
    recipient: String,
    subject: String,
    snapshot_dir: PathBuf,
}

impl<N: Notifier> AlertDispatcher<N> {
    pub fn new(notifier: N, recipient: String, subject: String, snapshot_dir: PathBuf) -> Self {
        Self {
            notifier,
            recipient,
            subject,
            snapshot_dir,
        }
    }

    /// Handle one confirmed episode: write the snapshot, compose the message,
    /// send it, then delete the snapshot. A failed send keeps the snapshot on
    /// disk for the operator; a failed delete is a warning, not an error.
    pub async fn handle(&self, event: AlertEvent) -> Result<(), DispatchError> {
        let jpeg = snapshot::encode_jpeg(&event.frame.image).map_err(DispatchError::Encode)?;
        let name = snapshot::snapshot_name(event.frame.captured_at_ms, event.episode);
        let path = snapshot::write_snapshot(&self.snapshot_dir, &name, &jpeg)
            .await
            .map_err(|e| {
                DispatchError::Write(self.snapshot_dir.join(&name).display().to_string(), e)
            })?;

        let body = compose_body(event.confirmed_at, event.frame.seq);

        match self
            .notifier
            .send(&self.recipient, &self.subject, &body, &path)
            .await
        {
            Ok(()) => {
                snapshot::remove_snapshot(&path).await;
                Ok(())
            }
            Err(e) => Err(DispatchError::Transport(e)),
        }
    }
}

// The timestamp is rendered in the operator's local time, matching the
// clock on the monitor wall rather than UTC.
fn compose_body(confirmed_at: DateTime<Utc>, seq: u64) -> String {
    format!(
        "Gun detected by security camera!\n\n\
         Time: {}\n\
         Frame: {}\n\
         Please check the attached image.",
        confirmed_at.with_timezone(&Local).format("%d %b %Y %I:%M:%S %p"),
        seq
    )
}

/// Background worker: drains alert events until the channel closes. Keeps
/// every byte of snapshot and transport I/O off the frame loop.
pub async fn run_dispatch_loop<N: Notifier>(
    dispatcher: AlertDispatcher<N>,
    mut rx: mpsc::Receiver<AlertEvent>,
) {
    info!(
        transport = dispatcher.notifier.name(),
        "alert dispatcher ready"
    );
    while let Some(event) = rx.recv().await {
        let episode = event.episode;
        let seq = event.frame.seq;
        let captured = event.frame.captured_at();
        match dispatcher.handle(event).await {
            Ok(()) => info!(episode, seq, captured = %captured, "alert dispatched"),
            Err(e) => {
                error!(error = %e, episode, seq, captured = %captured, "alert dispatch failed")
            }
        }
    }
    info!("alert dispatcher drained");
}
