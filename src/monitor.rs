use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::alert::AlertEvent;
use crate::confirm::ConfirmationTracker;
use crate::detect::Detector;
use crate::preprocess;
use crate::region;
use crate::source::FrameSource;

/// Lifecycle of one monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Stopped,
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported a clean end of stream.
    EndOfStream,
    /// Acquisition failed; the error was logged.
    SourceError,
    /// First confirmed alert under the single-alert policy.
    AlertPolicy,
    /// External shutdown request.
    Terminated,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub frames: u64,
    pub hits: u64,
    /// Confirmations handed to the dispatcher (attempted alerts).
    pub alerts: u64,
    pub reason: StopReason,
}

/// The frame loop: acquire, preprocess, detect, filter, debounce, and hand
/// confirmed episodes to the dispatch worker. Every per-frame step runs
/// sequentially on this task; the only concurrency is the alert channel.
pub struct Monitor<S: FrameSource, D: Detector> {
    /// Option so the acquisition handle can be released during the stop
    /// transition, exactly once.
    source: Option<S>,
    detector: D,
    tracker: ConfirmationTracker,
    min_area: u32,
    single_alert_then_exit: bool,
    /// Option so the channel closes at stop and the worker can drain.
    alert_tx: Option<mpsc::Sender<AlertEvent>>,
    shutdown_rx: watch::Receiver<bool>,
    state: RunState,
}

impl<S: FrameSource, D: Detector> Monitor<S, D> {
    pub fn new(
        source: S,
        detector: D,
        tracker: ConfirmationTracker,
        min_area: u32,
        single_alert_then_exit: bool,
        alert_tx: mpsc::Sender<AlertEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source: Some(source),
            detector,
            tracker,
            min_area,
            single_alert_then_exit,
            alert_tx: Some(alert_tx),
            shutdown_rx,
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the loop until the stream ends, acquisition fails, the alert
    /// policy says stop, or shutdown is requested. Collaborator failures are
    /// logged and absorbed; nothing in here panics the process.
    pub async fn run(&mut self) -> RunReport {
        if let Some(source) = &self.source {
            info!(
                source = source.describe(),
                detector = self.detector.name(),
                min_area = self.min_area,
                "monitor running"
            );
        }

        let mut frames: u64 = 0;
        let mut hits: u64 = 0;
        let mut alerts: u64 = 0;

        let reason = loop {
            // Shutdown is honored at tick boundaries only; a tick that has
            // started always completes.
            if *self.shutdown_rx.borrow() {
                info!("shutdown requested, stopping monitor");
                break StopReason::Terminated;
            }

            let acquired = match self.source.as_mut() {
                Some(source) => source.next().await,
                None => break StopReason::EndOfStream,
            };
            let frame = match acquired {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!(
                        frames,
                        run = self.tracker.consecutive_hits(),
                        "source ended"
                    );
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    error!(error = %e, frames, "frame acquisition failed");
                    break StopReason::SourceError;
                }
            };

            frames += 1;
            if frames == 1 {
                info!(
                    width = frame.width(),
                    height = frame.height(),
                    "first frame acquired"
                );
            }
            if frames % 100 == 0 {
                debug!(
                    frames,
                    hits,
                    alerts,
                    tracker = ?self.tracker.state(),
                    "frames processed"
                );
            }

            let gray = preprocess::prepare(&frame.image);
            let regions = self.detector.detect(&gray);
            let significant = region::significant(&regions, self.min_area);
            let hit = !significant.is_empty();
            if hit {
                hits += 1;
            }

            if let Some(confirmation) = self.tracker.observe(hit) {
                alerts += 1;
                let event = AlertEvent {
                    episode: confirmation.episode,
                    frame,
                    confirmed_at: chrono::Utc::now(),
                };
                // Never block the frame loop on alert I/O; a full or closed
                // channel is a failed dispatch attempt, nothing more.
                if let Some(tx) = &self.alert_tx {
                    if let Err(e) = tx.try_send(event) {
                        error!(error = %e, episode = confirmation.episode, "failed to enqueue alert");
                    }
                }
                // Reset regardless of dispatch outcome so the next episode
                // can arm.
                self.tracker.reset();

                if self.single_alert_then_exit {
                    info!(
                        episode = confirmation.episode,
                        "single-alert policy, stopping monitor"
                    );
                    break StopReason::AlertPolicy;
                }
            }
        };

        self.stop();

        let report = RunReport {
            frames,
            hits,
            alerts,
            reason,
        };
        info!(
            frames = report.frames,
            hits = report.hits,
            alerts = report.alerts,
            reason = ?report.reason,
            "monitor stopped"
        );
        report
    }

    /// Release the acquisition handle, then close the alert channel so the
    /// dispatch worker can drain and exit.
    fn stop(&mut self) {
        self.transition(RunState::Stopping);
        self.source.take();
        self.alert_tx.take();
        self.transition(RunState::Stopped);
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "monitor state change");
        self.state = next;
    }
}
