mod alert;
mod config;
mod confirm;
mod detect;
mod frame;
mod monitor;
mod preprocess;
mod region;
mod source;

use alert::{AlertDispatcher, Notifier, TransportError, WebhookNotifier};
use config::Config;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        mode = config.source.mode,
        url = config.source.url,
        classifier = config.detector.classifier.display().to_string(),
        confirm_threshold = config.confirm.threshold,
        min_area = config.detector.min_area,
        single_alert = config.alert.single_alert_then_exit,
        "starting frame-sentry"
    );

    // The classifier resource loads up front; a broken resource must fail
    // the process before any frame is read.
    let detector = match detect::SilhouetteDetector::new(
        &config.detector.classifier,
        config.detector.match_threshold,
        config.detector.min_window,
    ) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to load classifier resource");
            std::process::exit(1);
        }
    };

    // The webhook client is likewise built before the first frame.
    let dispatcher = match build_dispatcher(&config) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "failed to build webhook client");
            std::process::exit(1);
        }
    };

    let report = match config.source.mode.as_str() {
        "mjpeg" => match source::MjpegSource::connect(&config.source.url).await {
            Ok(s) => run_monitor(s, detector, dispatcher, &config).await,
            Err(e) => {
                error!(error = %e, "could not open mjpeg stream");
                return;
            }
        },
        "poll" => match source::PollingSource::new(&config.source.url, config.source.fps) {
            Ok(s) => run_monitor(s, detector, dispatcher, &config).await,
            Err(e) => {
                error!(error = %e, "could not build polling source");
                return;
            }
        },
        "dir" => match source::DirSource::open(Path::new(&config.source.url), config.source.fps) {
            Ok(s) => run_monitor(s, detector, dispatcher, &config).await,
            Err(e) => {
                error!(error = %e, "could not open frame directory");
                return;
            }
        },
        other => {
            error!(
                mode = other,
                "unknown source mode, expected 'mjpeg', 'poll', or 'dir'"
            );
            std::process::exit(1);
        }
    };

    info!(
        frames = report.frames,
        alerts = report.alerts,
        reason = ?report.reason,
        "frame-sentry stopped"
    );
}

fn build_dispatcher(config: &Config) -> Result<AlertDispatcher<WebhookNotifier>, TransportError> {
    let notifier = WebhookNotifier::new(&config.alert.webhook_url)?;
    Ok(AlertDispatcher::new(
        notifier,
        config.alert.recipient.clone(),
        config.alert.subject.clone(),
        config.alert.snapshot_dir.clone(),
    ))
}

/// Wire the dispatch worker, the shutdown signal, and the monitor around one
/// concrete source, run to completion, and wait for in-flight alerts.
async fn run_monitor<S: source::FrameSource, N: Notifier + 'static>(
    source: S,
    detector: detect::SilhouetteDetector,
    dispatcher: AlertDispatcher<N>,
    config: &Config,
) -> monitor::RunReport {
    let tracker = match confirm::ConfirmationTracker::new(config.confirm.threshold) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "invalid confirmation threshold");
            std::process::exit(1);
        }
    };

    let (alert_tx, alert_rx) = tokio::sync::mpsc::channel(8);
    let worker = tokio::spawn(alert::run_dispatch_loop(dispatcher, alert_rx));

    // Ctrl-c flips the shutdown flag; the loop notices at the next tick.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("ctrl-c received, shutting down");
        shutdown_tx.send(true).ok();
    });

    let mut monitor = monitor::Monitor::new(
        source,
        detector,
        tracker,
        config.detector.min_area,
        config.alert.single_alert_then_exit,
        alert_tx,
        shutdown_rx,
    );
    let report = monitor.run().await;
    debug!(state = ?monitor.state(), "monitor finished");

    // The monitor closed the alert channel at stop; wait for the worker to
    // finish whatever is still in flight.
    worker.await.ok();
    report
}
