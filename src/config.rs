use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::preprocess::TARGET_WIDTH;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub confirm: ConfirmConfig,
    pub alert: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// "mjpeg" (multipart HTTP stream), "poll" (single-frame HTTP endpoint),
    /// or "dir" (directory of stills, played back in name order).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// HTTP endpoint for mjpeg/poll, directory path for dir.
    pub url: String,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Grayscale silhouette template the detector matches against.
    pub classifier: PathBuf,
    #[serde(default = "default_min_area")]
    pub min_area: u32,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_min_window")]
    pub min_window: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmConfig {
    /// Consecutive positive frames required before an alert fires.
    #[serde(default = "default_confirm_threshold")]
    pub threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub webhook_url: String,
    #[serde(default = "default_recipient")]
    pub recipient: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
    /// Stop the monitor loop after the first confirmed alert (the classic
    /// single-shot behavior). Set false for continuous monitoring.
    #[serde(default = "default_single_alert")]
    pub single_alert_then_exit: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            threshold: default_confirm_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject bad values before any component is built. Every failure here is
    /// fatal at startup; nothing is checked again inside the loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.source.mode.as_str() {
            "mjpeg" | "poll" | "dir" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown source mode '{other}' (expected mjpeg, poll, or dir)"
                )))
            }
        }
        if self.source.url.is_empty() {
            return Err(ConfigError::Invalid("source url must not be empty".into()));
        }
        if !(self.source.fps > 0.0 && self.source.fps <= 1000.0) {
            return Err(ConfigError::Invalid(format!(
                "source fps must be in (0, 1000], got {}",
                self.source.fps
            )));
        }
        if self.confirm.threshold == 0 {
            return Err(ConfigError::Invalid(
                "confirm threshold must be at least 1".into(),
            ));
        }
        if !(self.detector.match_threshold > 0.0 && self.detector.match_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "detector match_threshold must be in (0, 1], got {}",
                self.detector.match_threshold
            )));
        }
        // Frames are resized to TARGET_WIDTH before detection, so a larger
        // minimum window could never fit and the detector would stay silent.
        if self.detector.min_window < 8 || self.detector.min_window > TARGET_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "detector min_window must be between 8 and {TARGET_WIDTH}, got {}",
                self.detector.min_window
            )));
        }
        if self.alert.webhook_url.is_empty() {
            return Err(ConfigError::Invalid(
                "alert webhook_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to load classifier resource {0}: {1}")]
    Classifier(String, image::ImageError),
}

// Default value functions
fn default_mode() -> String {
    "mjpeg".into()
}
fn default_fps() -> f64 {
    10.0
}
fn default_min_area() -> u32 {
    25000
}
fn default_match_threshold() -> f64 {
    0.80
}
fn default_min_window() -> u32 {
    120
}
fn default_confirm_threshold() -> u32 {
    5
}
fn default_recipient() -> String {
    "security-ops".into()
}
fn default_subject() -> String {
    "Gun Detection Alert".into()
}
fn default_snapshot_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_single_alert() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}
