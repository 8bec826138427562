use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::classification::domain::color_convention::ColorConvention;
use crate::shared::constants::{
    DEFAULT_DASHBOARD_URL, DEFAULT_FPS_LOG_EVERY, DEFAULT_FRAME_TIMEOUT_MS, DEFAULT_JPEG_QUALITY,
    DEFAULT_LABELS, DEFAULT_REPORT_EVERY, DEFAULT_REPORT_TIMEOUT_MS, DEFAULT_WARMUP_FRAMES,
};
use crate::shared::label::LabelSet;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Everything the counting service can be tuned with.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub tracking: TrackingConfig,
    pub detector: DetectorConfig,
    pub governor: GovernorConfig,
    pub classifier: ClassifierConfig,
    pub reporting: ReportingConfig,
    /// Flip frames horizontally before detection, as a selfie camera shows them.
    pub mirror: bool,
    /// Processed frames between throughput log lines.
    pub fps_log_every: u64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Centers closer than this many pixels belong to the same person.
    pub threshold_px: f64,
    /// Processed frames kept in the tracking buffer.
    pub window_frames: usize,
    /// Frames after which a counted person stops taking part in matching.
    pub history_max_age_frames: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ratio between successive image pyramid levels, > 1.
    pub scale_factor: f32,
    /// Minimum cascade score for a window to count as a face.
    pub score_threshold: f64,
    /// `(width, height)` in pixels; smaller faces are ignored.
    pub min_face_size: (u32, u32),
    /// Sliding window step in pixels.
    pub window_step: u32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub warmup_frames: u64,
    /// Measured rate above which frames start being skipped.
    pub skip_threshold_fps: f64,
    /// Rate the skip factor aims for.
    pub target_max_fps: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// `(width, height)` used when the model does not fix its input size.
    pub image_size: (u32, u32),
    /// Label names by class index.
    pub labels: Vec<String>,
    pub color: ColorConvention,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub dashboard_url: String,
    /// Processed frames between count reports.
    pub report_every: u64,
    pub report_timeout_ms: u64,
    pub stream_frames: bool,
    pub frame_timeout_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            detector: DetectorConfig::default(),
            governor: GovernorConfig::default(),
            classifier: ClassifierConfig::default(),
            reporting: ReportingConfig::default(),
            mirror: true,
            fps_log_every: DEFAULT_FPS_LOG_EVERY,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            threshold_px: 50.0,
            window_frames: 30,
            history_max_age_frames: None,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            score_threshold: 2.0,
            min_face_size: (30, 30),
            window_step: 4,
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            skip_threshold_fps: 15.0,
            target_max_fps: 15.0,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            image_size: (224, 224),
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            color: ColorConvention::default(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            report_every: DEFAULT_REPORT_EVERY,
            report_timeout_ms: DEFAULT_REPORT_TIMEOUT_MS,
            stream_frames: true,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ServiceConfig {
    /// Loads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn label_set(&self) -> LabelSet {
        LabelSet::new(self.classifier.labels.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tracking = &self.tracking;
        if !(tracking.threshold_px.is_finite() && tracking.threshold_px > 0.0) {
            return Err(invalid(
                "tracking.threshold_px",
                format!("must be a positive number of pixels, got {}", tracking.threshold_px),
            ));
        }
        if tracking.window_frames == 0 {
            return Err(invalid("tracking.window_frames", "must be at least 1"));
        }

        let detector = &self.detector;
        if !(detector.scale_factor.is_finite() && detector.scale_factor > 1.0) {
            return Err(invalid(
                "detector.scale_factor",
                format!("must be greater than 1, got {}", detector.scale_factor),
            ));
        }
        if !detector.score_threshold.is_finite() {
            return Err(invalid("detector.score_threshold", "must be finite"));
        }
        if detector.min_face_size.0 == 0 || detector.min_face_size.1 == 0 {
            return Err(invalid(
                "detector.min_face_size",
                format!("both sides must be positive, got {:?}", detector.min_face_size),
            ));
        }
        if detector.window_step == 0 {
            return Err(invalid("detector.window_step", "must be at least 1"));
        }

        let governor = &self.governor;
        for (field, value) in [
            ("governor.skip_threshold_fps", governor.skip_threshold_fps),
            ("governor.target_max_fps", governor.target_max_fps),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be a positive rate, got {value}")));
            }
        }

        let classifier = &self.classifier;
        if classifier.image_size.0 == 0 || classifier.image_size.1 == 0 {
            return Err(invalid(
                "classifier.image_size",
                format!("both sides must be positive, got {:?}", classifier.image_size),
            ));
        }
        if classifier.labels.is_empty() {
            return Err(invalid("classifier.labels", "at least one label is required"));
        }
        for (i, name) in classifier.labels.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(invalid("classifier.labels", format!("label {i} is empty")));
            }
            if classifier.labels[..i].contains(name) {
                return Err(invalid("classifier.labels", format!("duplicate label {name:?}")));
            }
        }

        let reporting = &self.reporting;
        let url = &reporting.dashboard_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(
                "reporting.dashboard_url",
                format!("must be an http(s) URL, got {url:?}"),
            ));
        }
        if reporting.report_every == 0 {
            return Err(invalid("reporting.report_every", "must be at least 1"));
        }
        if reporting.report_timeout_ms == 0 {
            return Err(invalid("reporting.report_timeout_ms", "must be positive"));
        }
        if reporting.frame_timeout_ms == 0 {
            return Err(invalid("reporting.frame_timeout_ms", "must be positive"));
        }
        if !(1..=100).contains(&reporting.jpeg_quality) {
            return Err(invalid(
                "reporting.jpeg_quality",
                format!("must be between 1 and 100, got {}", reporting.jpeg_quality),
            ));
        }

        if self.fps_log_every == 0 {
            return Err(invalid("fps_log_every", "must be at least 1"));
        }
        Ok(())
    }
}

impl ReportingConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}
