use std::path::PathBuf;

use thiserror::Error;

use crate::reporting::domain::report_sink::ReportError;
use crate::service::service_config::ConfigError;

/// Anything that stops the service from entering its loop.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("face detector model {path} could not be loaded: {source}")]
    DetectorModel {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    #[error("classifier model {path} could not be loaded: {source}")]
    ClassifierModel {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    #[error("video source {source_name} could not be opened: {source}")]
    Source {
        source_name: String,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    #[error("dashboard client could not be created: {0}")]
    Reporting(#[from] ReportError),
    #[error("background worker could not be started: {0}")]
    Worker(#[from] std::io::Error),
}

/// A failure that ended a running service loop. Teardown has already run
/// by the time this is returned.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("video source failed after {captured} captured frames: {source}")]
    Source {
        captured: u64,
        #[source]
        source: Box<dyn std::error::Error>,
    },
}
