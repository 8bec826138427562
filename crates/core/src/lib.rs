//! Real-time people counting from a live video stream.
//!
//! Faces are detected per frame, classified in one batch per frame, and
//! deduplicated by position across recent frames so each person is counted
//! once. Counts are reported to a dashboard on a fixed cadence.
pub mod classification;
pub mod detection;
pub mod reporting;
pub mod service;
pub mod shared;
pub mod tracking;
pub mod video;
