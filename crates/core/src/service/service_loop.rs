use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::classification::domain::classification_batcher::ClassificationBatcher;
use crate::classification::domain::classifier::Classifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::size_filter::filter_by_min_size;
use crate::reporting::domain::frame_sink::FrameSink;
use crate::reporting::domain::report_sink::{CountsSnapshot, ReportSink};
use crate::service::frame_rate_governor::FrameRateGovernor;
use crate::service::service_config::ServiceConfig;
use crate::service::service_error::ServiceError;
use crate::service::service_logger::{NullServiceLogger, ServiceLogger};
use crate::shared::frame::Frame;
use crate::shared::label::LabelSet;
use crate::tracking::domain::identity_tracker::{IdentityDecision, IdentityTracker};
use crate::tracking::domain::people_counts::PeopleCounts;
use crate::video::domain::frame_source::FrameSource;

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames.
    Exhausted,
    /// The stop flag was raised.
    Interrupted,
    /// Reading from the source failed.
    SourceFailed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub captured_frames: u64,
    pub processed_frames: u64,
    pub counts: PeopleCounts,
    pub stop_reason: StopReason,
}

/// Drives the per-frame pipeline: governor, detection, size filter,
/// batched classification, identity tracking and periodic reporting.
///
/// Single-threaded. Reporting and frame streaming go through sinks that
/// must not block; their failures are logged and never touch the counts.
/// Teardown (source release, one final report, sink shutdown) runs exactly
/// once, whether the loop ends normally, by the stop flag, on a source
/// error, or by the loop being dropped.
pub struct ServiceLoop {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    batcher: ClassificationBatcher,
    tracker: IdentityTracker,
    governor: FrameRateGovernor,
    report_sink: Box<dyn ReportSink>,
    frame_sink: Option<Box<dyn FrameSink>>,
    logger: Box<dyn ServiceLogger>,
    labels: LabelSet,
    min_face_size: (u32, u32),
    mirror: bool,
    report_every: u64,
    stop: Arc<AtomicBool>,
    captured: u64,
    processed: u64,
    finished: bool,
}

impl ServiceLoop {
    pub fn new(
        config: &ServiceConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        classifier: Box<dyn Classifier>,
        report_sink: Box<dyn ReportSink>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let labels = config.label_set();
        Self {
            source,
            detector,
            batcher: ClassificationBatcher::new(classifier, config.detector.min_face_size),
            tracker: IdentityTracker::new(
                config.tracking.threshold_px,
                config.tracking.window_frames,
                config.tracking.history_max_age_frames,
                labels.len(),
            ),
            governor: FrameRateGovernor::new(
                config.governor.warmup_frames,
                config.governor.skip_threshold_fps,
                config.governor.target_max_fps,
            ),
            report_sink,
            frame_sink: None,
            logger: Box::new(NullServiceLogger),
            labels,
            min_face_size: config.detector.min_face_size,
            mirror: config.mirror,
            report_every: config.reporting.report_every.max(1),
            stop,
            captured: 0,
            processed: 0,
            finished: false,
        }
    }

    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.frame_sink = Some(sink);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn ServiceLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn counts(&self) -> &PeopleCounts {
        self.tracker.counts()
    }

    /// Runs until the source is exhausted, the stop flag is raised, or the
    /// source fails, then tears down.
    pub fn run(&mut self) -> Result<RunSummary, ServiceError> {
        let result = self.process_stream();
        let stop_reason = match &result {
            Ok(reason) => *reason,
            Err(_) => StopReason::SourceFailed,
        };
        self.finish();
        result.map(|_| RunSummary {
            captured_frames: self.captured,
            processed_frames: self.processed,
            counts: self.tracker.counts().clone(),
            stop_reason,
        })
    }

    fn process_stream(&mut self) -> Result<StopReason, ServiceError> {
        let started = Instant::now();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                log::info!("Stop requested, shutting down");
                return Ok(StopReason::Interrupted);
            }

            let frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("Video source has no more frames");
                    return Ok(StopReason::Exhausted);
                }
                Err(source) => {
                    log::error!("Failed to read from video source: {source}");
                    return Err(ServiceError::Source {
                        captured: self.captured,
                        source,
                    });
                }
            };
            self.captured += 1;

            if !self
                .governor
                .should_process(frame.index(), started.elapsed(), self.processed)
            {
                continue;
            }
            if !self.process_frame(frame) {
                continue;
            }

            self.logger.throughput(self.processed, started.elapsed());
            if self.processed % self.report_every == 0 {
                self.report();
            }
        }
    }

    /// Returns false when the frame had to be skipped.
    fn process_frame(&mut self, mut frame: Frame) -> bool {
        if self.mirror {
            frame.flip_horizontal();
        }

        let t0 = Instant::now();
        let boxes = match self.detector.detect(&frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Face detection failed on frame {}, skipping: {e}", frame.index());
                return false;
            }
        };
        self.logger.timing("detect", elapsed_ms(t0));

        let detections = filter_by_min_size(&boxes, self.min_face_size, frame.index());
        let t1 = Instant::now();
        let outcome = self.batcher.classify(&frame, &detections);
        if !detections.is_empty() {
            self.logger.timing("classify", elapsed_ms(t1));
        }

        self.tracker.begin_frame(frame.index());
        for face in &outcome.faces {
            if self.tracker.observe(face) == IdentityDecision::New {
                log::info!(
                    "New {} detected at frame {} (confidence {:.2}). {}",
                    face.result.label,
                    frame.index(),
                    face.result.confidence,
                    CountsSnapshot::capture(self.tracker.counts(), &self.labels).summary()
                );
            }
        }
        self.tracker.end_frame();
        self.processed += 1;

        self.logger.metric("faces", outcome.faces.len() as f64);
        if outcome.skipped > 0 {
            self.logger.metric("unclassified_faces", outcome.skipped as f64);
        }

        if let Some(sink) = self.frame_sink.as_mut() {
            if let Err(e) = sink.publish(&frame) {
                log::debug!("Frame not streamed: {e}");
            }
        }
        true
    }

    fn report(&mut self) {
        let snapshot = CountsSnapshot::capture(self.tracker.counts(), &self.labels);
        if let Err(e) = self.report_sink.report(&snapshot) {
            log::warn!("Failed to report counts: {e}");
        }
    }

    /// Releases the source, sends the final report and shuts the sinks
    /// down. Only the first call does anything.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.source.release();
        self.report();
        self.report_sink.close();
        if let Some(sink) = self.frame_sink.as_mut() {
            sink.close();
        }

        let summary = CountsSnapshot::capture(self.tracker.counts(), &self.labels).summary();
        self.logger.info(&format!(
            "Final counts after {} processed frames: {summary}",
            self.processed
        ));
        self.logger.summary();
    }
}

impl Drop for ServiceLoop {
    fn drop(&mut self) {
        self.finish();
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
