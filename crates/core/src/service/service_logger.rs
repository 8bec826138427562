use std::collections::HashMap;
use std::time::Duration;

/// Observer for service loop events.
///
/// Keeps the loop free of any particular output mechanism; tests pass the
/// null logger and the binary uses [`LogServiceLogger`].
pub trait ServiceLogger {
    /// Record how long a named stage took for one processed frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Called after every processed frame with the running totals.
    fn throughput(&mut self, processed: u64, elapsed: Duration);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullServiceLogger;

impl ServiceLogger for NullServiceLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn throughput(&mut self, _processed: u64, _elapsed: Duration) {}
    fn info(&mut self, _message: &str) {}
}

/// Writes through the `log` facade: a throughput line every
/// `fps_log_every` processed frames and a per-stage summary at the end.
pub struct LogServiceLogger {
    fps_log_every: u64,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    processed: u64,
    elapsed: Duration,
}

impl LogServiceLogger {
    pub fn new(fps_log_every: u64) -> Self {
        Self {
            fps_log_every: fps_log_every.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            processed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.processed == 0 {
            return None;
        }

        let elapsed_ms = self.elapsed.as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Service summary ({} processed frames, {:.1}s):",
            self.processed,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if let Some(fps) = fps(self.processed, self.elapsed) {
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }
        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// True when `processed` is a frame count at which throughput is logged.
    fn is_fps_checkpoint(&self, processed: u64) -> bool {
        processed > 0 && processed % self.fps_log_every == 0
    }
}

impl ServiceLogger for LogServiceLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn throughput(&mut self, processed: u64, elapsed: Duration) {
        self.processed = processed;
        self.elapsed = elapsed;
        if self.is_fps_checkpoint(processed) {
            if let Some(fps) = fps(processed, elapsed) {
                log::info!("Processing at {fps:.2} FPS ({processed} frames)");
            }
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn fps(processed: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| processed as f64 / secs)
}
