use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::shared::label::LabelSet;
use crate::tracking::domain::people_counts::PeopleCounts;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("{0} worker is busy, item dropped")]
    Busy(String),
    #[error("{0} worker has stopped")]
    WorkerStopped(String),
}

/// Point-in-time copy of the counts, as sent to the dashboard.
#[derive(Clone, Debug, PartialEq)]
pub struct CountsSnapshot {
    /// `(label name, count)` in label order.
    pub counts: Vec<(String, u64)>,
    pub total: u64,
    pub timestamp: DateTime<Local>,
}

impl CountsSnapshot {
    pub fn capture(counts: &PeopleCounts, labels: &LabelSet) -> Self {
        Self {
            counts: labels
                .iter()
                .map(|l| (l.name.clone(), counts.count(l.index)))
                .collect(),
            total: counts.total(),
            timestamp: Local::now(),
        }
    }

    /// JSON body with one `<label>_count` field per label, `total_count`
    /// and a local ISO-8601 `timestamp`.
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        for (name, count) in &self.counts {
            body.insert(format!("{name}_count"), Value::from(*count));
        }
        body.insert("total_count".into(), Value::from(self.total));
        body.insert(
            "timestamp".into(),
            Value::from(self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        );
        Value::Object(body)
    }

    /// Human-readable one-liner, e.g. `female: 2, male: 3, total: 5`.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .counts
            .iter()
            .map(|(name, count)| format!("{name}: {count}"))
            .collect();
        parts.push(format!("total: {}", self.total));
        parts.join(", ")
    }
}

/// Best-effort destination for count snapshots.
pub trait ReportSink {
    fn report(&mut self, snapshot: &CountsSnapshot) -> Result<(), ReportError>;

    /// Flushes anything still pending. Default: no-op.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::label::Label;
    use chrono::TimeZone;

    fn snapshot() -> CountsSnapshot {
        let labels = LabelSet::new(vec!["female".into(), "male".into()]);
        let mut counts = PeopleCounts::new(2);
        for index in [1, 1, 0] {
            counts.record(&Label {
                index,
                name: String::new(),
            });
        }
        let mut snap = CountsSnapshot::capture(&counts, &labels);
        snap.timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        snap
    }

    #[test]
    fn test_capture_copies_counts_in_label_order() {
        let snap = snapshot();
        assert_eq!(
            snap.counts,
            vec![("female".to_string(), 1), ("male".to_string(), 2)]
        );
        assert_eq!(snap.total, 3);
    }

    #[test]
    fn test_payload_matches_dashboard_fields() {
        let payload = snapshot().to_payload();
        assert_eq!(payload["female_count"], 1);
        assert_eq!(payload["male_count"], 2);
        assert_eq!(payload["total_count"], 3);
        assert_eq!(payload["timestamp"], "2024-03-09T14:05:07.000000");
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(snapshot().summary(), "female: 1, male: 2, total: 3");
    }
}
