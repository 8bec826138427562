use crate::shared::label::Label;

/// Running number of distinct people counted, per label and in total.
///
/// Counts only ever grow; `total` always equals the sum of the per-label
/// counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeopleCounts {
    per_label: Vec<u64>,
    total: u64,
}

impl PeopleCounts {
    pub fn new(label_count: usize) -> Self {
        Self {
            per_label: vec![0; label_count],
            total: 0,
        }
    }

    pub fn record(&mut self, label: &Label) {
        if label.index >= self.per_label.len() {
            self.per_label.resize(label.index + 1, 0);
        }
        self.per_label[label.index] += 1;
        self.total += 1;
    }

    pub fn count(&self, label_index: usize) -> u64 {
        self.per_label.get(label_index).copied().unwrap_or(0)
    }

    pub fn per_label(&self) -> &[u64] {
        &self.per_label
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
