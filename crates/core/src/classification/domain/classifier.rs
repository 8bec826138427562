use crate::shared::frame::Frame;
use crate::shared::label::{Label, LabelSet};

/// Label and confidence assigned to one face crop.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f32,
}

/// Domain interface for the pre-trained attribute model.
///
/// Receives RGB face crops of arbitrary size; implementations own
/// normalisation to whatever input shape and color convention the model
/// expects. Must return exactly one result per crop, in input order, or
/// fail as a whole.
pub trait Classifier {
    fn classify(
        &mut self,
        faces: &[Frame],
    ) -> Result<Vec<ClassificationResult>, Box<dyn std::error::Error>>;
}

/// Maps one row of per-class scores to the highest-scoring label.
///
/// Ties resolve to the lowest index.
pub fn scores_to_result(
    scores: &[f32],
    labels: &LabelSet,
) -> Result<ClassificationResult, Box<dyn std::error::Error>> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    let (best_idx, best_score) = best.ok_or("classifier returned no usable scores")?;

    let label = labels.get(best_idx).ok_or_else(|| {
        format!(
            "class index {best_idx} has no label ({} labels configured)",
            labels.len()
        )
    })?;

    Ok(ClassificationResult {
        label,
        confidence: best_score,
    })
}
