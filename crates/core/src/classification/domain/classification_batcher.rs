use crate::classification::domain::classifier::{ClassificationResult, Classifier};
use crate::shared::bounding_box::Detection;
use crate::shared::frame::Frame;

/// A detection together with the label the classifier gave it.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedFace {
    pub detection: Detection,
    pub result: ClassificationResult,
}

/// What one frame's classification produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Successfully classified faces, in detection order.
    pub faces: Vec<ClassifiedFace>,
    /// True when the batched call failed and faces were classified one by one.
    pub used_fallback: bool,
    /// Faces that could not be classified and were dropped.
    pub skipped: usize,
}

/// Groups every valid face of a frame into a single classifier call.
///
/// Failure policy has two tiers: the whole batch is tried once; if that
/// fails, each face is tried once on its own and faces that still fail are
/// dropped. Nothing is retried beyond that and no error escapes.
pub struct ClassificationBatcher {
    classifier: Box<dyn Classifier>,
    min_face_size: (u32, u32),
}

impl ClassificationBatcher {
    pub fn new(classifier: Box<dyn Classifier>, min_face_size: (u32, u32)) -> Self {
        Self {
            classifier,
            min_face_size,
        }
    }

    pub fn classify(&mut self, frame: &Frame, detections: &[Detection]) -> BatchOutcome {
        let (valid, crops) = self.prepare(frame, detections);
        let mut outcome = BatchOutcome {
            skipped: detections.len() - valid.len(),
            ..BatchOutcome::default()
        };
        if valid.is_empty() {
            return outcome;
        }

        match self.classify_batch(&valid, &crops) {
            Ok(faces) => outcome.faces = faces,
            Err(e) => {
                log::warn!(
                    "Batch classification of {} faces failed, falling back to per-face: {e}",
                    valid.len()
                );
                outcome.used_fallback = true;
                let faces = self.classify_each(&valid, &crops);
                outcome.skipped += valid.len() - faces.len();
                outcome.faces = faces;
            }
        }
        outcome
    }

    /// Drops undersized boxes and boxes with no pixels inside the frame.
    fn prepare(&self, frame: &Frame, detections: &[Detection]) -> (Vec<Detection>, Vec<Frame>) {
        let (min_w, min_h) = self.min_face_size;
        detections
            .iter()
            .filter(|d| d.bbox.is_at_least(min_w, min_h))
            .filter_map(|d| frame.crop(&d.bbox).map(|crop| (*d, crop)))
            .unzip()
    }

    fn classify_batch(
        &mut self,
        detections: &[Detection],
        crops: &[Frame],
    ) -> Result<Vec<ClassifiedFace>, Box<dyn std::error::Error>> {
        let results = self.classifier.classify(crops)?;
        if results.len() != detections.len() {
            return Err(format!(
                "classifier returned {} results for {} faces",
                results.len(),
                detections.len()
            )
            .into());
        }
        Ok(pair(detections, results))
    }

    fn classify_each(&mut self, detections: &[Detection], crops: &[Frame]) -> Vec<ClassifiedFace> {
        let mut faces = Vec::with_capacity(detections.len());
        for (detection, crop) in detections.iter().zip(crops) {
            match self.classifier.classify(std::slice::from_ref(crop)) {
                Ok(mut results) if results.len() == 1 => faces.push(ClassifiedFace {
                    detection: *detection,
                    result: results.remove(0),
                }),
                Ok(results) => log::warn!(
                    "Skipping face at {:?}: classifier returned {} results",
                    detection.bbox,
                    results.len()
                ),
                Err(e) => log::warn!("Skipping face at {:?}: {e}", detection.bbox),
            }
        }
        faces
    }
}

fn pair(detections: &[Detection], results: Vec<ClassificationResult>) -> Vec<ClassifiedFace> {
    detections
        .iter()
        .zip(results)
        .map(|(detection, result)| ClassifiedFace {
            detection: *detection,
            result,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::label::LabelSet;
    use std::sync::{Arc, Mutex};

    /// Labels each crop by its width: even → index 0, odd → index 1.
    /// Fails batches larger than `max_batch` and any crop whose width is in
    /// `failing_widths`.
    struct ScriptedClassifier {
        max_batch: usize,
        failing_widths: Vec<u32>,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    impl ScriptedClassifier {
        fn new(max_batch: usize, failing_widths: Vec<u32>) -> (Self, Arc<Mutex<Vec<usize>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    max_batch,
                    failing_widths,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Classifier for ScriptedClassifier {
        fn classify(
            &mut self,
            faces: &[Frame],
        ) -> Result<Vec<ClassificationResult>, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push(faces.len());
            if faces.len() > self.max_batch {
                return Err("batch too large".into());
            }
            let labels = LabelSet::new(vec!["female".into(), "male".into()]);
            faces
                .iter()
                .map(|f| -> Result<ClassificationResult, Box<dyn std::error::Error>> {
                    if self.failing_widths.contains(&f.width()) {
                        return Err("bad face".into());
                    }
                    Ok(ClassificationResult {
                        label: labels.get((f.width() % 2) as usize).unwrap(),
                        confidence: 0.9,
                    })
                })
                .collect()
        }
    }

    struct ShortClassifier;

    impl Classifier for ShortClassifier {
        fn classify(
            &mut self,
            _faces: &[Frame],
        ) -> Result<Vec<ClassificationResult>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 400 * 200 * 3], 400, 200, 3, 1)
    }

    fn det(x: i32, w: i32) -> Detection {
        Detection::new(BoundingBox::new(x, 10, w, 40), 1)
    }

    #[test]
    fn test_single_call_for_whole_frame() {
        let (classifier, calls) = ScriptedClassifier::new(10, vec![]);
        let mut batcher = ClassificationBatcher::new(Box::new(classifier), (30, 30));

        let dets = vec![det(0, 40), det(100, 41), det(200, 42)];
        let outcome = batcher.classify(&frame(), &dets);

        assert_eq!(*calls.lock().unwrap(), vec![3]);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.faces.len(), 3);
        let xs: Vec<i32> = outcome.faces.iter().map(|f| f.detection.bbox.x).collect();
        assert_eq!(xs, vec![0, 100, 200]);
        assert_eq!(outcome.faces[1].result.label.name, "male");
        assert_eq!(outcome.faces[2].result.label.name, "female");
    }

    #[test]
    fn test_undersized_faces_are_filtered_before_classification() {
        let (classifier, calls) = ScriptedClassifier::new(10, vec![]);
        let mut batcher = ClassificationBatcher::new(Box::new(classifier), (30, 30));

        let dets = vec![det(0, 20), det(100, 40)];
        let outcome = batcher.classify(&frame(), &dets);

        assert_eq!(*calls.lock().unwrap(), vec![1]);
        assert_eq!(outcome.faces.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_no_valid_faces_means_no_call() {
        let (classifier, calls) = ScriptedClassifier::new(10, vec![]);
        let mut batcher = ClassificationBatcher::new(Box::new(classifier), (30, 30));

        let outcome = batcher.classify(&frame(), &[det(0, 5), det(1000, 40)]);

        assert!(calls.lock().unwrap().is_empty());
        assert!(outcome.faces.is_empty());
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn test_batch_failure_falls_back_to_per_face() {
        let (classifier, calls) = ScriptedClassifier::new(1, vec![]);
        let mut batcher = ClassificationBatcher::new(Box::new(classifier), (30, 30));

        let dets = vec![det(0, 40), det(100, 41), det(200, 42)];
        let outcome = batcher.classify(&frame(), &dets);

        assert_eq!(*calls.lock().unwrap(), vec![3, 1, 1, 1]);
        assert!(outcome.used_fallback);
        assert_eq!(outcome.faces.len(), 3);
        let xs: Vec<i32> = outcome.faces.iter().map(|f| f.detection.bbox.x).collect();
        assert_eq!(xs, vec![0, 100, 200]);
    }

    #[test]
    fn test_fallback_skips_faces_that_still_fail() {
        let (classifier, calls) = ScriptedClassifier::new(10, vec![41]);
        let mut batcher = ClassificationBatcher::new(Box::new(classifier), (30, 30));

        let dets = vec![det(0, 40), det(100, 41), det(200, 42)];
        let outcome = batcher.classify(&frame(), &dets);

        // batch fails because one face fails, then each face is tried once
        assert_eq!(*calls.lock().unwrap(), vec![3, 1, 1, 1]);
        assert!(outcome.used_fallback);
        assert_eq!(outcome.skipped, 1);
        let xs: Vec<i32> = outcome.faces.iter().map(|f| f.detection.bbox.x).collect();
        assert_eq!(xs, vec![0, 200]);
    }

    #[test]
    fn test_result_count_mismatch_is_treated_as_failure() {
        let mut batcher = ClassificationBatcher::new(Box::new(ShortClassifier), (30, 30));

        let outcome = batcher.classify(&frame(), &[det(0, 40), det(100, 40)]);

        assert!(outcome.used_fallback);
        assert!(outcome.faces.is_empty());
        assert_eq!(outcome.skipped, 2);
    }
}
