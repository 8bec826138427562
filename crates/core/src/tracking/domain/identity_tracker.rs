use std::collections::VecDeque;

use crate::classification::domain::classification_batcher::ClassifiedFace;
use crate::shared::bounding_box::{BoundingBox, Point};
use crate::shared::label::Label;
use crate::tracking::domain::people_counts::PeopleCounts;

/// A face observed in a recent processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedFace {
    pub center: Point,
    pub label: Label,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub frame_index: u64,
}

/// A face that was judged to be a new person and counted.
#[derive(Clone, Debug, PartialEq)]
pub struct CountedPerson {
    pub center: Point,
    pub label: Label,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub first_seen: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IdentityDecision {
    /// Nobody seen recently was close enough: count this face.
    New,
    /// Same person as an earlier observation, which carried this label.
    Known(Label),
}

/// Decides, by position alone, whether a face belongs to somebody already
/// counted, and owns the resulting counts.
///
/// Two memories are consulted in order: the tracking buffer (every face of
/// the last `window_frames` processed frames) and the history of counted
/// people. The first entry closer than `threshold` wins. Nothing is matched
/// by appearance, so a person who moves further than `threshold` between
/// processed frames, or leaves and comes back after the window, is counted
/// again.
///
/// Per frame: [`begin_frame`](Self::begin_frame), one
/// [`observe`](Self::observe) per classified face, then
/// [`end_frame`](Self::end_frame).
pub struct IdentityTracker {
    threshold: f64,
    window_frames: usize,
    history_max_age: Option<u64>,
    buffer: VecDeque<Vec<TrackedFace>>,
    current: Vec<TrackedFace>,
    current_frame: u64,
    history: Vec<CountedPerson>,
    counts: PeopleCounts,
}

impl IdentityTracker {
    /// `history_max_age` limits how many frames after being first seen a
    /// counted person still takes part in matching; `None` keeps everyone.
    pub fn new(
        threshold: f64,
        window_frames: usize,
        history_max_age: Option<u64>,
        label_count: usize,
    ) -> Self {
        Self {
            threshold,
            window_frames,
            history_max_age,
            buffer: VecDeque::with_capacity(window_frames + 1),
            current: Vec::new(),
            current_frame: 0,
            history: Vec::new(),
            counts: PeopleCounts::new(label_count),
        }
    }

    /// Starts a processed frame: trims the tracking buffer to the window and
    /// ages out history entries past the horizon.
    pub fn begin_frame(&mut self, frame_index: u64) {
        while self.buffer.len() > self.window_frames {
            self.buffer.pop_front();
        }
        if let Some(max_age) = self.history_max_age {
            self.history
                .retain(|p| frame_index.saturating_sub(p.first_seen) <= max_age);
        }
        self.current_frame = frame_index;
        self.current.clear();
    }

    pub fn decide(&self, center: Point) -> IdentityDecision {
        let recent = self
            .buffer
            .iter()
            .flatten()
            .map(|f| (&f.center, &f.label));
        let counted = self.history.iter().map(|p| (&p.center, &p.label));

        recent
            .chain(counted)
            .find(|(c, _)| c.distance(&center) < self.threshold)
            .map(|(_, label)| IdentityDecision::Known(label.clone()))
            .unwrap_or(IdentityDecision::New)
    }

    /// Decides on one face, counts it when new, and stages it for the
    /// tracking buffer.
    pub fn observe(&mut self, face: &ClassifiedFace) -> IdentityDecision {
        let center = face.detection.center();
        let decision = self.decide(center);
        let label = &face.result.label;

        if decision == IdentityDecision::New {
            self.counts.record(label);
            self.history.push(CountedPerson {
                center,
                label: label.clone(),
                confidence: face.result.confidence,
                bbox: face.detection.bbox,
                first_seen: face.detection.frame_index,
            });
        }

        self.current.push(TrackedFace {
            center,
            label: label.clone(),
            confidence: face.result.confidence,
            bbox: face.detection.bbox,
            frame_index: self.current_frame,
        });
        decision
    }

    /// Commits the staged observations of the current frame to the buffer.
    pub fn end_frame(&mut self) {
        self.buffer.push_back(std::mem::take(&mut self.current));
    }

    pub fn counts(&self) -> &PeopleCounts {
        &self.counts
    }

    pub fn history(&self) -> &[CountedPerson] {
        &self.history
    }

    /// Number of processed frames currently held in the tracking buffer.
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffered_faces(&self) -> usize {
        self.buffer.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::classifier::ClassificationResult;
    use crate::shared::bounding_box::Detection;
    use rstest::rstest;

    const FEMALE: usize = 0;
    const MALE: usize = 1;

    fn label(index: usize) -> Label {
        let name = if index == MALE { "male" } else { "female" };
        Label {
            index,
            name: name.into(),
        }
    }

    /// Face whose 40x40 box is centered on `(cx, cy)`.
    fn face(cx: i32, cy: i32, label_index: usize, frame_index: u64) -> ClassifiedFace {
        ClassifiedFace {
            detection: Detection::new(BoundingBox::new(cx - 20, cy - 20, 40, 40), frame_index),
            result: ClassificationResult {
                label: label(label_index),
                confidence: 0.9,
            },
        }
    }

    /// Runs one processed frame through the tracker.
    fn run_frame(
        tracker: &mut IdentityTracker,
        frame_index: u64,
        faces: &[ClassifiedFace],
    ) -> Vec<IdentityDecision> {
        tracker.begin_frame(frame_index);
        let decisions = faces.iter().map(|f| tracker.observe(f)).collect();
        tracker.end_frame();
        decisions
    }

    fn tracker() -> IdentityTracker {
        IdentityTracker::new(50.0, 5, None, 2)
    }

    #[test]
    fn test_first_face_is_new() {
        let t = tracker();
        assert_eq!(t.decide(Point::new(100, 100)), IdentityDecision::New);
    }

    #[test]
    fn test_slow_moving_face_is_counted_once() {
        let mut t = tracker();
        for i in 0..20 {
            run_frame(&mut t, i, &[face(100 + i as i32 * 10, 100, MALE, i)]);
        }
        assert_eq!(t.counts().total(), 1);
        assert_eq!(t.counts().count(MALE), 1);
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_jump_beyond_threshold_counts_again() {
        let mut t = tracker();
        run_frame(&mut t, 1, &[face(0, 0, FEMALE, 1)]);
        let decisions = run_frame(&mut t, 2, &[face(1000, 1000, FEMALE, 2)]);
        assert_eq!(decisions, vec![IdentityDecision::New]);
        assert_eq!(t.counts().total(), 2);
    }

    #[rstest]
    #[case(49, IdentityDecision::Known(label(MALE)))]
    #[case(50, IdentityDecision::New)]
    fn test_threshold_is_strict(#[case] dx: i32, #[case] expected: IdentityDecision) {
        let mut t = tracker();
        run_frame(&mut t, 1, &[face(100, 100, MALE, 1)]);
        assert_eq!(t.decide(Point::new(100 + dx, 100)), expected);
    }

    #[test]
    fn test_known_face_returns_matched_label_not_its_own() {
        let mut t = tracker();
        run_frame(&mut t, 1, &[face(100, 100, FEMALE, 1)]);
        let decisions = run_frame(&mut t, 2, &[face(105, 100, MALE, 2)]);
        assert_eq!(decisions, vec![IdentityDecision::Known(label(FEMALE))]);
        assert_eq!(t.counts().count(MALE), 0);
    }

    #[test]
    fn test_buffer_is_checked_before_history() {
        let mut t = tracker();
        // counted as female at x=100
        run_frame(&mut t, 1, &[face(100, 100, FEMALE, 1)]);
        // seen as male at x=140, matched (not counted) against the female
        run_frame(&mut t, 2, &[face(140, 100, MALE, 2)]);
        // x=175 is within 50 of the buffered male (140) but not of the female (100)
        assert_eq!(
            t.decide(Point::new(175, 100)),
            IdentityDecision::Known(label(MALE))
        );
        // x=120 is within reach of both: the buffer entry of frame 1 comes first
        assert_eq!(
            t.decide(Point::new(120, 100)),
            IdentityDecision::Known(label(FEMALE))
        );
    }

    #[test]
    fn test_two_distant_faces_in_one_frame_are_both_new() {
        let mut t = tracker();
        let decisions = run_frame(&mut t, 1, &[face(100, 100, MALE, 1), face(400, 100, FEMALE, 1)]);
        assert_eq!(decisions, vec![IdentityDecision::New, IdentityDecision::New]);
        assert_eq!(t.counts().total(), 2);
    }

    #[test]
    fn test_close_faces_in_one_frame_match_via_history() {
        let mut t = tracker();
        let decisions = run_frame(&mut t, 1, &[face(100, 100, MALE, 1), face(110, 100, FEMALE, 1)]);
        assert_eq!(
            decisions,
            vec![IdentityDecision::New, IdentityDecision::Known(label(MALE))]
        );
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_buffer_holds_at_most_window_frames_when_deciding() {
        let mut t = IdentityTracker::new(50.0, 3, None, 2);
        for i in 0..10 {
            t.begin_frame(i);
            assert!(t.buffered_frames() <= 3);
            t.observe(&face(100, 100, MALE, i));
            t.end_frame();
        }
        assert_eq!(t.buffered_frames(), 4);
        t.begin_frame(10);
        assert_eq!(t.buffered_frames(), 3);
        assert_eq!(t.buffered_faces(), 3);
    }

    #[test]
    fn test_empty_frames_advance_the_window() {
        let mut t = IdentityTracker::new(50.0, 2, None, 2);
        run_frame(&mut t, 1, &[face(100, 100, MALE, 1)]);
        run_frame(&mut t, 2, &[]);
        run_frame(&mut t, 3, &[]);
        t.begin_frame(4);
        assert_eq!(t.buffered_faces(), 0);
    }

    #[test]
    fn test_history_matches_after_buffer_forgets() {
        let mut t = IdentityTracker::new(50.0, 1, None, 2);
        run_frame(&mut t, 1, &[face(100, 100, MALE, 1)]);
        for i in 2..10 {
            run_frame(&mut t, i, &[]);
        }
        let decisions = run_frame(&mut t, 10, &[face(100, 100, FEMALE, 10)]);
        assert_eq!(decisions, vec![IdentityDecision::Known(label(MALE))]);
        assert_eq!(t.counts().total(), 1);
    }

    #[test]
    fn test_history_horizon_drops_old_people() {
        let mut t = IdentityTracker::new(50.0, 1, Some(5), 2);
        run_frame(&mut t, 1, &[face(100, 100, MALE, 1)]);
        for i in 2..10 {
            run_frame(&mut t, i, &[]);
        }
        let decisions = run_frame(&mut t, 10, &[face(100, 100, MALE, 10)]);
        assert_eq!(decisions, vec![IdentityDecision::New]);
        assert_eq!(t.counts().total(), 2);
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_total_equals_label_sum_after_every_frame() {
        let mut t = tracker();
        let positions = [(0, 0), (500, 0), (20, 10), (900, 900), (510, 5), (0, 700)];
        for (i, (x, y)) in positions.iter().enumerate() {
            let i = i as u64;
            run_frame(&mut t, i, &[face(*x, *y, (i % 2) as usize, i)]);
            let sum: u64 = t.counts().per_label().iter().sum();
            assert_eq!(t.counts().total(), sum);
        }
        assert_eq!(t.counts().total(), 4);
    }
}
