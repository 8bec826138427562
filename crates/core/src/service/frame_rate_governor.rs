use std::time::Duration;

/// Decides which captured frames get processed so throughput stays near a
/// target rate.
///
/// Stateless: the decision is recomputed from the counters on every frame,
/// so the skip factor follows the measured rate up and down. Skipped frames
/// are still read from the source by the caller so no stale frames queue up.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRateGovernor {
    warmup_frames: u64,
    skip_threshold_fps: f64,
    target_max_fps: f64,
}

impl FrameRateGovernor {
    pub fn new(warmup_frames: u64, skip_threshold_fps: f64, target_max_fps: f64) -> Self {
        Self {
            warmup_frames,
            skip_threshold_fps,
            target_max_fps,
        }
    }

    /// Processed frames per second, once more than `warmup_frames` frames
    /// have been processed and some time has passed.
    pub fn measured_rate(&self, elapsed: Duration, processed_count: u64) -> Option<f64> {
        let secs = elapsed.as_secs_f64();
        if processed_count <= self.warmup_frames || secs <= 0.0 {
            return None;
        }
        Some(processed_count as f64 / secs)
    }

    /// Number of frames to drop between processed ones; 0 means no skipping.
    pub fn skip_factor(&self, elapsed: Duration, processed_count: u64) -> u64 {
        match self.measured_rate(elapsed, processed_count) {
            Some(rate) if rate > self.skip_threshold_fps && self.target_max_fps > 0.0 => {
                (rate / self.target_max_fps).floor() as u64
            }
            _ => 0,
        }
    }

    pub fn should_process(&self, frame_index: u64, elapsed: Duration, processed_count: u64) -> bool {
        let skip = self.skip_factor(elapsed, processed_count);
        skip == 0 || frame_index % (skip + 1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Elapsed time that makes `processed` frames come out at `rate` fps.
    fn elapsed_for(processed: u64, rate: f64) -> Duration {
        Duration::from_secs_f64(processed as f64 / rate)
    }

    #[test]
    fn test_every_frame_processed_during_warmup() {
        let governor = FrameRateGovernor::new(10, 10.0, 10.0);
        for processed in 0..=10 {
            let elapsed = elapsed_for(processed.max(1), 1000.0);
            for index in 1..=7 {
                assert!(governor.should_process(index, elapsed, processed));
            }
        }
    }

    #[test]
    fn test_rate_2_3x_over_ceiling_keeps_every_third_frame() {
        let governor = FrameRateGovernor::new(10, 10.0, 10.0);
        let elapsed = elapsed_for(11, 23.0);

        assert_eq!(governor.skip_factor(elapsed, 11), 2);
        let kept: Vec<u64> = (1..=12)
            .filter(|&i| governor.should_process(i, elapsed, 11))
            .collect();
        assert_eq!(kept, vec![3, 6, 9, 12]);
    }

    #[test]
    fn test_below_ceiling_processes_everything() {
        let governor = FrameRateGovernor::new(10, 15.0, 15.0);
        let elapsed = elapsed_for(50, 14.0);
        assert_eq!(governor.skip_factor(elapsed, 50), 0);
        assert!((1..=30).all(|i| governor.should_process(i, elapsed, 50)));
    }

    #[rstest]
    #[case(25.0, 1)]
    #[case(31.0, 2)]
    #[case(95.0, 6)]
    fn test_skip_factor_is_floor_of_rate_over_target(#[case] rate: f64, #[case] expected: u64) {
        let governor = FrameRateGovernor::new(10, 20.0, 15.0);
        assert_eq!(governor.skip_factor(elapsed_for(100, rate), 100), expected);
    }

    #[test]
    fn test_threshold_above_target_can_still_yield_zero_skip() {
        // Ceiling 5 fps but target 30 fps: 12 fps is over the ceiling yet
        // floor(12 / 30) == 0, so nothing is skipped.
        let governor = FrameRateGovernor::new(10, 5.0, 30.0);
        let elapsed = elapsed_for(20, 12.0);
        assert_eq!(governor.skip_factor(elapsed, 20), 0);
        assert!(governor.should_process(7, elapsed, 20));
    }

    #[test]
    fn test_zero_elapsed_is_not_measured() {
        let governor = FrameRateGovernor::new(10, 10.0, 10.0);
        assert!(governor.measured_rate(Duration::ZERO, 50).is_none());
        assert!(governor.should_process(1, Duration::ZERO, 50));
    }

    #[test]
    fn test_measured_rate() {
        let governor = FrameRateGovernor::new(10, 10.0, 10.0);
        assert_relative_eq!(
            governor.measured_rate(Duration::from_secs(2), 40).unwrap(),
            20.0
        );
        assert!(governor.measured_rate(Duration::from_secs(2), 10).is_none());
    }

    #[test]
    fn test_skip_factor_recovers_when_rate_drops() {
        let governor = FrameRateGovernor::new(10, 10.0, 10.0);
        assert_eq!(governor.skip_factor(elapsed_for(100, 35.0), 100), 3);
        assert_eq!(governor.skip_factor(elapsed_for(100, 9.0), 100), 0);
    }
}
