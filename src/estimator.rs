// src/estimator.rs
//
// Converts a feature's pixel displacement and tracked-frame count into a
// physical velocity, then gates the sample twice:
//
//   1. Monotonicity filter — surface floats should not slow down mid-transit,
//      so a velocity strictly below the feature's last accepted one is
//      treated as tracking noise and rejected outright (no sample, no state
//      change).
//   2. Acceptance floor — samples under min_velocity_ft_s are computed but
//      treated as stagnant and never accumulated.

use crate::ledger::TrackedFeature;

/// One accepted measurement, fed to the aggregator and then discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub feature_id: u32,
    pub velocity_ft_s: f64,
    pub frame_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimateOutcome {
    Accepted(VelocitySample),
    /// Computed but under the acceptance floor; not accumulated and the
    /// feature's last accepted velocity is left untouched.
    BelowFloor { velocity_ft_s: f64 },
    /// Strictly below the last accepted velocity; rejected outright.
    Decreasing {
        velocity_ft_s: f64,
        last_accepted: f64,
    },
    /// No usable time base yet (zero tracked frames or non-positive fps).
    NoTimeBase,
}

#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    ft_per_px: f64,
    fps: f64,
    min_velocity_ft_s: f64,
}

impl VelocityEstimator {
    pub fn new(ft_per_px: f64, fps: f64, min_velocity_ft_s: f64) -> Self {
        Self {
            ft_per_px,
            fps,
            min_velocity_ft_s,
        }
    }

    /// Estimate this frame's velocity for one feature. Mutates the feature's
    /// `last_accepted_velocity` only on acceptance.
    pub fn estimate(&self, feature: &mut TrackedFeature, frame_index: u64) -> EstimateOutcome {
        if self.fps <= 0.0 || feature.tracked_frame_count == 0 {
            return EstimateOutcome::NoTimeBase;
        }

        let displacement_ft = feature.displacement_px() * self.ft_per_px;
        let elapsed_s = feature.tracked_frame_count as f64 / self.fps;
        let velocity_ft_s = displacement_ft / elapsed_s;

        if let Some(last_accepted) = feature.last_accepted_velocity {
            if velocity_ft_s < last_accepted {
                return EstimateOutcome::Decreasing {
                    velocity_ft_s,
                    last_accepted,
                };
            }
        }

        if velocity_ft_s < self.min_velocity_ft_s {
            return EstimateOutcome::BelowFloor { velocity_ft_s };
        }

        feature.last_accepted_velocity = Some(velocity_ft_s);
        EstimateOutcome::Accepted(VelocitySample {
            feature_id: feature.id,
            velocity_ft_s,
            frame_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_at(current: (f32, f32), frames: u32) -> TrackedFeature {
        TrackedFeature {
            id: 7,
            initial_position: (0.0, 0.0),
            current_position: current,
            tracked_frame_count: frames,
            last_accepted_velocity: None,
        }
    }

    #[test]
    fn test_zero_frame_count_yields_no_sample() {
        let estimator = VelocityEstimator::new(0.5, 20.0, 0.15);
        let mut feature = feature_at((10.0, 0.0), 0);
        assert_eq!(
            estimator.estimate(&mut feature, 1),
            EstimateOutcome::NoTimeBase
        );
    }

    #[test]
    fn test_non_positive_fps_yields_no_sample() {
        let estimator = VelocityEstimator::new(0.5, 0.0, 0.15);
        let mut feature = feature_at((10.0, 0.0), 5);
        assert_eq!(
            estimator.estimate(&mut feature, 1),
            EstimateOutcome::NoTimeBase
        );
    }

    #[test]
    fn test_displacement_to_velocity_conversion() {
        // 100 px at 0.5 ft/px over 10 frames at 20 fps:
        // 50 ft over 0.5 s -> 100 ft/s
        let estimator = VelocityEstimator::new(0.5, 20.0, 0.15);
        let mut feature = feature_at((100.0, 0.0), 10);

        match estimator.estimate(&mut feature, 10) {
            EstimateOutcome::Accepted(sample) => {
                assert!((sample.velocity_ft_s - 100.0).abs() < 1e-9);
                assert_eq!(sample.feature_id, 7);
            }
            other => panic!("expected accepted sample, got {:?}", other),
        }
        assert_eq!(feature.last_accepted_velocity, Some(100.0));
    }

    #[test]
    fn test_below_floor_not_accumulated_and_no_state_change() {
        let estimator = VelocityEstimator::new(0.5, 20.0, 0.15);
        // 0.01 px over 1 frame at 20 fps -> 0.1 ft/s, under the 0.15 floor
        let mut feature = feature_at((0.01, 0.0), 1);

        match estimator.estimate(&mut feature, 1) {
            EstimateOutcome::BelowFloor { velocity_ft_s } => {
                assert!(velocity_ft_s < 0.15);
            }
            other => panic!("expected below-floor, got {:?}", other),
        }
        assert_eq!(
            feature.last_accepted_velocity, None,
            "below-floor samples must not update last accepted velocity"
        );
    }

    #[test]
    fn test_monotonicity_filter_rejects_and_preserves_state() {
        // Velocity sequence 0.2, 0.5, 0.3, 0.6 -> accepted 0.2, 0.5, 0.6;
        // the 0.3 is rejected and leaves the last accepted velocity at 0.5.
        let estimator = VelocityEstimator::new(1.0, 1.0, 0.15);
        let mut feature = feature_at((0.0, 0.0), 0);

        let sequence: [(f32, u32); 4] = [(0.2, 1), (1.0, 2), (0.9, 3), (2.4, 4)];
        let mut accepted = Vec::new();

        for (x, frames) in sequence {
            feature.current_position = (x, 0.0);
            feature.tracked_frame_count = frames;
            match estimator.estimate(&mut feature, frames as u64) {
                EstimateOutcome::Accepted(sample) => accepted.push(sample.velocity_ft_s),
                EstimateOutcome::Decreasing { last_accepted, .. } => {
                    assert!((last_accepted - 0.5).abs() < 1e-6);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(accepted.len(), 3);
        assert!((accepted[0] - 0.2).abs() < 1e-6);
        assert!((accepted[1] - 0.5).abs() < 1e-6);
        assert!((accepted[2] - 0.6).abs() < 1e-6);
        assert!((feature.last_accepted_velocity.unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_equal_velocity_is_not_a_decrease() {
        let estimator = VelocityEstimator::new(1.0, 1.0, 0.15);
        let mut feature = feature_at((0.0, 0.0), 0);
        feature.last_accepted_velocity = Some(2.0);
        // 2 px over 1 frame at 1 fps and 1 ft/px -> exactly 2.0 ft/s
        feature.current_position = (2.0, 0.0);
        feature.tracked_frame_count = 1;

        assert!(matches!(
            estimator.estimate(&mut feature, 1),
            EstimateOutcome::Accepted(_)
        ));
    }

    #[test]
    fn test_constant_velocity_track_converges() {
        // A feature moving 2 px/frame at 10 fps with 0.1 ft/px moves at a
        // true 2.0 ft/s; the cumulative estimate is exact every frame.
        let estimator = VelocityEstimator::new(0.1, 10.0, 0.15);
        let mut feature = feature_at((0.0, 0.0), 0);

        for frame in 1..=200u32 {
            feature.current_position = (2.0 * frame as f32, 0.0);
            feature.tracked_frame_count = frame;
            match estimator.estimate(&mut feature, frame as u64) {
                EstimateOutcome::Accepted(sample) => {
                    assert!(
                        (sample.velocity_ft_s - 2.0).abs() < 1e-3,
                        "frame {}: velocity {} drifted from true 2.0",
                        frame,
                        sample.velocity_ft_s
                    );
                }
                other => panic!("frame {}: unexpected outcome {:?}", frame, other),
            }
        }
    }
}
