// src/session.rs
//
// One Session per video. Owns the ledger, estimator, and aggregator; the
// caller drives it frame by frame with tracker output and finalizes at end
// of stream (or on early abort — partial accumulation still yields a result).
//
// Per-frame flow: ledger update (prune lost features) → ROI membership
// re-check against the CURRENT position → velocity estimate → segment
// attribution (discharge mode) → accumulation.

use crate::aggregator::{Aggregator, SessionResult};
use crate::calibration::CalibrationModel;
use crate::error::{CalibrationError, Result};
use crate::estimator::{EstimateOutcome, VelocityEstimator};
use crate::ledger::FeatureLedger;
use crate::types::MeasurementMode;
use tracing::debug;

/// Tracker output for one seeded feature on one frame.
#[derive(Debug, Clone, Copy)]
pub struct FeatureObservation {
    pub id: u32,
    pub position: (f32, f32),
    pub valid: bool,
}

/// Per-frame accounting, for progress logging and loop decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSummary {
    pub frame_index: u64,
    /// Features still tracked after this frame's pruning.
    pub tracked: usize,
    pub accepted: usize,
    pub below_floor: usize,
    pub rejected_decreasing: usize,
    pub outside_roi: usize,
}

pub struct Session {
    calibration: CalibrationModel,
    mode: MeasurementMode,
    ledger: FeatureLedger,
    estimator: VelocityEstimator,
    aggregator: Aggregator,
    frame_index: u64,
}

impl Session {
    pub fn new(
        calibration: CalibrationModel,
        mode: MeasurementMode,
        fps: f64,
        min_velocity_ft_s: f64,
    ) -> Result<Self> {
        if mode == MeasurementMode::Discharge && calibration.segments.is_empty() {
            return Err(CalibrationError::SegmentCount(0).into());
        }

        let estimator = VelocityEstimator::new(calibration.ft_per_px, fps, min_velocity_ft_s);
        let aggregator = match mode {
            MeasurementMode::Velocity => Aggregator::velocity(),
            MeasurementMode::Discharge => Aggregator::discharge(&calibration.segments),
        };

        Ok(Self {
            calibration,
            mode,
            ledger: FeatureLedger::new(),
            estimator,
            aggregator,
            frame_index: 0,
        })
    }

    /// Register the initial feature set detected on the first frame.
    pub fn seed(&mut self, positions: Vec<(f32, f32)>) {
        self.ledger.seed(positions);
    }

    /// (id, position) pairs to feed the tracker for the next frame.
    pub fn tracked_points(&self) -> Vec<(u32, (f32, f32))> {
        self.ledger.tracked_points()
    }

    pub fn active_features(&self) -> usize {
        self.ledger.len()
    }

    pub fn accepted_samples(&self) -> usize {
        self.aggregator.sample_count()
    }

    /// Process one frame of tracker output.
    pub fn advance(&mut self, observations: &[FeatureObservation]) -> FrameSummary {
        self.frame_index += 1;
        let mut summary = FrameSummary {
            frame_index: self.frame_index,
            ..FrameSummary::default()
        };

        let valid: Vec<(u32, (f32, f32))> = observations
            .iter()
            .filter(|obs| obs.valid)
            .map(|obs| (obs.id, obs.position))
            .collect();
        self.ledger.update(&valid);
        summary.tracked = self.ledger.len();

        for (id, position) in valid {
            // A track that wandered out of the ROI is excluded from this
            // frame's accounting but stays in the ledger; it may drift back.
            if !self.calibration.roi.contains(position) {
                summary.outside_roi += 1;
                continue;
            }

            let Some(feature) = self.ledger.get_mut(id) else {
                continue;
            };

            match self.estimator.estimate(feature, self.frame_index) {
                EstimateOutcome::Accepted(sample) => {
                    let segment_id = match self.mode {
                        MeasurementMode::Discharge => {
                            self.calibration.attribute_segment(position)
                        }
                        MeasurementMode::Velocity => None,
                    };
                    self.aggregator.record(&sample, segment_id);
                    summary.accepted += 1;
                }
                EstimateOutcome::BelowFloor { .. } => summary.below_floor += 1,
                EstimateOutcome::Decreasing {
                    velocity_ft_s,
                    last_accepted,
                } => {
                    debug!(
                        "Feature {} velocity decreased ({:.2} < {:.2} ft/s), sample dropped",
                        id, velocity_ft_s, last_accepted
                    );
                    summary.rejected_decreasing += 1;
                }
                EstimateOutcome::NoTimeBase => {}
            }
        }

        summary
    }

    /// Finish the session with whatever accumulated so far.
    pub fn finalize(self) -> Result<SessionResult> {
        self.aggregator.finalize()
    }
}
