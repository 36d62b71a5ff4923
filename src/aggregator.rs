// src/aggregator.rs
//
// Accumulates accepted velocity samples over the whole session and produces
// the final statistics. Discharge mode keeps one accumulator per segment,
// fixed at session start from the calibration's segment list; velocity mode
// keeps a single session-wide pool.
//
// Aggregation policy (see DESIGN.md for the decision log):
//   - a segment with zero samples reports an explicit no-features marker,
//     never a zero
//   - the whole-channel average velocity divides by the TOTAL segment count;
//     empty segments contribute 0 to the numerator
//   - whole-channel discharge is the plain sum of per-segment discharges

use crate::calibration::Segment;
use crate::error::{Result, VelocimetryError};
use crate::estimator::VelocitySample;

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Measured {
        avg_velocity_ft_s: f64,
        discharge_cusec: f64,
    },
    /// Zero samples over the whole session — distinguishable downstream
    /// from a measured zero.
    NoFeatures,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub segment_id: u32,
    pub outcome: SegmentOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    pub avg_velocity_ft_s: f64,
    pub total_discharge_cusec: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionResult {
    Velocity {
        avg_velocity_ft_s: f64,
        sample_count: usize,
    },
    Discharge {
        segments: Vec<SegmentResult>,
        channel: ChannelSummary,
    },
}

#[derive(Debug)]
struct SegmentAccumulator {
    segment_id: u32,
    area_sq_ft: f64,
    samples: Vec<f64>,
}

#[derive(Debug)]
enum Accumulators {
    Velocity { samples: Vec<f64> },
    Discharge { accumulators: Vec<SegmentAccumulator> },
}

#[derive(Debug)]
pub struct Aggregator {
    inner: Accumulators,
}

impl Aggregator {
    pub fn velocity() -> Self {
        Self {
            inner: Accumulators::Velocity {
                samples: Vec::new(),
            },
        }
    }

    pub fn discharge(segments: &[Segment]) -> Self {
        Self {
            inner: Accumulators::Discharge {
                accumulators: segments
                    .iter()
                    .map(|segment| SegmentAccumulator {
                        segment_id: segment.id,
                        area_sq_ft: segment.area_sq_ft,
                        samples: Vec::new(),
                    })
                    .collect(),
            },
        }
    }

    /// Record one accepted sample. In discharge mode `segment_id` names the
    /// attributed segment; a sample with no attribution was already dropped
    /// by the caller and never reaches here.
    pub fn record(&mut self, sample: &VelocitySample, segment_id: Option<u32>) {
        match &mut self.inner {
            Accumulators::Velocity { samples } => samples.push(sample.velocity_ft_s),
            Accumulators::Discharge { accumulators } => {
                if let Some(id) = segment_id {
                    if let Some(acc) = accumulators.iter_mut().find(|a| a.segment_id == id) {
                        acc.samples.push(sample.velocity_ft_s);
                    }
                }
            }
        }
    }

    pub fn sample_count(&self) -> usize {
        match &self.inner {
            Accumulators::Velocity { samples } => samples.len(),
            Accumulators::Discharge { accumulators } => {
                accumulators.iter().map(|a| a.samples.len()).sum()
            }
        }
    }

    pub fn finalize(self) -> Result<SessionResult> {
        match self.inner {
            Accumulators::Velocity { samples } => {
                if samples.is_empty() {
                    return Err(VelocimetryError::InsufficientData);
                }
                let avg = samples.iter().sum::<f64>() / samples.len() as f64;
                Ok(SessionResult::Velocity {
                    avg_velocity_ft_s: avg,
                    sample_count: samples.len(),
                })
            }
            Accumulators::Discharge { accumulators } => {
                let num_segments = accumulators.len();
                let mut segments = Vec::with_capacity(num_segments);
                let mut velocity_sum = 0.0;
                let mut discharge_sum = 0.0;

                for acc in accumulators {
                    let outcome = if acc.samples.is_empty() {
                        SegmentOutcome::NoFeatures
                    } else {
                        let avg = acc.samples.iter().sum::<f64>() / acc.samples.len() as f64;
                        let discharge = avg * acc.area_sq_ft;
                        velocity_sum += avg;
                        discharge_sum += discharge;
                        SegmentOutcome::Measured {
                            avg_velocity_ft_s: avg,
                            discharge_cusec: discharge,
                        }
                    };
                    segments.push(SegmentResult {
                        segment_id: acc.segment_id,
                        outcome,
                    });
                }

                Ok(SessionResult::Discharge {
                    segments,
                    channel: ChannelSummary {
                        avg_velocity_ft_s: velocity_sum / num_segments as f64,
                        total_discharge_cusec: discharge_sum,
                    },
                })
            }
        }
    }
}
