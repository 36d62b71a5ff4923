// src/error.rs
//
// Error taxonomy for the velocimetry core. Tracking degeneracy (zero valid
// features on a frame) is deliberately NOT an error: the session finalizes
// with whatever accumulated.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VelocimetryError>;

#[derive(Error, Debug)]
pub enum VelocimetryError {
    #[error("calibration rejected: {0}")]
    Calibration(#[from] CalibrationError),

    /// Velocity-mode finalization with zero accepted samples across the
    /// whole session. Surfaced to the caller, never reported as 0.
    #[error("no accepted velocity samples were collected")]
    InsufficientData,

    #[error("video source: {0}")]
    VideoSource(String),

    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed calibration input. The core refuses to start a session on any
/// of these; they are checked once, before tracking begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("ROI polygon must have exactly 4 vertices, got {0}")]
    RoiVertexCount(usize),

    #[error("pixel-to-feet ratio must be positive, got {0}")]
    NonPositiveRatio(f64),

    #[error("reference points coincide; cannot derive a pixel-to-feet ratio")]
    DegenerateReference,

    #[error("segment count must be odd and positive, got {0}")]
    SegmentCount(usize),

    #[error("segment ids must run 1..=n in order, found {0}")]
    NonContiguousSegmentIds(u32),

    #[error("segment {id} area must be positive, got {area}")]
    NonPositiveArea { id: u32, area: f64 },
}
