use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub tracking: TrackingConfig,
    pub velocity: VelocityConfig,
    pub calibration: CalibrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub process_width: i32,
    pub process_height: i32,
}

/// Shi-Tomasi seeding + pyramidal Lucas-Kanade parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub max_corners: i32,
    pub quality_level: f64,
    pub min_distance: f64,
    pub block_size: i32,
    pub win_size: i32,
    pub max_level: i32,
    pub term_max_iters: i32,
    pub term_epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Samples below this floor are computed but never accumulated (ft/s).
    pub min_velocity_ft_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Four ROI vertices in processing-resolution pixel coordinates,
    /// ordered top-left, top-right, bottom-right, bottom-left.
    pub roi_points: Vec<[f32; 2]>,
    /// Two marked points a known real-world distance apart.
    pub reference_points: [[f32; 2]; 2],
    pub reference_distance_ft: f64,
    /// Present = discharge mode; absent = velocity-only mode.
    pub discharge: Option<DischargeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeConfig {
    pub channel_width_ft: f64,
    /// One depth per segment, left to right across the channel. The count
    /// must be odd so the center segment sits on the channel centerline.
    pub segment_depths_ft: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementMode {
    Velocity,
    Discharge,
}

impl Config {
    pub fn mode(&self) -> MeasurementMode {
        if self.calibration.discharge.is_some() {
            MeasurementMode::Discharge
        } else {
            MeasurementMode::Velocity
        }
    }
}
