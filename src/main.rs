// src/main.rs

mod aggregator;
mod calibration;
mod config;
mod error;
mod estimator;
mod ledger;
mod session;
mod tracker;
mod types;
mod video_source;

use aggregator::{SegmentOutcome, SessionResult};
use anyhow::Result;
use calibration::CalibrationModel;
use error::VelocimetryError;
use session::{FeatureObservation, Session};
use std::path::Path;
use tracker::FeatureTracker;
use tracing::{debug, error, info, warn};
use types::{Config, MeasurementMode};
use video_source::VideoProcessor;

fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("optical_velocimetry={}", config.logging.level))
        .init();

    info!("Optical velocimetry pipeline starting");

    let calibration = CalibrationModel::from_config(&config.calibration)?;
    let mode = config.mode();
    match mode {
        MeasurementMode::Velocity => {
            info!("Mode: velocity (whole-channel average)");
        }
        MeasurementMode::Discharge => {
            info!(
                "Mode: discharge ({} cross-section segments)",
                calibration.segments.len()
            );
        }
    }
    info!(
        "Calibration: {:.4} ft/px, ROI width {:.0} px",
        calibration.ft_per_px,
        calibration.roi.width_px()
    );

    let processor = VideoProcessor::new(config.video.clone());
    let videos = processor.find_video_files()?;

    if videos.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    for (idx, video_path) in videos.iter().enumerate() {
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            videos.len(),
            video_path.display()
        );

        match process_video(video_path, &processor, &config, &calibration, mode) {
            Ok(result) => report_result(&result),
            Err(e) => match e.downcast_ref::<VelocimetryError>() {
                Some(VelocimetryError::InsufficientData) => {
                    warn!("No motion detected: no feature ever produced an accepted sample");
                }
                _ => error!("Failed to process video: {}", e),
            },
        }
    }

    Ok(())
}

fn process_video(
    video_path: &Path,
    processor: &VideoProcessor,
    config: &Config,
    calibration: &CalibrationModel,
    mode: MeasurementMode,
) -> Result<SessionResult> {
    let mut reader = processor.open_video(video_path)?;
    let tracker = FeatureTracker::from_config(&config.tracking)?;

    let Some(first_gray) = reader.read_gray_frame()? else {
        anyhow::bail!("{} contains no frames", video_path.display());
    };

    let seeds = tracker.detect_features(&first_gray, &calibration.roi)?;
    info!("Seeded {} features inside the ROI", seeds.len());
    if seeds.is_empty() {
        warn!("No trackable features inside the ROI on the first frame");
    }

    let mut session = Session::new(
        calibration.clone(),
        mode,
        reader.fps,
        config.velocity.min_velocity_ft_s,
    )?;
    session.seed(seeds);

    let mut prev_gray = first_gray;
    while let Some(gray) = reader.read_gray_frame()? {
        if session.active_features() == 0 {
            info!(
                "All features lost at frame {} ({:.0}% of video); finalizing with collected samples",
                reader.current_frame,
                reader.progress()
            );
            break;
        }

        let tracked = session.tracked_points();
        let positions: Vec<(f32, f32)> = tracked.iter().map(|&(_, position)| position).collect();
        let updates = tracker.track(&prev_gray, &gray, &positions)?;

        let observations: Vec<FeatureObservation> = tracked
            .iter()
            .zip(updates.iter())
            .map(|(&(id, _), update)| FeatureObservation {
                id,
                position: update.position,
                valid: update.valid,
            })
            .collect();

        let summary = session.advance(&observations);
        debug!(
            "Frame {}: {} tracked, {} accepted, {} below floor, {} decreasing, {} outside ROI",
            summary.frame_index,
            summary.tracked,
            summary.accepted,
            summary.below_floor,
            summary.rejected_decreasing,
            summary.outside_roi
        );

        prev_gray = gray;
    }

    info!(
        "Session complete: {} accepted samples over {} frames, {} features still live",
        session.accepted_samples(),
        reader.current_frame,
        session.active_features()
    );

    Ok(session.finalize()?)
}

fn report_result(result: &SessionResult) {
    match result {
        SessionResult::Velocity {
            avg_velocity_ft_s,
            sample_count,
        } => {
            info!(
                "Average surface velocity: {:.3} ft/s ({} samples)",
                avg_velocity_ft_s, sample_count
            );
        }
        SessionResult::Discharge { segments, channel } => {
            for segment in segments {
                match segment.outcome {
                    SegmentOutcome::Measured {
                        avg_velocity_ft_s,
                        discharge_cusec,
                    } => info!(
                        "  Segment {}: avg velocity {:.2} ft/s, discharge {:.2} cusec",
                        segment.segment_id, avg_velocity_ft_s, discharge_cusec
                    ),
                    SegmentOutcome::NoFeatures => {
                        info!("  Segment {}: no features detected", segment.segment_id)
                    }
                }
            }
            info!("Channel velocity: {:.2} ft/s", channel.avg_velocity_ft_s);
            info!(
                "Channel discharge: {:.2} cusec",
                channel.total_discharge_cusec
            );
        }
    }
}
