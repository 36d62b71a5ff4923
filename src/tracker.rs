// src/tracker.rs
//
// Sparse optical flow wrapper. Seeds Shi-Tomasi corners inside the ROI mask
// once at session start, then steps them frame to frame with pyramidal
// Lucas-Kanade. Stateless apart from the tuned parameters; the ledger owns
// feature identity.

use crate::calibration::RoiPolygon;
use crate::error::Result;
use crate::types::TrackingConfig;
use opencv::{
    core::{self, Mat, Point, Point2f, Scalar, Size, TermCriteria, Vector},
    imgproc,
    prelude::*,
    video,
};

/// Per-input-point tracker output, aligned with the input order.
#[derive(Debug, Clone, Copy)]
pub struct TrackUpdate {
    pub position: (f32, f32),
    pub valid: bool,
}

pub struct FeatureTracker {
    max_corners: i32,
    quality_level: f64,
    min_distance: f64,
    block_size: i32,
    win_size: i32,
    max_level: i32,
    criteria: TermCriteria,
}

impl FeatureTracker {
    pub fn from_config(config: &TrackingConfig) -> Result<Self> {
        let criteria = TermCriteria::new(
            core::TermCriteria_Type::COUNT as i32 | core::TermCriteria_Type::EPS as i32,
            config.term_max_iters,
            config.term_epsilon,
        )?;
        Ok(Self {
            max_corners: config.max_corners,
            quality_level: config.quality_level,
            min_distance: config.min_distance,
            block_size: config.block_size,
            win_size: config.win_size,
            max_level: config.max_level,
            criteria,
        })
    }

    /// Detect the initial feature set on the first grayscale frame,
    /// restricted to points inside the ROI polygon.
    pub fn detect_features(&self, gray: &Mat, roi: &RoiPolygon) -> Result<Vec<(f32, f32)>> {
        let mut mask = Mat::zeros(gray.rows(), gray.cols(), core::CV_8UC1)?.to_mat()?;

        let mut outline = Vector::<Point>::new();
        for &(x, y) in roi.vertices() {
            outline.push(Point::new(x as i32, y as i32));
        }
        let polygons = Vector::<Vector<Point>>::from_iter([outline]);
        imgproc::fill_poly(
            &mut mask,
            &polygons,
            Scalar::all(255.0),
            imgproc::LINE_8,
            0,
            Point::new(0, 0),
        )?;

        let mut corners = Vector::<Point2f>::new();
        imgproc::good_features_to_track(
            gray,
            &mut corners,
            self.max_corners,
            self.quality_level,
            self.min_distance,
            &mask,
            self.block_size,
            false,
            0.04,
        )?;

        Ok(corners.iter().map(|p| (p.x, p.y)).collect())
    }

    /// One Lucas-Kanade step. Returns an update per input point; an empty
    /// input (or a tracker that produced no correspondences) yields an empty
    /// result, which the caller treats as a valid terminal state.
    pub fn track(
        &self,
        prev_gray: &Mat,
        gray: &Mat,
        points: &[(f32, f32)],
    ) -> Result<Vec<TrackUpdate>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let prev_pts =
            Vector::<Point2f>::from_iter(points.iter().map(|&(x, y)| Point2f::new(x, y)));
        let mut next_pts = Vector::<Point2f>::new();
        let mut status = Vector::<u8>::new();
        let mut err = Vector::<f32>::new();

        video::calc_optical_flow_pyr_lk(
            prev_gray,
            gray,
            &prev_pts,
            &mut next_pts,
            &mut status,
            &mut err,
            Size::new(self.win_size, self.win_size),
            self.max_level,
            self.criteria,
            0,
            1e-4,
        )?;

        let mut updates = Vec::with_capacity(next_pts.len());
        for i in 0..next_pts.len().min(status.len()) {
            let p = next_pts.get(i)?;
            updates.push(TrackUpdate {
                position: (p.x, p.y),
                valid: status.get(i)? != 0,
            });
        }
        Ok(updates)
    }
}
