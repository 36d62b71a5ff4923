// src/calibration.rs
//
// Calibration model: ROI polygon, pixel-to-feet ratio, and (discharge mode)
// the cross-section segment partition. Pure data, validated once at
// construction; shared read-only for the whole session.
//
// Coordinates are pixel coordinates at the processing resolution. The ROI is
// a quadrilateral marked top-left, top-right, bottom-right, bottom-left; the
// segment partition runs along the X axis (channel width axis).

use crate::error::CalibrationError;
use crate::types::CalibrationConfig;

#[derive(Debug, Clone, Copy)]
pub struct RoiPolygon {
    vertices: [(f32, f32); 4],
}

impl RoiPolygon {
    pub fn from_points(points: &[(f32, f32)]) -> Result<Self, CalibrationError> {
        let vertices: [(f32, f32); 4] = points
            .try_into()
            .map_err(|_| CalibrationError::RoiVertexCount(points.len()))?;
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[(f32, f32); 4] {
        &self.vertices
    }

    /// Side length along the X axis (channel width in pixels).
    pub fn width_px(&self) -> f32 {
        (self.vertices[1].0 - self.vertices[0].0).abs()
    }

    /// Side length along the Y axis.
    pub fn height_px(&self) -> f32 {
        (self.vertices[2].1 - self.vertices[1].1).abs()
    }

    /// Boundary-inclusive membership test (crossing number, with an explicit
    /// on-edge check so points exactly on the outline count as inside).
    pub fn contains(&self, point: (f32, f32)) -> bool {
        let (px, py) = point;
        let n = self.vertices.len();

        let mut inside = false;
        for i in 0..n {
            let (x1, y1) = self.vertices[i];
            let (x2, y2) = self.vertices[(i + 1) % n];

            if on_segment((x1, y1), (x2, y2), point) {
                return true;
            }

            if (y1 > py) != (y2 > py) {
                let x_cross = x1 + (py - y1) / (y2 - y1) * (x2 - x1);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn on_segment(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > 1e-3 {
        return false;
    }
    let dot = (p.0 - a.0) * (b.0 - a.0) + (p.1 - a.1) * (b.1 - a.1);
    let len_sq = (b.0 - a.0).powi(2) + (b.1 - a.1).powi(2);
    dot >= 0.0 && dot <= len_sq
}

/// Axis-aligned rectangle in pixel space, start = top-left, end = bottom-right.
#[derive(Debug, Clone, Copy)]
pub struct SegmentBounds {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl SegmentBounds {
    /// Edge-inclusive containment.
    pub fn contains(&self, point: (f32, f32)) -> bool {
        self.start.0 <= point.0
            && point.0 <= self.end.0
            && self.start.1 <= point.1
            && point.1 <= self.end.1
    }
}

/// One slice of the channel cross-section. Ids run 1..=n left to right.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub id: u32,
    pub bounds: SegmentBounds,
    pub area_sq_ft: f64,
}

#[derive(Debug, Clone)]
pub struct CalibrationModel {
    pub roi: RoiPolygon,
    pub ft_per_px: f64,
    pub segments: Vec<Segment>,
}

impl CalibrationModel {
    pub fn new(
        roi: RoiPolygon,
        ft_per_px: f64,
        segments: Vec<Segment>,
    ) -> Result<Self, CalibrationError> {
        let model = Self {
            roi,
            ft_per_px,
            segments,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn from_config(config: &CalibrationConfig) -> Result<Self, CalibrationError> {
        let points: Vec<(f32, f32)> = config.roi_points.iter().map(|p| (p[0], p[1])).collect();
        let roi = RoiPolygon::from_points(&points)?;

        let reference = [
            (config.reference_points[0][0], config.reference_points[0][1]),
            (config.reference_points[1][0], config.reference_points[1][1]),
        ];
        let ft_per_px = derive_ratio(reference, config.reference_distance_ft)?;

        let segments = match &config.discharge {
            Some(discharge) => partition_segments(
                &roi,
                discharge.channel_width_ft,
                &discharge.segment_depths_ft,
            )?,
            None => Vec::new(),
        };

        Self::new(roi, ft_per_px, segments)
    }

    /// First segment (in id order) whose bounds contain the position. The
    /// partition is non-overlapping by construction, so first-match is the
    /// unique match; positions outside every segment yield None.
    pub fn attribute_segment(&self, position: (f32, f32)) -> Option<u32> {
        self.segments
            .iter()
            .find(|segment| segment.bounds.contains(position))
            .map(|segment| segment.id)
    }

    fn validate(&self) -> Result<(), CalibrationError> {
        if self.ft_per_px <= 0.0 {
            return Err(CalibrationError::NonPositiveRatio(self.ft_per_px));
        }
        if !self.segments.is_empty() {
            if self.segments.len() % 2 == 0 {
                return Err(CalibrationError::SegmentCount(self.segments.len()));
            }
            for (i, segment) in self.segments.iter().enumerate() {
                if segment.id != i as u32 + 1 {
                    return Err(CalibrationError::NonContiguousSegmentIds(segment.id));
                }
                if segment.area_sq_ft <= 0.0 {
                    return Err(CalibrationError::NonPositiveArea {
                        id: segment.id,
                        area: segment.area_sq_ft,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Pixel-to-feet ratio from two marked points and the known real-world
/// distance between them.
pub fn derive_ratio(
    reference: [(f32, f32); 2],
    distance_ft: f64,
) -> Result<f64, CalibrationError> {
    let dx = (reference[0].0 - reference[1].0) as f64;
    let dy = (reference[0].1 - reference[1].1) as f64;
    let pixel_distance = (dx * dx + dy * dy).sqrt();
    if pixel_distance == 0.0 {
        return Err(CalibrationError::DegenerateReference);
    }
    let ratio = distance_ft / pixel_distance;
    if ratio <= 0.0 {
        return Err(CalibrationError::NonPositiveRatio(ratio));
    }
    Ok(ratio)
}

/// Partition the ROI into n equal-width segments along the X axis.
///
/// Segment width is an integer pixel count (truncating division), each
/// rectangle spans from the ROI's top-left row to its bottom-left row, and
/// areas come from per-segment depth times the per-segment share of the
/// channel top width.
pub fn partition_segments(
    roi: &RoiPolygon,
    channel_width_ft: f64,
    segment_depths_ft: &[f64],
) -> Result<Vec<Segment>, CalibrationError> {
    let n = segment_depths_ft.len();
    if n == 0 || n % 2 == 0 {
        return Err(CalibrationError::SegmentCount(n));
    }

    let vertices = roi.vertices();
    let segment_width_px = (roi.width_px() as i32 / n as i32) as f32;
    let segment_width_ft = channel_width_ft / n as f64;

    let x0 = vertices[0].0;
    let top_y = vertices[0].1;
    let bottom_y = vertices[3].1;

    let mut segments = Vec::with_capacity(n);
    for (i, depth_ft) in segment_depths_ft.iter().enumerate() {
        let start_x = x0 + i as f32 * segment_width_px;
        segments.push(Segment {
            id: i as u32 + 1,
            bounds: SegmentBounds {
                start: (start_x, top_y),
                end: (start_x + segment_width_px, bottom_y),
            },
            area_sq_ft: depth_ft * segment_width_ft,
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_roi() -> RoiPolygon {
        RoiPolygon::from_points(&[(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]).unwrap()
    }

    #[test]
    fn test_roi_requires_four_vertices() {
        let err = RoiPolygon::from_points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]).unwrap_err();
        assert_eq!(err, CalibrationError::RoiVertexCount(3));
    }

    #[test]
    fn test_roi_containment() {
        let roi = square_roi();
        assert!(roi.contains((50.0, 25.0)));
        assert!(roi.contains((0.0, 0.0)), "boundary points count as inside");
        assert!(roi.contains((100.0, 25.0)), "edge points count as inside");
        assert!(!roi.contains((150.0, 25.0)));
        assert!(!roi.contains((50.0, 60.0)));
    }

    #[test]
    fn test_ratio_from_reference_points() {
        // 200 px apart, 10 ft apart -> 0.05 ft per px
        let ratio = derive_ratio([(0.0, 0.0), (200.0, 0.0)], 10.0).unwrap();
        assert!((ratio - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_rejects_coincident_reference_points() {
        let err = derive_ratio([(10.0, 10.0), (10.0, 10.0)], 5.0).unwrap_err();
        assert_eq!(err, CalibrationError::DegenerateReference);
    }

    #[test]
    fn test_ratio_rejects_non_positive_distance() {
        let err = derive_ratio([(0.0, 0.0), (100.0, 0.0)], 0.0).unwrap_err();
        assert!(matches!(err, CalibrationError::NonPositiveRatio(_)));
    }

    #[test]
    fn test_partition_widths_use_truncating_division() {
        // 100 px across 3 segments -> 33 px each, remainder left uncovered
        let roi = square_roi();
        let segments = partition_segments(&roi, 30.0, &[1.0, 2.0, 1.0]).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].bounds.start.0, 0.0);
        assert_eq!(segments[0].bounds.end.0, 33.0);
        assert_eq!(segments[1].bounds.start.0, 33.0);
        assert_eq!(segments[2].bounds.end.0, 99.0);
    }

    #[test]
    fn test_partition_areas() {
        // 30 ft top width / 3 segments = 10 ft each; area = depth * 10
        let roi = square_roi();
        let segments = partition_segments(&roi, 30.0, &[1.0, 2.0, 1.0]).unwrap();
        assert!((segments[0].area_sq_ft - 10.0).abs() < 1e-9);
        assert!((segments[1].area_sq_ft - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_partition_rejects_even_segment_count() {
        let roi = square_roi();
        let err = partition_segments(&roi, 30.0, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, CalibrationError::SegmentCount(2));
    }

    #[test]
    fn test_model_rejects_non_positive_ratio() {
        let err = CalibrationModel::new(square_roi(), 0.0, Vec::new()).unwrap_err();
        assert!(matches!(err, CalibrationError::NonPositiveRatio(_)));
    }

    #[test]
    fn test_model_rejects_non_positive_area() {
        let roi = square_roi();
        let mut segments = partition_segments(&roi, 30.0, &[1.0, 2.0, 1.0]).unwrap();
        segments[1].area_sq_ft = 0.0;
        let err = CalibrationModel::new(roi, 0.05, segments).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::NonPositiveArea { id: 2, area: 0.0 }
        );
    }

    #[test]
    fn test_attribution_first_match_in_id_order() {
        let roi = square_roi();
        let segments = partition_segments(&roi, 30.0, &[1.0, 2.0, 1.0]).unwrap();
        let model = CalibrationModel::new(roi, 0.05, segments).unwrap();

        assert_eq!(model.attribute_segment((10.0, 25.0)), Some(1));
        assert_eq!(model.attribute_segment((40.0, 25.0)), Some(2));
        // Shared boundary belongs to the lower id (edge-inclusive, first match)
        assert_eq!(model.attribute_segment((33.0, 25.0)), Some(1));
        // Outside every rectangle (partition remainder) -> no segment
        assert_eq!(model.attribute_segment((99.5, 25.0)), None);
    }
}
