use dartvision_core::{
    absdiff, gaussian_blur_5, mask_and, morph_open_3, threshold_binary, BoardGeometry, GrayImage,
};
use nalgebra::{Matrix2, Point2, SymmetricEigen, Vector2};

use crate::contours::{external_contours, Contour};
use crate::params::TipParams;

/// One candidate dart tip seen by a single camera in a single cycle.
#[derive(Clone, Debug)]
pub struct TipCandidate {
    /// Tip coordinate in normalized board space.
    pub tip: Point2<f32>,
    pub area: f32,
    /// area x (100 / (tip_width + 1)); rewards large, narrow-tipped shapes.
    pub confidence: f32,
    /// Provisional sector from the tip angle.
    pub sector: u32,
    /// Tip beyond the outer double radius.
    pub is_missed: bool,
    /// Source contour, kept for diagnostics and overlays.
    pub contour: Contour,
}

/// Outcome of one camera's tip pass.
#[derive(Clone, Debug, Default)]
pub struct TipDetection {
    pub candidates: Vec<TipCandidate>,
    /// Largest raw contour area seen before shape filtering. A value far
    /// beyond any dart means a player is at the board.
    pub max_contour_area: f32,
}

/// Per-camera tip detector: change detection plus shape analysis.
#[derive(Clone, Debug, Default)]
pub struct TipDetector {
    params: TipParams,
    /// Toggled globally by the cross-camera pre-pass each cycle.
    pub high_sensitivity: bool,
}

impl TipDetector {
    pub fn new(params: TipParams) -> Self {
        Self {
            params,
            high_sensitivity: false,
        }
    }

    /// Analyze one stable frame against the rolling reference.
    pub fn detect(
        &self,
        frame: &GrayImage,
        reference: &GrayImage,
        mask: &GrayImage,
        board: &BoardGeometry,
    ) -> TipDetection {
        let (threshold, min_area) = if self.high_sensitivity {
            (
                self.params.high_sensitivity_threshold,
                self.params.high_sensitivity_min_area,
            )
        } else {
            (self.params.threshold, self.params.min_area)
        };

        let diff = absdiff(frame, reference);
        let blurred = gaussian_blur_5(&diff);
        let thr = morph_open_3(&mask_and(&threshold_binary(&blurred, threshold), mask));

        let mut raw = Vec::new();
        let mut max_contour_area = 0.0_f32;
        for contour in external_contours(&thr) {
            let area = contour.area();
            max_contour_area = max_contour_area.max(area);
            if area < min_area || contour.points.len() < self.params.min_contour_points {
                continue;
            }
            if let Some(candidate) = self.analyze_contour(contour, area, board) {
                raw.push(candidate);
            }
        }

        TipDetection {
            candidates: self.merge_candidates(raw),
            max_contour_area,
        }
    }

    /// Principal-axis shape analysis of one contour: split the boundary into
    /// the two halves about the centroid, judge the half that is thinner
    /// across the axis as the tip end, reject shapes that are thick on both
    /// ends. Thickness is measured perpendicular to the axis so the length
    /// of a half never counts against it.
    fn analyze_contour(
        &self,
        contour: Contour,
        area: f32,
        board: &BoardGeometry,
    ) -> Option<TipCandidate> {
        let (mean, axis) = principal_axis(&contour.points)?;
        let perp = Vector2::new(-axis.y, axis.x);

        let mut min_proj = f32::MAX;
        let mut max_proj = f32::MIN;
        let mut neg_half = Vec::new();
        let mut pos_half = Vec::new();
        for p in &contour.points {
            let d = p - mean;
            let proj = d.dot(&axis);
            min_proj = min_proj.min(proj);
            max_proj = max_proj.max(proj);
            if proj < 0.0 {
                neg_half.push(d.dot(&perp));
            } else if proj > 0.0 {
                pos_half.push(d.dot(&perp));
            }
        }
        if neg_half.len() < 2 || pos_half.len() < 2 {
            return None;
        }

        let width_neg = cross_axis_span(&neg_half);
        let width_pos = cross_axis_span(&pos_half);
        if width_neg > self.params.wide_half_limit && width_pos > self.params.wide_half_limit {
            return None;
        }

        let (tip, tip_width) = if width_neg < width_pos {
            (mean + axis * min_proj, width_neg)
        } else {
            (mean + axis * max_proj, width_pos)
        };

        let center = board.center();
        let dx = (tip.x - center.x) as f64;
        let dy = (tip.y - center.y) as f64;
        let dist = (dx * dx + dy * dy).sqrt();
        let angle = (-dy).atan2(dx).to_degrees().rem_euclid(360.0);

        Some(TipCandidate {
            tip,
            area,
            confidence: area * (100.0 / (tip_width + 1.0)),
            sector: board.sector_at_angle(angle),
            is_missed: dist > board.outer_radius(),
            contour,
        })
    }

    /// Collapse fragmented detections of the same physical dart: candidates
    /// with tips inside the merge radius keep only the most confident one.
    fn merge_candidates(&self, raw: Vec<TipCandidate>) -> Vec<TipCandidate> {
        let mut merged: Vec<TipCandidate> = Vec::new();
        for candidate in raw {
            match merged
                .iter_mut()
                .find(|m| (m.tip - candidate.tip).norm() < self.params.merge_radius)
            {
                Some(existing) => {
                    if candidate.confidence > existing.confidence {
                        *existing = candidate;
                    }
                }
                None => merged.push(candidate),
            }
        }
        merged
    }
}

/// Centroid and dominant eigenvector of the boundary point cloud.
fn principal_axis(points: &[Point2<f32>]) -> Option<(Point2<f32>, Vector2<f32>)> {
    let n = points.len();
    if n < 2 {
        return None;
    }

    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in points {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= n as f64;
    cy /= n as f64;

    let mut sxx = 0.0_f64;
    let mut sxy = 0.0_f64;
    let mut syy = 0.0_f64;
    for p in points {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    sxx /= n as f64;
    sxy /= n as f64;
    syy /= n as f64;

    let eigen = SymmetricEigen::new(Matrix2::new(sxx, sxy, sxy, syy));
    let dominant = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
        0
    } else {
        1
    };
    let v = eigen.eigenvectors.column(dominant);
    let axis = Vector2::new(v[0] as f32, v[1] as f32);
    if axis.norm() < 1e-6 {
        return None;
    }

    Some((Point2::new(cx as f32, cy as f32), axis.normalize()))
}

/// Extent of one half's boundary across the principal axis, from its
/// perpendicular offsets.
fn cross_axis_span(offsets: &[f32]) -> f32 {
    let mut min = offsets[0];
    let mut max = offsets[0];
    for &v in offsets {
        min = min.min(v);
        max = max.max(v);
    }
    max - min
}
