use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Canonical clockwise sector sequence, indexed from the segment centered at
/// angle 0 (east, image coordinates with inverted Y).
pub const SECTOR_ORDER: [u32; 20] = [
    6, 13, 4, 18, 1, 20, 5, 12, 9, 14, 11, 8, 16, 7, 19, 3, 17, 2, 15, 10,
];

/// Final score of a single dart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub sector: u32,
    pub multiplier: u32,
    pub is_missed: bool,
}

impl Score {
    pub fn missed() -> Self {
        Self {
            sector: 0,
            multiplier: 1,
            is_missed: true,
        }
    }

    pub fn value(&self) -> u32 {
        if self.is_missed {
            0
        } else {
            self.sector * self.multiplier
        }
    }
}

/// Fixed dartboard geometry on the warped canvas.
///
/// All radii are standard tournament dimensions in millimeters, scaled by the
/// canvas millimeter-to-pixel ratio. The triple band is shrunk 1 mm inward on
/// both edges to counter warp-induced radial stretch at the wire boundaries.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoardGeometry {
    pub canvas_size: usize,
    /// Fraction of the canvas radius occupied by the outer double ring.
    pub usage_factor: f64,
    /// Rotational correction applied to the measured angle, in degrees.
    pub angle_offset_deg: f64,
    mm_to_px: f64,
    bull: f64,
    outer_bull: f64,
    triple_inner: f64,
    triple_outer: f64,
    double_inner: f64,
    double_outer: f64,
}

const BOARD_RADIUS_MM: f64 = 170.0;
const RING_WIDTH_MM: f64 = 8.0;
const TRIPLE_OUTER_MM: f64 = 107.0;
const TRIPLE_SHRINK_MM: f64 = 1.0;
const BULL_MM: f64 = 6.35;
const OUTER_BULL_MM: f64 = 15.9;
const MASK_RADIUS_MM: f64 = 175.0;

impl BoardGeometry {
    pub fn new(canvas_size: usize, usage_factor: f64, angle_offset_deg: f64) -> Self {
        let mm_to_px = (canvas_size as f64 / 2.0) * usage_factor / BOARD_RADIUS_MM;
        Self {
            canvas_size,
            usage_factor,
            angle_offset_deg,
            mm_to_px,
            bull: BULL_MM * mm_to_px,
            outer_bull: OUTER_BULL_MM * mm_to_px,
            triple_outer: (TRIPLE_OUTER_MM - TRIPLE_SHRINK_MM) * mm_to_px,
            triple_inner: (TRIPLE_OUTER_MM - RING_WIDTH_MM - TRIPLE_SHRINK_MM) * mm_to_px,
            double_outer: BOARD_RADIUS_MM * mm_to_px,
            double_inner: (BOARD_RADIUS_MM - RING_WIDTH_MM) * mm_to_px,
        }
    }

    pub fn mm_to_px(&self) -> f64 {
        self.mm_to_px
    }

    pub fn center(&self) -> Point2<f32> {
        let c = self.canvas_size as f32 / 2.0;
        Point2::new(c, c)
    }

    /// Outer double radius in canvas pixels; anything beyond is a miss.
    pub fn outer_radius(&self) -> f64 {
        self.double_outer
    }

    /// Mask radius in canvas pixels, slightly larger than the board so the
    /// background beyond the double ring is ignored.
    pub fn mask_radius(&self) -> f64 {
        MASK_RADIUS_MM * self.mm_to_px
    }

    /// Sector under the segment containing `angle_deg` (measured with
    /// atan2(-dy, dx), normalized to [0, 360)).
    pub fn sector_at_angle(&self, angle_deg: f64) -> u32 {
        let a = (angle_deg + self.angle_offset_deg).rem_euclid(360.0);
        SECTOR_ORDER[(((a + 9.0) / 18.0) as usize) % 20]
    }

    /// Map a canvas coordinate to (sector, multiplier, missed).
    ///
    /// Pure function of distance and angle relative to the board center.
    pub fn score(&self, p: Point2<f32>) -> Score {
        let c = self.center();
        let dx = (p.x - c.x) as f64;
        let dy = (p.y - c.y) as f64;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > self.double_outer {
            return Score::missed();
        }

        // Image coordinates grow downward, so the Y axis is inverted here.
        let angle = (-dy).atan2(dx).to_degrees().rem_euclid(360.0);
        let sector = self.sector_at_angle(angle);

        let (sector, multiplier) = if dist <= self.bull {
            (25, 2)
        } else if dist <= self.outer_bull {
            (25, 1)
        } else if dist >= self.triple_inner && dist <= self.triple_outer {
            (sector, 3)
        } else if dist >= self.double_inner {
            (sector, 2)
        } else {
            (sector, 1)
        };

        Score {
            sector,
            multiplier,
            is_missed: false,
        }
    }
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self::new(1000, 0.70, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> BoardGeometry {
        BoardGeometry::default()
    }

    fn at(dist: f64, angle_deg: f64) -> Point2<f32> {
        let c = 500.0_f64;
        let a = angle_deg.to_radians();
        Point2::new((c + dist * a.cos()) as f32, (c - dist * a.sin()) as f32)
    }

    #[test]
    fn center_is_double_bull() {
        let s = geom().score(Point2::new(500.0, 500.0));
        assert_eq!(s.sector, 25);
        assert_eq!(s.multiplier, 2);
        assert!(!s.is_missed);
    }

    #[test]
    fn outer_bull_band() {
        let g = geom();
        let s = g.score(at(10.0 * g.mm_to_px(), 45.0));
        assert_eq!(s.sector, 25);
        assert_eq!(s.multiplier, 1);
    }

    #[test]
    fn just_outside_double_ring_is_missed() {
        let g = geom();
        let s = g.score(at(g.outer_radius() + 0.5, 10.0));
        assert!(s.is_missed);
        assert_eq!(s.sector, 0);
        assert_eq!(s.multiplier, 1);
        assert_eq!(s.value(), 0);
    }

    #[test]
    fn just_inside_double_ring_scores_double() {
        let g = geom();
        let s = g.score(at(g.outer_radius() - 0.5, 0.0));
        assert!(!s.is_missed);
        assert_eq!(s.sector, 6); // segment centered at angle 0
        assert_eq!(s.multiplier, 2);
    }

    #[test]
    fn triple_band_scores_triple() {
        let g = geom();
        let s = g.score(at(102.0 * g.mm_to_px(), 0.0));
        assert_eq!(s.sector, 6);
        assert_eq!(s.multiplier, 3);
        assert_eq!(s.value(), 18);
    }

    #[test]
    fn sector_twenty_is_at_top() {
        let g = geom();
        // top of the image = angle 90 with inverted Y
        let s = g.score(at(60.0 * g.mm_to_px(), 90.0));
        assert_eq!(s.sector, 20);
        assert_eq!(s.multiplier, 1);
    }

    #[test]
    fn sector_three_is_at_bottom() {
        let g = geom();
        let s = g.score(at(60.0 * g.mm_to_px(), 270.0));
        assert_eq!(s.sector, 3);
    }

    #[test]
    fn sector_boundaries_rotate_clockwise() {
        let g = geom();
        // 18 degrees counterclockwise of sector 20 lies sector 5
        assert_eq!(g.sector_at_angle(108.0), 5);
        // and 18 degrees clockwise lies sector 1
        assert_eq!(g.sector_at_angle(72.0), 1);
    }

    #[test]
    fn angle_offset_rotates_mapping() {
        let rotated = BoardGeometry::new(1000, 0.70, 18.0);
        // with an 18 degree correction the segment at angle 0 shifts by one
        assert_eq!(rotated.sector_at_angle(0.0), 13);
    }

    #[test]
    fn mapping_is_deterministic() {
        let g = geom();
        let p = at(120.0, 33.0);
        assert_eq!(g.score(p), g.score(p));
    }
}
