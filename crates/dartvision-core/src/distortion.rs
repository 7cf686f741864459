use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Single-coefficient radial lens distortion with an approximated intrinsic:
/// focal length = frame width, principal point = frame center.
///
/// The coefficient is a configured constant per camera, not estimated.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RadialDistortion {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
}

impl RadialDistortion {
    /// Intrinsic approximation for a raw capture frame of the given size.
    pub fn for_frame(width: usize, height: usize, k1: f64) -> Self {
        Self {
            focal: width as f64,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            k1,
        }
    }

    /// Map an ideal (undistorted) pixel to its observed (distorted) position.
    pub fn distort(&self, p: Point2<f32>) -> Point2<f32> {
        let x = (p.x as f64 - self.cx) / self.focal;
        let y = (p.y as f64 - self.cy) / self.focal;
        let r2 = x * x + y * y;
        let d = 1.0 + self.k1 * r2;
        Point2::new(
            (x * d * self.focal + self.cx) as f32,
            (y * d * self.focal + self.cy) as f32,
        )
    }

    /// Map an observed pixel back to its ideal position by fixed-point
    /// iteration of the radial model.
    pub fn undistort(&self, p: Point2<f32>) -> Point2<f32> {
        let xd = (p.x as f64 - self.cx) / self.focal;
        let yd = (p.y as f64 - self.cy) / self.focal;
        let mut x = xd;
        let mut y = yd;
        for _ in 0..10 {
            let r2 = x * x + y * y;
            let d = 1.0 + self.k1 * r2;
            x = xd / d;
            y = yd / d;
        }
        Point2::new(
            (x * self.focal + self.cx) as f32,
            (y * self.focal + self.cy) as f32,
        )
    }
}
