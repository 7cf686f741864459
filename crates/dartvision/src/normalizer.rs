use nalgebra::Point2;

use dartvision_core::{
    homography_from_4pt, sample_bilinear_u8, BoardGeometry, CalibrationSet, GrayImage, Homography,
    RadialDistortion,
};

/// Maps raw camera frames into the shared top-down board canvas.
///
/// The warp composes two models estimated once per calibration: the radial
/// lens correction and the plane homography pinned by the four reference
/// points. Sampling runs the composition backwards, canvas pixel to raw
/// pixel, so no forward-mapping holes appear.
#[derive(Clone, Debug)]
pub struct PerspectiveNormalizer {
    distortion: RadialDistortion,
    /// Canvas coordinates to ideal (undistorted) frame coordinates.
    canvas_to_frame: Homography,
    canvas_size: usize,
}

impl PerspectiveNormalizer {
    /// Estimate the warp from a camera's calibration points.
    ///
    /// The four points are undistorted first, then matched to the compass
    /// targets where the board's top/right/bottom/left double-ring edges land
    /// on the canvas. Returns `None` when the points are degenerate.
    pub fn from_calibration(
        calibration: &CalibrationSet,
        frame_width: usize,
        frame_height: usize,
        k1: f64,
        board: &BoardGeometry,
    ) -> Option<Self> {
        let distortion = RadialDistortion::for_frame(frame_width, frame_height, k1);

        let src = calibration.points();
        let ideal = [
            distortion.undistort(src[0]),
            distortion.undistort(src[1]),
            distortion.undistort(src[2]),
            distortion.undistort(src[3]),
        ];

        let c = board.canvas_size as f32 / 2.0;
        let r = c * board.usage_factor as f32;
        let targets = [
            Point2::new(c, c - r),
            Point2::new(c + r, c),
            Point2::new(c, c + r),
            Point2::new(c - r, c),
        ];

        let frame_to_canvas = homography_from_4pt(&ideal, &targets)?;
        let canvas_to_frame = frame_to_canvas.inverse()?;

        Some(Self {
            distortion,
            canvas_to_frame,
            canvas_size: board.canvas_size,
        })
    }

    pub fn canvas_size(&self) -> usize {
        self.canvas_size
    }

    /// Warp one raw frame onto the canvas. Canvas pixels that fall outside
    /// the frame sample as black.
    pub fn normalize(&self, frame: &GrayImage) -> GrayImage {
        let mut out = GrayImage::new(self.canvas_size, self.canvas_size);
        let view = frame.view();
        for y in 0..self.canvas_size {
            for x in 0..self.canvas_size {
                let ideal = self
                    .canvas_to_frame
                    .apply(Point2::new(x as f32 + 0.5, y as f32 + 0.5));
                let raw = self.distortion.distort(ideal);
                out.set(x, y, sample_bilinear_u8(&view, raw.x, raw.y));
            }
        }
        out
    }
}
