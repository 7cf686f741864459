use dartvision_core::{absdiff, mask_and, masked_diff_stats, threshold_binary, GrayImage};

use crate::contours::external_contours;
use crate::params::MotionParams;

/// Classification of one warped frame relative to the rolling reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameActivity {
    /// Safe to analyze for tips.
    Stable,
    /// The board image is still changing (in-flight dart, vibration); the
    /// frame must be excluded from tip detection this cycle.
    InMotion,
}

/// Per-camera freeze/motion gate over a rolling grayscale reference.
#[derive(Clone, Debug, Default)]
pub struct MotionGate {
    params: MotionParams,
    reference: Option<GrayImage>,
}

impl MotionGate {
    pub fn new(params: MotionParams) -> Self {
        Self {
            params,
            reference: None,
        }
    }

    pub fn set_reference(&mut self, frame: GrayImage) {
        self.reference = Some(frame);
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    /// Gate one frame. Mean difference above the low threshold with max below
    /// the high threshold means diffuse change: motion blur, not a new
    /// object. Without a reference every frame counts as stable.
    pub fn classify(&self, frame: &GrayImage, mask: &GrayImage) -> FrameActivity {
        let Some(reference) = &self.reference else {
            return FrameActivity::Stable;
        };
        let diff = absdiff(frame, reference);
        let stats = masked_diff_stats(&diff, mask);
        if stats.mean > self.params.freeze_mean && stats.max < self.params.freeze_max {
            FrameActivity::InMotion
        } else {
            FrameActivity::Stable
        }
    }

    /// Cheap pre-pass: does this camera see any coarse change at all?
    /// Drives the global sensitivity mode without running shape analysis.
    pub fn coarse_change(&self, frame: &GrayImage, mask: &GrayImage) -> bool {
        let Some(reference) = &self.reference else {
            return false;
        };
        let diff = absdiff(frame, reference);
        let thr = mask_and(&threshold_binary(&diff, self.params.coarse_threshold), mask);
        external_contours(&thr)
            .iter()
            .any(|c| c.area() > self.params.coarse_min_area)
    }
}
