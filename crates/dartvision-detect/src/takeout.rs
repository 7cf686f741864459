use dartvision_core::{
    absdiff, count_nonzero, gaussian_blur_5, mask_and, threshold_binary, GrayImage,
};

use crate::contours::external_contours;
use crate::params::TakeoutParams;

/// Per-camera takeout verification against a known-clean board image.
///
/// The clean reference is distinct from the motion gate's rolling reference:
/// it is captured only when the board is known to be dart-free, so a hit does
/// not leak into it.
#[derive(Clone, Debug, Default)]
pub struct TakeoutDetector {
    params: TakeoutParams,
    clean_board: Option<GrayImage>,
}

impl TakeoutDetector {
    pub fn new(params: TakeoutParams) -> Self {
        Self {
            params,
            clean_board: None,
        }
    }

    /// Record the dart-free board image.
    pub fn set_clean_board(&mut self, frame: GrayImage) {
        self.clean_board = Some(frame);
    }

    pub fn has_clean_board(&self) -> bool {
        self.clean_board.is_some()
    }

    /// Whether this camera sees the board back in its clean state.
    ///
    /// `tracking_hits` selects the check: while prior hits are tracked, any
    /// surviving contour above the area threshold means a dart is still
    /// present; in fresh state any aggregate difference above the pixel-count
    /// threshold means something foreign remains. Without a clean reference
    /// this conservatively reports "not removed".
    pub fn is_board_clean(&self, frame: &GrayImage, mask: &GrayImage, tracking_hits: bool) -> bool {
        let Some(clean) = &self.clean_board else {
            return false;
        };

        let diff = gaussian_blur_5(&absdiff(clean, frame));
        let thr = mask_and(&threshold_binary(&diff, self.params.diff_threshold), mask);

        if tracking_hits {
            !external_contours(&thr)
                .iter()
                .any(|c| c.area() > self.params.contour_min_area)
        } else {
            count_nonzero(&thr) <= self.params.fresh_pixel_count
        }
    }
}
