//! Core types and utilities for dart landing detection.
//!
//! This crate is intentionally small and purely geometric/pixel-level. It does
//! *not* depend on any camera backend or on the detection pipeline itself.

mod board;
mod calibration;
mod distortion;
mod homography;
mod image;
mod ops;

pub use board::{BoardGeometry, Score, SECTOR_ORDER};
pub use calibration::{CalibrationError, CalibrationSet};
pub use distortion::RadialDistortion;
pub use homography::{homography_from_4pt, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use ops::{
    absdiff, circle_mask, count_nonzero, gaussian_blur_5, mask_and, masked_diff_stats,
    morph_open_3, threshold_binary, DiffStats,
};
