//! Detection algorithms for the dart vision pipeline.
//!
//! Everything in this crate is deterministic and side-effect free: detectors
//! take images (and, where debouncing matters, the cycle timestamp) as inputs
//! and return plain values, so every transition is unit-testable without
//! cameras or clocks.

mod contours;
mod fusion;
mod motion;
mod params;
mod takeout;
mod tip;

pub use contours::{external_contours, find_contours, Contour};
pub use fusion::{CameraCandidate, FusionEngine, FusionOutcome};
pub use motion::{FrameActivity, MotionGate};
pub use params::{DetectParams, FusionParams, MotionParams, TakeoutParams, TipParams};
pub use takeout::TakeoutDetector;
pub use tip::{TipCandidate, TipDetection, TipDetector};
