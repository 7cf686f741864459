//! Real-time multi-camera dart landing detection.
//!
//! Three fixed cameras watch the board from different angles. Each frame is
//! warped into a shared top-down canvas, gated against motion, and searched
//! for dart-shaped changes; per-camera tip candidates are then fused across
//! cameras, debounced, and mapped to a score. Confirmed landings and board
//! clearances are published over a bounded channel as [`VisionEvent`]s.
//!
//! The detection algorithms live in `dartvision-detect` and the geometric
//! primitives in `dartvision-core`; this crate adds the camera seam, the
//! perspective normalizer and the orchestrating loop.

pub mod camera;
pub mod events;
pub mod normalizer;
pub mod orchestrator;

pub use camera::{CaptureError, CaptureSettings, FrameSource};
pub use events::{event_channel, ConsumerGone, EventSender, HitEvent, VisionEvent};
pub use normalizer::PerspectiveNormalizer;
pub use orchestrator::{CameraConfig, Detector, DetectorHandle, VisionConfig};

pub use dartvision_core::{BoardGeometry, CalibrationError, CalibrationSet, GrayImage, Score};
pub use dartvision_detect::DetectParams;
