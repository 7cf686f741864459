use serde::{Deserialize, Serialize};

use dartvision_core::GrayImage;

/// Errors a capture backend can report.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("camera could not be opened: {0}")]
    Open(String),
    #[error("camera stopped delivering frames")]
    NoFrame,
    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Capture settings pushed to every camera at startup.
///
/// The fixed low exposure keeps the board image dark and stable so a dart
/// shows up as a sharp local change rather than a lighting shift.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
    pub exposure: i32,
    pub gain: i32,
    pub brightness: i32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            exposure: -7,
            gain: 10,
            brightness: 150,
        }
    }
}

/// Abstraction over a frame producer: a live camera, a video file, or a
/// directory of still frames for replay.
pub trait FrameSource {
    /// Apply capture settings. Sources that have no controls (replay) keep
    /// the default no-op.
    fn configure(&mut self, _settings: &CaptureSettings) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Produce the next grayscale frame.
    fn read(&mut self) -> Result<GrayImage, CaptureError>;

    /// Release the underlying device. Default no-op.
    fn release(&mut self) {}
}
