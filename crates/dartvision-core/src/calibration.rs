use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Errors loading a per-camera calibration file.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("calibration file could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("calibration file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected exactly 4 calibration points, got {got}")]
    WrongPointCount { got: usize },
}

#[derive(Serialize, Deserialize)]
struct CalibrationFile {
    points: Vec<[f32; 2]>,
}

/// Four image-space reference points of the board, in the fixed click order
/// top, right, bottom, left. Immutable once loaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationSet {
    points: [Point2<f32>; 4],
}

impl CalibrationSet {
    pub fn new(points: [Point2<f32>; 4]) -> Self {
        Self { points }
    }

    /// The points in top/right/bottom/left order.
    pub fn points(&self) -> &[Point2<f32>; 4] {
        &self.points
    }

    /// Conventional file name for a camera's calibration, as written by the
    /// external calibration tool.
    pub fn file_name(camera_id: usize) -> String {
        format!("cam{camera_id}_config.json")
    }

    pub fn path_for_camera(dir: &Path, camera_id: usize) -> PathBuf {
        dir.join(Self::file_name(camera_id))
    }

    /// Load from a JSON file of the form `{"points": [[x, y]; 4]}`.
    pub fn load(path: &Path) -> Result<Self, CalibrationError> {
        let raw = fs::read_to_string(path)?;
        let file: CalibrationFile = serde_json::from_str(&raw)?;
        if file.points.len() != 4 {
            return Err(CalibrationError::WrongPointCount {
                got: file.points.len(),
            });
        }
        let mut points = [Point2::origin(); 4];
        for (dst, src) in points.iter_mut().zip(&file.points) {
            *dst = Point2::new(src[0], src[1]);
        }
        Ok(Self { points })
    }

    pub fn save(&self, path: &Path) -> Result<(), CalibrationError> {
        let file = CalibrationFile {
            points: self.points.iter().map(|p| [p.x, p.y]).collect(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = CalibrationSet::path_for_camera(dir.path(), 1);

        let set = CalibrationSet::new([
            Point2::new(960.0, 120.0),
            Point2::new(1700.0, 540.0),
            Point2::new(960.0, 980.0),
            Point2::new(220.0, 540.0),
        ]);
        set.save(&path).unwrap();

        let loaded = CalibrationSet::load(&path).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam0_config.json");
        fs::write(&path, r#"{"points": [[1.0, 2.0], [3.0, 4.0]]}"#).unwrap();

        match CalibrationSet::load(&path) {
            Err(CalibrationError::WrongPointCount { got }) => assert_eq!(got, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam7_config.json");
        assert!(matches!(
            CalibrationSet::load(&path),
            Err(CalibrationError::Io(_))
        ));
    }
}
