use serde::{Deserialize, Serialize};

/// Freeze/motion gate thresholds.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct MotionParams {
    /// Mean masked difference above which the board counts as changing.
    pub freeze_mean: f64,
    /// Max masked difference below which the change counts as diffuse
    /// (blurred motion rather than a sharp new object).
    pub freeze_max: u8,
    /// Threshold for the cheap cross-camera pre-pass difference.
    pub coarse_threshold: u8,
    /// Contour area above which the pre-pass reports a coarse change.
    pub coarse_min_area: f32,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            freeze_mean: 10.0,
            freeze_max: 50,
            coarse_threshold: 40,
            coarse_min_area: 200.0,
        }
    }
}

/// Tip detector thresholds. The threshold/min-area pair switches with the
/// global sensitivity mode.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TipParams {
    pub threshold: u8,
    pub min_area: f32,
    /// Tighter pair used while any camera sees a coarse change.
    pub high_sensitivity_threshold: u8,
    pub high_sensitivity_min_area: f32,
    /// A contour whose both halves exceed this width is not dart-shaped.
    pub wide_half_limit: f32,
    /// Candidates with tips closer than this are the same physical dart.
    pub merge_radius: f32,
    /// Minimum boundary points for a meaningful principal axis.
    pub min_contour_points: usize,
}

impl Default for TipParams {
    fn default() -> Self {
        Self {
            threshold: 50,
            min_area: 150.0,
            high_sensitivity_threshold: 25,
            high_sensitivity_min_area: 50.0,
            wide_half_limit: 30.0,
            merge_radius: 50.0,
            min_contour_points: 5,
        }
    }
}

/// Takeout detector thresholds.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TakeoutParams {
    pub diff_threshold: u8,
    /// While hits are tracked: a surviving contour above this area means a
    /// dart is still present.
    pub contour_min_area: f32,
    /// Fresh state: aggregate nonzero difference above this pixel count means
    /// something foreign remains.
    pub fresh_pixel_count: usize,
}

impl Default for TakeoutParams {
    fn default() -> Self {
        Self {
            diff_threshold: 40,
            contour_min_area: 1200.0,
            fresh_pixel_count: 4000,
        }
    }
}

/// Fusion & debounce engine thresholds.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct FusionParams {
    /// Minimum number of cameras contributing a candidate.
    pub min_cameras: usize,
    /// Candidates farther than this from the median are outliers; the two
    /// best survivors must also agree within this distance.
    pub outlier_distance: f32,
    /// At most this many top-confidence survivors enter the weighted average.
    pub max_fused: usize,
    /// Positional stability radius for consecutive-cycle confirmation.
    pub stability_radius: f32,
    /// Maximum age of the buffered provisional point, seconds.
    pub stability_window_s: f64,
    /// A confirmed point this close to the last emitted hit is the same dart.
    pub duplicate_radius: f32,
    /// Per-camera candidates below this confidence are ignored.
    pub min_confidence: f32,
    /// Per-camera candidates below this area are ignored.
    pub min_area: f32,
    /// A contour this large (and confident) is a player at the board, not a
    /// dart: arm the takeout wait instead.
    pub takeout_arm_area: f32,
    pub takeout_arm_confidence: f32,
    /// Minimum time between accepting hits, seconds.
    pub min_inter_hit_s: f64,
    /// Consecutive quiet cycles before the fallback reference reset.
    pub quiet_cycle_limit: u32,
    /// Max candidate area below which a cycle counts as quiet.
    pub quiet_max_area: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            min_cameras: 2,
            outlier_distance: 150.0,
            max_fused: 3,
            stability_radius: 20.0,
            stability_window_s: 0.2,
            duplicate_radius: 40.0,
            min_confidence: 3000.0,
            min_area: 300.0,
            takeout_arm_area: 25_000.0,
            takeout_arm_confidence: 25_000.0,
            min_inter_hit_s: 0.3,
            quiet_cycle_limit: 15,
            quiet_max_area: 500.0,
        }
    }
}

/// All detection parameters, serializable as one document.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectParams {
    pub motion: MotionParams,
    pub tip: TipParams,
    pub takeout: TakeoutParams,
    pub fusion: FusionParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_serde_round_trip() {
        let params = DetectParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let back: DetectParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fusion.min_cameras, params.fusion.min_cameras);
        assert_eq!(back.tip.threshold, params.tip.threshold);
    }

    #[test]
    fn partial_documents_fall_back_to_defaults() {
        let parsed: DetectParams =
            serde_json::from_str(r#"{"fusion": {"min_cameras": 3, "outlier_distance": 150.0,
                "max_fused": 3, "stability_radius": 20.0, "stability_window_s": 0.2,
                "duplicate_radius": 40.0, "min_confidence": 3000.0, "min_area": 300.0,
                "takeout_arm_area": 25000.0, "takeout_arm_confidence": 25000.0,
                "min_inter_hit_s": 0.3, "quiet_cycle_limit": 15, "quiet_max_area": 500.0}}"#)
                .unwrap();
        assert_eq!(parsed.fusion.min_cameras, 3);
        assert_eq!(parsed.tip.threshold, TipParams::default().threshold);
    }
}
