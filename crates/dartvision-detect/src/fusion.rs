use log::debug;
use nalgebra::Point2;

use crate::params::FusionParams;

/// Best tip estimate from one camera for one cycle.
#[derive(Clone, Copy, Debug)]
pub struct CameraCandidate {
    pub camera: usize,
    pub tip: Point2<f32>,
    pub area: f32,
    pub confidence: f32,
}

/// Result of one fusion cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FusionOutcome {
    /// Not enough cameras, outlier spread too wide, or the two best
    /// candidates disagree. The cycle is simply skipped.
    NoConsensus,
    /// A fused point exists but has not yet been stable long enough; the
    /// provisional buffer was updated.
    Unstable,
    /// The fused point matches the last emitted hit: the same physical dart,
    /// already reported.
    Duplicate,
    /// A confirmed, spatially distinct hit at this board coordinate.
    Hit(Point2<f32>),
}

/// Cross-camera fusion with outlier rejection, temporal debouncing and
/// duplicate suppression.
///
/// The engine never reads a clock: callers pass the cycle timestamp (seconds,
/// any monotonic origin), which keeps every transition deterministic.
#[derive(Clone, Debug)]
pub struct FusionEngine {
    params: FusionParams,
    /// Provisional fused point awaiting a confirming cycle.
    candidate: Option<(Point2<f32>, f64)>,
    last_hit: Option<Point2<f32>>,
    last_hit_time: f64,
}

impl FusionEngine {
    pub fn new(params: FusionParams) -> Self {
        Self {
            params,
            candidate: None,
            last_hit: None,
            last_hit_time: f64::NEG_INFINITY,
        }
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Minimum inter-hit gate: candidate collection stays closed for a short
    /// time after an accepted hit, regardless of fusion outcome.
    pub fn collection_open(&self, now: f64) -> bool {
        now - self.last_hit_time > self.params.min_inter_hit_s
    }

    /// Drop the provisional buffer (called when the board is in motion).
    pub fn clear_candidate(&mut self) {
        self.candidate = None;
    }

    pub fn last_hit(&self) -> Option<Point2<f32>> {
        self.last_hit
    }

    /// Record an emitted hit for duplicate suppression and throttling.
    pub fn record_hit(&mut self, point: Point2<f32>, now: f64) {
        self.last_hit = Some(point);
        self.last_hit_time = now;
        self.candidate = None;
    }

    /// Forget the last hit (called once removal is confirmed).
    pub fn clear_last_hit(&mut self) {
        self.last_hit = None;
        self.candidate = None;
    }

    /// Run one fusion cycle over the per-camera candidates.
    pub fn fuse(&mut self, candidates: &[CameraCandidate], now: f64) -> FusionOutcome {
        if candidates.len() < self.params.min_cameras {
            return FusionOutcome::NoConsensus;
        }

        // Coordinate-wise median across all candidate tips.
        let median = median_point(candidates);

        // Outlier rejection: glare or shadow on one camera lands far from
        // the consensus.
        let mut survivors: Vec<&CameraCandidate> = candidates
            .iter()
            .filter(|c| (c.tip - median).norm() < self.params.outlier_distance)
            .collect();
        if survivors.len() < self.params.min_cameras {
            debug!(
                "fusion: {} of {} candidates within {} of median, skipping cycle",
                survivors.len(),
                candidates.len(),
                self.params.outlier_distance
            );
            return FusionOutcome::NoConsensus;
        }

        survivors.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        // The two most confident survivors must agree before anything else.
        let spread = (survivors[0].tip - survivors[1].tip).norm();
        if spread >= self.params.outlier_distance {
            debug!("fusion: top candidates {spread:.1} apart, cameras disagree");
            return FusionOutcome::NoConsensus;
        }

        let fused = weighted_average(&survivors[..survivors.len().min(self.params.max_fused)]);

        // Temporal stability gate.
        match self.candidate {
            Some((prev, t0))
                if (fused - prev).norm() < self.params.stability_radius
                    && now - t0 < self.params.stability_window_s =>
            {
                // confirmed below
            }
            _ => {
                self.candidate = Some((fused, now));
                return FusionOutcome::Unstable;
            }
        }

        // Duplicate suppression against the last emitted hit.
        if let Some(last) = self.last_hit {
            if (fused - last).norm() < self.params.duplicate_radius {
                return FusionOutcome::Duplicate;
            }
        }

        FusionOutcome::Hit(fused)
    }
}

fn median_point(candidates: &[CameraCandidate]) -> Point2<f32> {
    let mut xs: Vec<f32> = candidates.iter().map(|c| c.tip.x).collect();
    let mut ys: Vec<f32> = candidates.iter().map(|c| c.tip.y).collect();
    xs.sort_by(f32::total_cmp);
    ys.sort_by(f32::total_cmp);
    Point2::new(median_sorted(&xs), median_sorted(&ys))
}

fn median_sorted(v: &[f32]) -> f32 {
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

fn weighted_average(survivors: &[&CameraCandidate]) -> Point2<f32> {
    let mut wx = 0.0_f64;
    let mut wy = 0.0_f64;
    let mut wsum = 0.0_f64;
    for c in survivors {
        let w = c.confidence as f64;
        wx += c.tip.x as f64 * w;
        wy += c.tip.y as f64 * w;
        wsum += w;
    }
    Point2::new((wx / wsum) as f32, (wy / wsum) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cand(camera: usize, x: f32, y: f32, confidence: f32) -> CameraCandidate {
        CameraCandidate {
            camera,
            tip: Point2::new(x, y),
            area: 500.0,
            confidence,
        }
    }

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionParams::default())
    }

    #[test]
    fn weighted_average_weights_by_confidence() {
        let a = cand(0, 300.0, 300.0, 5000.0);
        let b = cand(1, 304.0, 300.0, 4000.0);
        let p = weighted_average(&[&a, &b]);
        // (300*5000 + 304*4000) / 9000
        assert_abs_diff_eq!(p.x, 301.7778, epsilon = 1e-3);
        assert_abs_diff_eq!(p.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn single_camera_never_produces_a_hit() {
        let mut eng = engine();
        let c = [cand(0, 500.0, 500.0, 1e9)];
        for cycle in 0..100 {
            assert_eq!(
                eng.fuse(&c, cycle as f64 * 0.05),
                FusionOutcome::NoConsensus
            );
        }
    }

    #[test]
    fn two_agreeing_cameras_confirm_after_a_stable_cycle() {
        let mut eng = engine();
        let c = [cand(0, 300.0, 400.0, 5000.0), cand(1, 304.0, 402.0, 4000.0)];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::Unstable);
        match eng.fuse(&c, 0.1) {
            FusionOutcome::Hit(p) => {
                assert!((p.x - 302.0).abs() < 3.0);
                assert!((p.y - 401.0).abs() < 3.0);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn outlier_is_discarded_and_the_rest_agree() {
        let mut eng = engine();
        let c = [
            cand(0, 300.0, 300.0, 5000.0),
            cand(1, 306.0, 298.0, 4500.0),
            cand(2, 800.0, 900.0, 9000.0), // glare on camera 2
        ];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::Unstable);
        match eng.fuse(&c, 0.1) {
            FusionOutcome::Hit(p) => {
                // the outlier contributes nothing despite its confidence
                assert!((p.x - 303.0).abs() < 4.0);
                assert!((p.y - 299.0).abs() < 4.0);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn disagreeing_cameras_abort_the_cycle() {
        let mut eng = engine();
        // all three survive the median cut (within 150 of x=340), but the
        // two most confident candidates are 180 apart
        let c = [
            cand(0, 250.0, 300.0, 9000.0),
            cand(1, 430.0, 300.0, 8000.0),
            cand(2, 340.0, 300.0, 100.0),
        ];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::NoConsensus);
    }

    #[test]
    fn transient_jump_resets_the_stability_buffer() {
        let mut eng = engine();
        let a = [cand(0, 300.0, 300.0, 5000.0), cand(1, 302.0, 300.0, 4000.0)];
        let b = [cand(0, 600.0, 600.0, 5000.0), cand(1, 602.0, 600.0, 4000.0)];
        assert_eq!(eng.fuse(&a, 0.00), FusionOutcome::Unstable);
        // a transient somewhere else re-seeds the buffer instead of hitting
        assert_eq!(eng.fuse(&b, 0.05), FusionOutcome::Unstable);
        assert_eq!(eng.fuse(&a, 0.10), FusionOutcome::Unstable);
        assert!(matches!(eng.fuse(&a, 0.15), FusionOutcome::Hit(_)));
    }

    #[test]
    fn stale_candidate_does_not_confirm() {
        let mut eng = engine();
        let c = [cand(0, 300.0, 300.0, 5000.0), cand(1, 302.0, 300.0, 4000.0)];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::Unstable);
        // 0.5s later is outside the 0.2s stability window
        assert_eq!(eng.fuse(&c, 0.5), FusionOutcome::Unstable);
        assert!(matches!(eng.fuse(&c, 0.6), FusionOutcome::Hit(_)));
    }

    #[test]
    fn duplicate_of_last_hit_is_suppressed() {
        let mut eng = engine();
        let c = [cand(0, 300.0, 300.0, 5000.0), cand(1, 302.0, 300.0, 4000.0)];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::Unstable);
        let hit = match eng.fuse(&c, 0.1) {
            FusionOutcome::Hit(p) => p,
            other => panic!("expected hit, got {other:?}"),
        };
        eng.record_hit(hit, 0.1);

        // the same dart keeps being seen: never a second hit
        assert_eq!(eng.fuse(&c, 1.0), FusionOutcome::Unstable);
        assert_eq!(eng.fuse(&c, 1.1), FusionOutcome::Duplicate);
        assert_eq!(eng.fuse(&c, 1.2), FusionOutcome::Duplicate);
    }

    #[test]
    fn spatially_distinct_second_dart_is_accepted() {
        let mut eng = engine();
        let first = [cand(0, 300.0, 300.0, 5000.0), cand(1, 302.0, 300.0, 4000.0)];
        assert_eq!(eng.fuse(&first, 0.0), FusionOutcome::Unstable);
        let hit = match eng.fuse(&first, 0.1) {
            FusionOutcome::Hit(p) => p,
            other => panic!("expected hit, got {other:?}"),
        };
        eng.record_hit(hit, 0.1);

        let second = [cand(0, 450.0, 300.0, 5000.0), cand(1, 452.0, 300.0, 4000.0)];
        assert_eq!(eng.fuse(&second, 1.0), FusionOutcome::Unstable);
        assert!(matches!(eng.fuse(&second, 1.1), FusionOutcome::Hit(_)));
    }

    #[test]
    fn collection_gate_closes_after_a_hit() {
        let mut eng = engine();
        assert!(eng.collection_open(0.0));
        eng.record_hit(Point2::new(300.0, 300.0), 1.0);
        assert!(!eng.collection_open(1.2));
        assert!(eng.collection_open(1.4));
    }

    #[test]
    fn clearing_last_hit_reopens_the_board() {
        let mut eng = engine();
        let c = [cand(0, 300.0, 300.0, 5000.0), cand(1, 302.0, 300.0, 4000.0)];
        assert_eq!(eng.fuse(&c, 0.0), FusionOutcome::Unstable);
        let hit = match eng.fuse(&c, 0.1) {
            FusionOutcome::Hit(p) => p,
            other => panic!("expected hit, got {other:?}"),
        };
        eng.record_hit(hit, 0.1);
        eng.clear_last_hit();

        // same position again is a new dart after the takeout
        assert_eq!(eng.fuse(&c, 2.0), FusionOutcome::Unstable);
        assert!(matches!(eng.fuse(&c, 2.1), FusionOutcome::Hit(_)));
    }
}
