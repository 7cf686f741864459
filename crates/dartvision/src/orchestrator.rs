use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use nalgebra::Point2;

use dartvision_core::{circle_mask, BoardGeometry, CalibrationSet, GrayImage};
use dartvision_detect::{
    CameraCandidate, DetectParams, FrameActivity, FusionEngine, FusionOutcome, MotionGate,
    TakeoutDetector, TipDetector,
};

use crate::camera::{CaptureSettings, FrameSource};
use crate::events::{event_channel, ConsumerGone, EventSender, HitEvent, VisionEvent};
use crate::normalizer::PerspectiveNormalizer;

/// Per-camera static configuration.
#[derive(Clone, Copy, Debug)]
pub struct CameraConfig {
    /// Camera id; selects the calibration file `cam{id}_config.json`.
    pub id: usize,
    /// Radial distortion coefficient for this camera's lens.
    pub k1: f64,
    pub settings: CaptureSettings,
}

impl CameraConfig {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            k1: 1.8,
            settings: CaptureSettings::default(),
        }
    }
}

/// Detector-wide configuration.
#[derive(Clone, Debug)]
pub struct VisionConfig {
    /// Directory holding the per-camera calibration files.
    pub calibration_dir: PathBuf,
    pub canvas_size: usize,
    pub usage_factor: f64,
    pub angle_offset_deg: f64,
    pub params: DetectParams,
    /// Event queue depth; overflowing events are dropped, never block.
    pub event_capacity: usize,
    /// Frames discarded before capturing a reference, letting auto-exposure
    /// settle after a scene change.
    pub reference_flush_frames: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            calibration_dir: PathBuf::from("."),
            canvas_size: 1000,
            usage_factor: 0.70,
            angle_offset_deg: 0.0,
            params: DetectParams::default(),
            event_capacity: 32,
            reference_flush_frames: 5,
        }
    }
}

/// One camera and its per-camera pipeline state.
struct CameraState {
    id: usize,
    k1: f64,
    settings: CaptureSettings,
    source: Box<dyn FrameSource + Send>,
    normalizer: Option<PerspectiveNormalizer>,
    gate: MotionGate,
    tips: TipDetector,
    takeout: TakeoutDetector,
    /// Cleared on the first read failure; a dead camera is skipped for the
    /// rest of the run instead of aborting the loop.
    alive: bool,
}

impl CameraState {
    /// Read one frame and warp it onto the canvas. `None` means the camera is
    /// dead or not calibrated; a read failure kills the camera.
    fn read_warped(&mut self) -> Option<GrayImage> {
        if !self.alive {
            return None;
        }
        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("camera {}: read failed, dropping camera: {e}", self.id);
                self.alive = false;
                self.source.release();
                return None;
            }
        };
        Some(self.normalizer.as_ref()?.normalize(&frame))
    }

    fn reload_calibration(&mut self, dir: &Path, board: &BoardGeometry) {
        let path = CalibrationSet::path_for_camera(dir, self.id);
        match CalibrationSet::load(&path) {
            Ok(set) => {
                self.normalizer = PerspectiveNormalizer::from_calibration(
                    &set,
                    self.settings.width,
                    self.settings.height,
                    self.k1,
                    board,
                );
                if self.normalizer.is_none() {
                    warn!(
                        "camera {}: degenerate calibration points in {}",
                        self.id,
                        path.display()
                    );
                }
            }
            Err(e) => warn!("camera {}: calibration not loaded: {e}", self.id),
        }
    }

    fn flush(&mut self, n: usize) {
        for _ in 0..n {
            if !self.alive {
                return;
            }
            if let Err(e) = self.source.read() {
                warn!("camera {}: read failed, dropping camera: {e}", self.id);
                self.alive = false;
                self.source.release();
            }
        }
    }
}

/// Tracks the wait for the board to be cleared by hand.
#[derive(Clone, Copy, Debug, Default)]
struct RemovalTracker {
    /// Set when a huge contour (a player at the board) is seen; references
    /// are stale until the view settles.
    waiting_for_reset: bool,
    quiet_cycles: u32,
}

/// The detection loop: cameras, per-camera detectors, cross-camera fusion and
/// event emission.
pub struct Detector {
    board: BoardGeometry,
    mask: GrayImage,
    params: DetectParams,
    calibration_dir: PathBuf,
    flush_frames: usize,
    cameras: Vec<CameraState>,
    fusion: FusionEngine,
    /// Canvas point of the last emitted (or silently tracked) hit.
    last_hit: Option<Point2<f32>>,
    removal: RemovalTracker,
    events: EventSender,
    stop: Arc<AtomicBool>,
    started: Instant,
    degraded: bool,
}

impl Detector {
    /// Build the detector and hand back the receiving half of its event
    /// channel. Cameras that fail to configure are marked dead but kept in
    /// the arena so ids stay stable.
    pub fn new(
        config: VisionConfig,
        sources: Vec<(CameraConfig, Box<dyn FrameSource + Send>)>,
    ) -> (Self, Receiver<VisionEvent>) {
        let board = BoardGeometry::new(
            config.canvas_size,
            config.usage_factor,
            config.angle_offset_deg,
        );
        let c = config.canvas_size as f32 / 2.0;
        let mask = circle_mask(
            config.canvas_size,
            config.canvas_size,
            c,
            c,
            board.mask_radius() as f32,
        );
        let (events, receiver) = event_channel(config.event_capacity);

        let cameras = sources
            .into_iter()
            .map(|(cam, mut source)| {
                let alive = match source.configure(&cam.settings) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("camera {}: configuration failed: {e}", cam.id);
                        false
                    }
                };
                CameraState {
                    id: cam.id,
                    k1: cam.k1,
                    settings: cam.settings,
                    source,
                    normalizer: None,
                    gate: MotionGate::new(config.params.motion),
                    tips: TipDetector::new(config.params.tip),
                    takeout: TakeoutDetector::new(config.params.takeout),
                    alive,
                }
            })
            .collect();

        let detector = Self {
            board,
            mask,
            params: config.params,
            calibration_dir: config.calibration_dir,
            flush_frames: config.reference_flush_frames,
            cameras,
            fusion: FusionEngine::new(config.params.fusion),
            last_hit: None,
            removal: RemovalTracker::default(),
            events,
            stop: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            degraded: false,
        };
        (detector, receiver)
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Cameras still delivering frames. Replay drivers stop stepping once
    /// this reaches zero.
    pub fn live_cameras(&self) -> usize {
        self.cameras.iter().filter(|c| c.alive).count()
    }

    /// Reload every camera's calibration and capture fresh references: the
    /// motion gate's rolling reference and the takeout detector's clean-board
    /// image. Call only when the board is known to be dart-free.
    pub fn reset_references(&mut self) {
        for cam in &mut self.cameras {
            cam.reload_calibration(&self.calibration_dir, &self.board);
            cam.flush(self.flush_frames);
            if let Some(frame) = cam.read_warped() {
                cam.gate.set_reference(frame.clone());
                cam.takeout.set_clean_board(frame);
            }
        }
        self.removal = RemovalTracker::default();
    }

    /// Refresh only the rolling references, folding tracked darts into them
    /// so they stop registering as change. The clean-board images stay.
    fn update_references(&mut self) {
        for cam in &mut self.cameras {
            cam.flush(self.flush_frames);
            if let Some(frame) = cam.read_warped() {
                cam.gate.set_reference(frame);
            }
        }
    }

    /// Capture references and run until the stop flag is set or the event
    /// consumer goes away.
    pub fn run(&mut self) {
        self.reset_references();
        info!(
            "detection loop started, {} of {} cameras live",
            self.cameras.iter().filter(|c| c.alive).count(),
            self.cameras.len()
        );
        while !self.stop.load(Ordering::Relaxed) {
            // a fault in one cycle must not skip camera release below
            match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    info!("event consumer disconnected, stopping");
                    break;
                }
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("detection cycle panicked: {msg}");
                    break;
                }
            }
        }
        for cam in &mut self.cameras {
            cam.source.release();
        }
        info!("detection loop stopped");
    }

    /// Move the loop onto its own thread.
    pub fn spawn(mut self) -> DetectorHandle {
        let stop = self.stop.clone();
        let thread = thread::spawn(move || self.run());
        DetectorHandle { stop, thread }
    }

    /// One detection cycle. Public so replay tools can drive the loop frame
    /// by frame.
    pub fn step(&mut self) -> Result<(), ConsumerGone> {
        let now = self.started.elapsed().as_secs_f64();

        // Cheap pre-pass: a coarse change on any camera switches every tip
        // detector to high sensitivity for this cycle.
        let mut any_change = false;
        let mut live = 0usize;
        for cam in &mut self.cameras {
            let Some(frame) = cam.read_warped() else {
                continue;
            };
            live += 1;
            if cam.gate.coarse_change(&frame, &self.mask) {
                any_change = true;
            }
        }
        self.note_quorum(live);
        for cam in &mut self.cameras {
            cam.tips.high_sensitivity = any_change;
        }

        // Main pass: gate, takeout check and tip detection per camera.
        let tracking = self.last_hit.is_some();
        let collection_open = self.fusion.collection_open(now);
        let mut board_moving = false;
        let mut takeout_all_clean = live > 0;
        let mut candidates: Vec<CameraCandidate> = Vec::new();
        let mut max_area = 0.0_f32;

        for cam in &mut self.cameras {
            let Some(frame) = cam.read_warped() else {
                takeout_all_clean = false;
                continue;
            };

            if cam.gate.classify(&frame, &self.mask) == FrameActivity::InMotion {
                board_moving = true;
                takeout_all_clean = false;
                continue;
            }

            if !cam.takeout.is_board_clean(&frame, &self.mask, tracking) {
                takeout_all_clean = false;
            }

            let Some(reference) = cam.gate.reference() else {
                takeout_all_clean = false;
                continue;
            };
            let detection = cam.tips.detect(&frame, reference, &self.mask, &self.board);
            max_area = max_area.max(detection.max_contour_area);
            if detection.max_contour_area > self.params.fusion.takeout_arm_area {
                // a player filling the view, not a dart
                debug!(
                    "camera {}: {:.0} px^2 contour, arming takeout wait",
                    cam.id, detection.max_contour_area
                );
                self.removal.waiting_for_reset = true;
                continue;
            }

            let Some(best) = detection
                .candidates
                .into_iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            else {
                continue;
            };

            if best.confidence < self.params.fusion.min_confidence {
                continue;
            }
            if best.confidence > self.params.fusion.takeout_arm_confidence {
                // dart-shaped but implausibly dominant: also a player
                self.removal.waiting_for_reset = true;
                continue;
            }
            if best.area > self.params.fusion.min_area && collection_open {
                candidates.push(CameraCandidate {
                    camera: cam.id,
                    tip: best.tip,
                    area: best.area,
                    confidence: best.confidence,
                });
            }
        }

        if board_moving {
            // an in-flight dart or vibration invalidates this cycle
            self.fusion.clear_candidate();
            thread::sleep(Duration::from_millis(10));
        }

        // Removal first: once every live camera sees the clean board again,
        // the tracked darts are gone and this cycle carries no hit.
        if tracking && takeout_all_clean {
            info!("board cleared, darts removed");
            self.events.send(VisionEvent::DartsRemoved)?;
            self.last_hit = None;
            self.fusion.clear_last_hit();
            self.reset_references();
            return Ok(());
        }

        match self.fusion.fuse(&candidates, now) {
            FusionOutcome::Hit(point) => {
                let score = self.board.score(point);
                // a fused point outside the board entirely is glare or a
                // bounce-out: suppress re-detection and refresh references,
                // but never track it as a dart awaiting removal
                if score.is_missed {
                    debug!("off-board fused point at ({:.0}, {:.0})", point.x, point.y);
                } else {
                    info!(
                        "hit: sector {} x{} at ({:.0}, {:.0})",
                        score.sector, score.multiplier, point.x, point.y
                    );
                    self.events.send(VisionEvent::Hit(HitEvent {
                        point,
                        score,
                        timestamp_s: now,
                    }))?;
                    self.last_hit = Some(point);
                    self.removal = RemovalTracker::default();
                }
                self.fusion.record_hit(point, now);
                thread::sleep(Duration::from_secs_f64(self.params.fusion.min_inter_hit_s));
                self.update_references();
            }
            FusionOutcome::Unstable | FusionOutcome::Duplicate | FusionOutcome::NoConsensus => {}
        }

        // Fallback: after a takeout arm, a long run of quiet cycles means the
        // player left and the references are safe to rebuild. No event; the
        // takeout path above is the authoritative removal signal.
        if self.removal.waiting_for_reset {
            if max_area < self.params.fusion.quiet_max_area {
                self.removal.quiet_cycles += 1;
            } else {
                self.removal.quiet_cycles = 0;
            }
            if self.removal.quiet_cycles > self.params.fusion.quiet_cycle_limit {
                info!("board quiet after takeout arm, rebuilding references");
                // tracked hits are forgotten without an event: the fresh
                // clean-board references would otherwise report them removed
                // on the very next cycle
                self.last_hit = None;
                self.fusion.clear_last_hit();
                self.reset_references();
            }
        }

        Ok(())
    }

    fn note_quorum(&mut self, live: usize) {
        if live < self.params.fusion.min_cameras {
            if !self.degraded {
                warn!(
                    "{live} live cameras, below the fusion quorum of {}; hits cannot be confirmed",
                    self.params.fusion.min_cameras
                );
                self.degraded = true;
            }
        } else {
            self.degraded = false;
        }
    }
}

/// Handle to a running detection thread.
pub struct DetectorHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl DetectorHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.thread.join().is_err() {
            error!("detection thread terminated by panic");
        }
    }
}
