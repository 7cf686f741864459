use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use image::ImageReader;

use dartvision::{
    CameraConfig, CaptureError, DetectParams, Detector, FrameSource, GrayImage, VisionConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "dartvision",
    version,
    about = "Replay recorded frame sequences through the dart detection pipeline"
)]
struct Cli {
    /// Directory with one subdirectory per camera (cam0, cam1, ...), each
    /// holding that camera's frames as images in lexical order.
    #[arg(long)]
    frames: PathBuf,

    /// Directory with the cam{id}_config.json calibration files.
    #[arg(long)]
    calibration: PathBuf,

    /// Optional JSON document overriding detection parameters.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Radial distortion coefficient applied to every camera.
    #[arg(long, default_value_t = 1.8)]
    k1: f64,

    /// Warped canvas size in pixels.
    #[arg(long, default_value_t = 1000)]
    canvas_size: usize,
}

/// Frame source over a directory of still images.
struct ReplaySource {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ReplaySource {
    /// Open a camera directory; also reports the frame dimensions so the
    /// distortion intrinsics match the recording.
    fn from_dir(dir: &Path) -> Result<(Self, usize, usize), Box<dyn Error>> {
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        frames.sort();

        let Some(first) = frames.first() else {
            return Err(format!("no frames in {}", dir.display()).into());
        };
        let (width, height) = ImageReader::open(first)?.into_dimensions()?;

        Ok((
            Self { frames, next: 0 },
            width as usize,
            height as usize,
        ))
    }
}

impl FrameSource for ReplaySource {
    fn read(&mut self) -> Result<GrayImage, CaptureError> {
        let path = self.frames.get(self.next).ok_or(CaptureError::NoFrame)?;
        self.next += 1;
        let img = ImageReader::open(path)
            .map_err(|e| CaptureError::Backend(e.to_string()))?
            .decode()
            .map_err(|e| CaptureError::Backend(e.to_string()))?
            .to_luma8();
        let (w, h) = (img.width() as usize, img.height() as usize);
        GrayImage::from_raw(w, h, img.into_raw()).ok_or(CaptureError::NoFrame)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let params: DetectParams = match &cli.params {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => DetectParams::default(),
    };

    let mut sources: Vec<(CameraConfig, Box<dyn FrameSource + Send>)> = Vec::new();
    for entry in fs::read_dir(&cli.frames)? {
        let path = entry?.path();
        let Some(id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("cam"))
            .and_then(|n| n.parse::<usize>().ok())
        else {
            continue;
        };
        let (source, width, height) = ReplaySource::from_dir(&path)?;
        let mut config = CameraConfig::new(id);
        config.k1 = cli.k1;
        config.settings.width = width;
        config.settings.height = height;
        sources.push((config, Box::new(source)));
    }
    sources.sort_by_key(|(config, _)| config.id);
    if sources.is_empty() {
        return Err(format!(
            "no camera directories (cam0, cam1, ...) under {}",
            cli.frames.display()
        )
        .into());
    }

    let config = VisionConfig {
        calibration_dir: cli.calibration.clone(),
        canvas_size: cli.canvas_size,
        params,
        ..VisionConfig::default()
    };

    let (mut detector, events) = Detector::new(config, sources);
    detector.reset_references();
    while detector.live_cameras() > 0 {
        detector.step()?;
        while let Ok(event) = events.try_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}
