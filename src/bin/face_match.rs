//! face-match: compare webcam faces against a reference photo

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gesture_vision::camera::CameraCapture;
use gesture_vision::display::{parse_key, PreviewWindow};
use gesture_vision::face_match::{finish_face_match, start_face_match};
use gesture_vision::logging::init_logging;
use gesture_vision::ml::{find_model_dir, OnnxFaceAnalyzer};
use gesture_vision::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference image holding the face to look for
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Camera index
    #[arg(short, long)]
    camera: Option<u32>,

    /// Maximum embedding distance counted as a match
    #[arg(long)]
    tolerance: Option<f32>,

    /// List available cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn print_cameras() {
    let cameras = CameraCapture::list_cameras();
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in cameras {
        println!("{}: {}", camera.index, camera.name);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_cameras {
        print_cameras();
        return Ok(());
    }

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(reference) = args.reference {
        config.face_match.reference_image = reference;
    }
    if let Some(camera) = args.camera {
        config.face_match.camera_index = camera;
    }
    if let Some(tolerance) = args.tolerance {
        config.face_match.tolerance = tolerance;
    }
    config.validate().context("Invalid settings")?;

    let settings = &config.face_match;
    let quit_key = parse_key(&settings.quit_key)
        .with_context(|| format!("Unknown quit key {:?}", settings.quit_key))?;

    let reference_path = &settings.reference_image;
    let reference = image::open(reference_path)
        .with_context(|| format!("Failed to read reference image {}", reference_path.display()))?
        .to_rgb8();

    let model_dir = find_model_dir(&config.models).context("Failed to locate models")?;
    let analyzer =
        OnnxFaceAnalyzer::new(&model_dir, &config.models).context("Failed to load face models")?;

    let result = start_face_match(
        settings,
        analyzer,
        &reference,
        || CameraCapture::open(settings.camera_index, None),
        |width, height| PreviewWindow::new(&settings.window_title, width, height, quit_key),
    );

    let exit = finish_face_match(result).context("Face match failed")?;
    if let Some(message) = exit.message() {
        println!("{}", message);
    }
    Ok(())
}
