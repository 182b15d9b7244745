//! gesture-mouse: drive the OS pointer with hand gestures

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gesture_vision::camera::{CameraCapture, FrameSource};
use gesture_vision::gesture::{run_gesture_mouse, GestureController};
use gesture_vision::input::{EnigoPointer, LoggingPointer, PointerSink};
use gesture_vision::logging::init_logging;
use gesture_vision::ml::{find_model_dir, OnnxHandTracker};
use gesture_vision::AppConfig;

/// Screen size assumed for dry runs
const DRY_RUN_SCREEN: (i32, i32) = (1920, 1080);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera index
    #[arg(short, long)]
    camera: Option<u32>,

    /// Log pointer actions instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// List available cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_cameras {
        for camera in CameraCapture::list_cameras() {
            println!("{}: {}", camera.index, camera.name);
        }
        return Ok(());
    }

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(camera) = args.camera {
        config.gesture.camera_index = camera;
    }
    let settings = &config.gesture;

    let mut pointer: Box<dyn PointerSink> = if args.dry_run {
        log::info!("Dry run, pointer actions are only logged");
        Box::new(LoggingPointer::new(DRY_RUN_SCREEN))
    } else {
        Box::new(EnigoPointer::new().context("Failed to open pointer backend")?)
    };
    let screen = pointer.screen_size().context("Failed to query screen size")?;
    log::info!("Screen size {}x{}", screen.0, screen.1);

    let model_dir = find_model_dir(&config.models).context("Failed to locate models")?;
    let mut tracker =
        OnnxHandTracker::new(&model_dir, &config.models, settings.min_detection_confidence)
            .context("Failed to load hand landmark model")?;

    let mut camera = CameraCapture::open(
        settings.camera_index,
        Some((settings.frame_width, settings.frame_height)),
    )
    .context("Failed to open camera")?;

    let mut controller = GestureController::new(settings, camera.resolution(), screen);
    run_gesture_mouse(&mut controller, &mut tracker, &mut camera, &mut pointer)
        .context("Gesture loop failed")?;

    Ok(())
}
