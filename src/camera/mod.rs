//! Camera capture module
//!
//! Provides cross-platform camera capture using the nokhwa crate.
//! Frames are pulled synchronously: `next_frame` blocks until the device
//! delivers one. The stream is stopped when the capture is dropped.

use std::time::Instant;

use image::imageops::FilterType;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::error::{Result, VisionError};

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Frame number, starting at 1
    pub frame_number: u64,
    /// Capture timestamp, used as the gesture clock
    pub timestamp: Instant,
}

impl CameraFrame {
    pub fn new(image: RgbImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Create a scaled copy of the frame for inference
    pub fn downscale(&self, scale: f32) -> RgbImage {
        downscale(&self.image, scale)
    }
}

/// Scaled copy of an image; 0.5 halves both dimensions.
///
/// Never produces an empty image.
pub fn downscale(image: &RgbImage, scale: f32) -> RgbImage {
    if (scale - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    let target_width = ((image.width() as f32 * scale) as u32).max(1);
    let target_height = ((image.height() as f32 * scale) as u32).max(1);
    image::imageops::resize(image, target_width, target_height, FilterType::Triangle)
}

/// Anything that yields camera frames in order
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// `Ok(None)` means the source has no more frames.
    fn next_frame(&mut self) -> Result<Option<CameraFrame>>;

    /// Frame size in pixels
    fn resolution(&self) -> (u32, u32);
}

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// Blocking camera capture
pub struct CameraCapture {
    camera: Camera,
    frame_count: u64,
}

impl CameraCapture {
    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        let mut cameras = Vec::new();

        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(camera_list) => {
                for (idx, info) in camera_list.iter().enumerate() {
                    cameras.push(CameraInfo {
                        index: idx as u32,
                        name: info.human_name().to_string(),
                    });
                }
            }
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
            }
        }

        cameras
    }

    /// Open a camera and start streaming
    ///
    /// # Arguments
    /// * `camera_index` - The camera index to use (0 for default)
    /// * `resolution` - Preferred frame size, or `None` for the highest available
    pub fn open(camera_index: u32, resolution: Option<(u32, u32)>) -> Result<Self> {
        log::info!("Opening camera {}", camera_index);

        let mut camera = Self::create_camera(camera_index, resolution)?;
        camera.open_stream()?;

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        Ok(Self {
            camera,
            frame_count: 0,
        })
    }

    /// Try the requested format first, then progressively looser ones
    fn create_camera(camera_index: u32, resolution: Option<(u32, u32)>) -> Result<Camera> {
        let index = CameraIndex::Index(camera_index);

        let first_choice = match resolution {
            Some((width, height)) => {
                RequestedFormatType::HighestResolution(Resolution::new(width, height))
            }
            None => RequestedFormatType::AbsoluteHighestResolution,
        };

        match Camera::new(index.clone(), RequestedFormat::new::<RgbFormat>(first_choice)) {
            Ok(c) => return Ok(c),
            Err(e) => log::warn!("Failed to open camera with requested format: {:?}", e),
        }

        match Camera::new(
            index.clone(),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        ) {
            Ok(c) => return Ok(c),
            Err(e) => log::warn!("Failed with AbsoluteHighestFrameRate: {:?}", e),
        }

        Camera::new(index, RequestedFormat::new::<RgbFormat>(RequestedFormatType::None))
            .map_err(|e| {
                log::error!("Failed to open camera with all format attempts: {:?}", e);
                VisionError::from(e)
            })
    }
}

impl FrameSource for CameraCapture {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        let buffer = self.camera.frame()?;
        let image = buffer.decode_image::<RgbFormat>()?;

        self.frame_count += 1;
        Ok(Some(CameraFrame::new(image, self.frame_count)))
    }

    fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        } else {
            log::info!("Camera released after {} frames", self.frame_count);
        }
    }
}
