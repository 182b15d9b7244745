//! Error type shared by the capture, perception and action layers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running either pipeline.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("No face detected in the reference image.")]
    NoFaceInReference,
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Camera error: {0}")]
    Camera(String),
    #[error("Model not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("Models directory not found. Create a 'models' directory with ONNX models.")]
    ModelDirNotFound,
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Window error: {0}")]
    Display(String),
    #[error("Pointer backend error: {0}")]
    Pointer(String),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

impl From<nokhwa::NokhwaError> for VisionError {
    fn from(e: nokhwa::NokhwaError) -> Self {
        Self::Camera(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
