//! Perception module
//!
//! Face detection + embedding and hand landmark tracking. The pipelines
//! only see the `FaceAnalyzer` and `HandTracker` traits; ONNX Runtime
//! backed implementations live in the submodules.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{Result, VisionError};
use crate::settings::ModelSettings;

pub mod face;
pub mod hands;
mod preprocess;

pub use face::OnnxFaceAnalyzer;
pub use hands::OnnxHandTracker;

/// Number of landmarks in a hand set
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Hand landmark (normalized coordinates, origin top-left)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl HandLandmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Detected hand
#[derive(Clone, Debug)]
pub struct Hand {
    /// 21 landmarks in MediaPipe order
    pub landmarks: [HandLandmark; HAND_LANDMARK_COUNT],
    /// Presence score
    pub confidence: f32,
}

impl Default for Hand {
    fn default() -> Self {
        Self {
            landmarks: [HandLandmark::default(); HAND_LANDMARK_COUNT],
            confidence: 0.0,
        }
    }
}

/// Face embedding vector
#[derive(Clone, Debug, PartialEq)]
pub struct FaceEmbedding(Vec<f32>);

impl FaceEmbedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for FaceEmbedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Face bounding box in pixels of the analysed image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Rescale to an image `factor` times as large
    pub fn scaled(&self, factor: f32) -> Self {
        let s = |v: u32| (v as f32 * factor).round() as u32;
        Self {
            top: s(self.top),
            right: s(self.right),
            bottom: s(self.bottom),
            left: s(self.left),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Face found in an image
#[derive(Clone, Debug)]
pub struct FaceDetection {
    pub location: FaceBox,
    pub embedding: FaceEmbedding,
}

/// Finds faces and computes their embeddings
pub trait FaceAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceDetection>>;
}

/// Finds hands and their landmarks
pub trait HandTracker {
    fn track(&mut self, image: &RgbImage) -> Result<Vec<Hand>>;
}

impl<T: FaceAnalyzer + ?Sized> FaceAnalyzer for Box<T> {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceDetection>> {
        (**self).analyze(image)
    }
}

impl<T: HandTracker + ?Sized> HandTracker for Box<T> {
    fn track(&mut self, image: &RgbImage) -> Result<Vec<Hand>> {
        (**self).track(image)
    }
}

/// Resolve the models directory
///
/// An explicit directory wins. Otherwise look for `models/` next to the
/// executable and up to three levels above it (covers `cargo run` from
/// `target/debug`), then in the current directory.
pub fn find_model_dir(settings: &ModelSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir {
        if dir.is_dir() {
            return Ok(dir.clone());
        }
        return Err(VisionError::ModelNotFound(dir.clone()));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        for ancestor in exe_path.ancestors().skip(1).take(4) {
            let model_dir = ancestor.join("models");
            if model_dir.is_dir() {
                return Ok(model_dir);
            }
        }
    }

    let model_dir = std::env::current_dir()?.join("models");
    if model_dir.is_dir() {
        return Ok(model_dir);
    }

    Err(VisionError::ModelDirNotFound)
}

/// Path of a model file, failing early if it is missing
pub(crate) fn model_path(dir: &Path, file: &str) -> Result<PathBuf> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(VisionError::ModelNotFound(path));
    }
    Ok(path)
}

/// Build an ONNX Runtime session for one model
pub(crate) fn load_session(path: &Path, intra_threads: usize) -> Result<ort::session::Session> {
    let session = ort::session::Session::builder()
        .map_err(|e| VisionError::Inference(format!("Failed to create session builder: {}", e)))?
        .with_intra_threads(intra_threads)
        .map_err(|e| VisionError::Inference(format!("Failed to set threads: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| VisionError::Inference(format!("Failed to load {:?}: {}", path, e)))?;

    log::info!("Loaded model from {:?}", path);
    Ok(session)
}

/// Model output with the given name, as yielded by `SessionOutputs::iter`
pub(crate) fn named_output<K, V>(
    outputs: impl IntoIterator<Item = (K, V)>,
    name: &str,
) -> Result<V>
where
    K: AsRef<str>,
{
    outputs
        .into_iter()
        .find(|(key, _)| key.as_ref() == name)
        .map(|(_, value)| value)
        .ok_or_else(|| VisionError::Inference(format!("Model has no '{}' output", name)))
}

/// Model output at `index`, in declaration order
pub(crate) fn nth_output<K, V>(
    outputs: impl IntoIterator<Item = (K, V)>,
    index: usize,
    what: &str,
) -> Result<V> {
    outputs
        .into_iter()
        .nth(index)
        .map(|(_, value)| value)
        .ok_or_else(|| {
            VisionError::Inference(format!("Model has no {} output (index {})", what, index))
        })
}
