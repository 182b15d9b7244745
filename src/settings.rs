//! Settings management
//!
//! One JSON file holds the settings of both programs. Every field has a
//! default, so a partial (or missing) file is always valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VisionError};

const APP_DIR: &str = "gesture-vision";
const CONFIG_FILE: &str = "config.json";

/// Face match settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMatchSettings {
    /// Still image holding the reference face
    pub reference_image: PathBuf,
    /// Camera index (0 for default)
    pub camera_index: u32,
    /// Maximum embedding distance that still counts as a match
    pub tolerance: f32,
    /// Only every n-th captured frame is analysed
    pub process_every_n_frames: u32,
    /// Scale applied to frames before detection (0.5 = half size)
    pub detection_scale: f32,
    /// Key that ends the loop
    pub quit_key: String,
    /// Preview window title
    pub window_title: String,
}

impl Default for FaceMatchSettings {
    fn default() -> Self {
        Self {
            reference_image: PathBuf::from("ref.jpg"),
            camera_index: 0,
            tolerance: 0.6,
            process_every_n_frames: 5,
            detection_scale: 0.5,
            quit_key: "q".to_string(),
            window_title: "Webcam Feed".to_string(),
        }
    }
}

/// Gesture mouse settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub camera_index: u32,
    /// Requested capture width
    pub frame_width: u32,
    /// Requested capture height
    pub frame_height: u32,
    /// Size of the central movement region relative to the frame
    pub active_region_fraction: f32,
    /// Cursor smoothing factor (1.0 = no smoothing)
    pub smoothing_factor: f32,
    /// Fingertip distance (normalized) that counts as a pinch
    pub pinch_threshold: f32,
    /// Minimum seconds between left clicks
    pub left_click_interval_secs: f32,
    /// Minimum seconds between right clicks
    pub right_click_interval_secs: f32,
    /// Hands considered per frame
    pub max_hands: usize,
    /// Minimum hand presence score
    pub min_detection_confidence: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            active_region_fraction: 0.5,
            smoothing_factor: 0.6,
            pinch_threshold: 0.05,
            left_click_interval_secs: 0.7,
            right_click_interval_secs: 0.5,
            max_hands: 1,
            min_detection_confidence: 0.7,
        }
    }
}

/// ONNX model locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model directory; searched next to the executable when unset
    pub model_dir: Option<PathBuf>,
    pub face_detector: String,
    /// Minimum detector score for a face
    pub face_score_threshold: f32,
    /// Overlap above which the weaker of two detections is dropped
    pub face_iou_threshold: f32,
    /// Faces kept per frame
    pub max_faces: usize,
    pub face_embedder: String,
    /// Square input size of the embedding network
    pub face_embedder_input: u32,
    pub hand_landmarks: String,
    /// Threads used by each ONNX session
    pub intra_threads: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            face_detector: "version-RFB-320.onnx".to_string(),
            face_score_threshold: 0.7,
            face_iou_threshold: 0.3,
            max_faces: 16,
            face_embedder: "face_embedding.onnx".to_string(),
            face_embedder_input: 112,
            hand_landmarks: "hand_landmark.onnx".to_string(),
            intra_threads: 2,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub face_match: FaceMatchSettings,
    pub gesture: GestureSettings,
    pub models: ModelSettings,
}

impl AppConfig {
    /// Default config location: `<config dir>/gesture-vision/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(&path)?,
                None => {
                    log::debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject values the pipelines cannot work with
    pub fn validate(&self) -> Result<()> {
        let face = &self.face_match;
        let gesture = &self.gesture;

        check(face.tolerance > 0.0, "face_match.tolerance must be positive")?;
        check(
            face.process_every_n_frames >= 1,
            "face_match.process_every_n_frames must be at least 1",
        )?;
        check(
            in_unit_range(face.detection_scale),
            "face_match.detection_scale must be in (0, 1]",
        )?;
        check(
            crate::display::parse_key(&face.quit_key).is_some(),
            "face_match.quit_key must be a letter, digit, 'escape' or 'space'",
        )?;
        check(
            gesture.frame_width > 0 && gesture.frame_height > 0,
            "gesture frame size must be non-zero",
        )?;
        check(
            in_unit_range(gesture.active_region_fraction),
            "gesture.active_region_fraction must be in (0, 1]",
        )?;
        check(
            in_unit_range(gesture.smoothing_factor),
            "gesture.smoothing_factor must be in (0, 1]",
        )?;
        check(gesture.pinch_threshold > 0.0, "gesture.pinch_threshold must be positive")?;
        check(
            [gesture.left_click_interval_secs, gesture.right_click_interval_secs]
                .iter()
                .all(|secs| secs.is_finite() && *secs >= 0.0),
            "click intervals must be finite and not negative",
        )?;
        check(gesture.max_hands >= 1, "gesture.max_hands must be at least 1")?;
        check(
            in_unit_range(self.models.face_score_threshold)
                && in_unit_range(self.models.face_iou_threshold),
            "face detector thresholds must be in (0, 1]",
        )?;
        check(self.models.max_faces >= 1, "models.max_faces must be at least 1")?;
        check(
            self.models.face_embedder_input > 0,
            "models.face_embedder_input must be non-zero",
        )?;
        Ok(())
    }
}

fn in_unit_range(value: f32) -> bool {
    value > 0.0 && value <= 1.0
}

fn check(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(VisionError::InvalidSetting(message.to_string()))
    }
}
