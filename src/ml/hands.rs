//! Hand landmark tracking
//!
//! Runs the MediaPipe hand landmark network (224x224, NHWC, [0, 1]) on the
//! whole frame. Outputs are 21 (x, y, z) points in input pixels plus a hand
//! presence score; a frame yields at most one hand.

use std::path::Path;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;

use super::preprocess::{to_nhwc, Normalization};
use super::{
    load_session, model_path, nth_output, Hand, HandLandmark, HandTracker, HAND_LANDMARK_COUNT,
};
use crate::error::{Result, VisionError};
use crate::settings::ModelSettings;

const INPUT_SIZE: u32 = 224;

/// ONNX Runtime hand tracker
pub struct OnnxHandTracker {
    session: Session,
    min_confidence: f32,
}

impl OnnxHandTracker {
    pub fn new(model_dir: &Path, settings: &ModelSettings, min_confidence: f32) -> Result<Self> {
        let path = model_path(model_dir, &settings.hand_landmarks)?;
        Ok(Self {
            session: load_session(&path, settings.intra_threads)?,
            min_confidence,
        })
    }
}

impl HandTracker for OnnxHandTracker {
    fn track(&mut self, image: &RgbImage) -> Result<Vec<Hand>> {
        let input = to_nhwc(image, INPUT_SIZE, INPUT_SIZE, Normalization::UNIT)?;
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| VisionError::Inference(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| VisionError::Inference(format!("Hand tracking failed: {}", e)))?;

        let landmarks_output = nth_output(outputs.iter(), 0, "landmark")?;
        let presence_output = nth_output(outputs.iter(), 1, "presence")?;
        let (_, landmarks) = landmarks_output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract landmarks: {}", e)))?;
        let (_, presence) = presence_output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract presence: {}", e)))?;

        let score = presence_score(presence.first().copied().unwrap_or(0.0));
        if score < self.min_confidence {
            return Ok(Vec::new());
        }

        Ok(decode_hand(landmarks, score, INPUT_SIZE as f32)
            .into_iter()
            .collect())
    }
}

/// Some exports emit the presence logit rather than a probability
fn presence_score(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Convert flat (x, y, z) pixel output into normalized landmarks
fn decode_hand(raw: &[f32], confidence: f32, input_size: f32) -> Option<Hand> {
    if raw.len() < HAND_LANDMARK_COUNT * 3 {
        log::warn!("Hand landmark output too short: {} values", raw.len());
        return None;
    }

    let mut hand = Hand {
        confidence,
        ..Hand::default()
    };
    for (i, landmark) in hand.landmarks.iter_mut().enumerate() {
        *landmark = HandLandmark {
            x: raw[i * 3] / input_size,
            y: raw[i * 3 + 1] / input_size,
            z: raw[i * 3 + 2] / input_size,
        };
    }
    Some(hand)
}
