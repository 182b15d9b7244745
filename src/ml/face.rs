//! Face detection and embedding
//!
//! Detection uses the UltraFace RFB-320 network (raw anchor outputs),
//! followed by non-maximum suppression. Every surviving box is cropped and
//! passed through an embedding network producing one vector per face.

use std::path::Path;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;

use super::preprocess::{to_nchw, Normalization};
use super::{
    load_session, model_path, named_output, nth_output, FaceAnalyzer, FaceBox, FaceDetection,
    FaceEmbedding,
};
use crate::error::{Result, VisionError};
use crate::settings::ModelSettings;

const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

/// Detection tuning
#[derive(Clone, Copy, Debug, PartialEq)]
struct DetectorParams {
    score_threshold: f32,
    iou_threshold: f32,
    max_faces: usize,
}

impl DetectorParams {
    fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            score_threshold: settings.face_score_threshold,
            iou_threshold: settings.face_iou_threshold,
            max_faces: settings.max_faces,
        }
    }
}

/// Candidate box in normalized corner form
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Pixel box in an image of the given size, clamped to its bounds
    fn to_face_box(self, width: u32, height: u32) -> FaceBox {
        let px = |v: f32, max: u32| (v * max as f32).round().clamp(0.0, max as f32) as u32;
        FaceBox::new(
            px(self.y1, height),
            px(self.x2, width),
            px(self.y2, height),
            px(self.x1, width),
        )
    }
}

/// ONNX Runtime face analyzer
pub struct OnnxFaceAnalyzer {
    detector: Session,
    embedder: Session,
    anchors: Vec<(f32, f32, f32, f32)>,
    embedder_input: u32,
    params: DetectorParams,
}

impl OnnxFaceAnalyzer {
    /// Load the detector and embedding models from `model_dir`
    pub fn new(model_dir: &Path, settings: &ModelSettings) -> Result<Self> {
        let detector_path = model_path(model_dir, &settings.face_detector)?;
        let embedder_path = model_path(model_dir, &settings.face_embedder)?;

        Ok(Self {
            detector: load_session(&detector_path, settings.intra_threads)?,
            embedder: load_session(&embedder_path, settings.intra_threads)?,
            anchors: generate_anchors(DETECTOR_WIDTH as usize, DETECTOR_HEIGHT as usize),
            embedder_input: settings.face_embedder_input,
            params: DetectorParams::from_settings(settings),
        })
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let input = to_nchw(image, DETECTOR_WIDTH, DETECTOR_HEIGHT, Normalization::ULTRAFACE)?;
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| VisionError::Inference(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .detector
            .run(ort::inputs![input_tensor])
            .map_err(|e| VisionError::Inference(format!("Face detection failed: {}", e)))?;

        let scores_output = named_output(outputs.iter(), "scores")?;
        let boxes_output = named_output(outputs.iter(), "boxes")?;
        let (_, scores) = scores_output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract scores: {}", e)))?;
        let (_, boxes) = boxes_output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract boxes: {}", e)))?;

        let params = self.params;
        let candidates = decode_candidates(&self.anchors, scores, boxes, params.score_threshold);
        let kept = non_max_suppression(candidates, params.iou_threshold, params.max_faces);

        Ok(kept
            .into_iter()
            .map(|c| c.to_face_box(image.width(), image.height()))
            .filter(|b| b.width() > 0 && b.height() > 0)
            .collect())
    }

    fn embed(&mut self, image: &RgbImage, location: &FaceBox) -> Result<FaceEmbedding> {
        let crop = image::imageops::crop_imm(
            image,
            location.left,
            location.top,
            location.width(),
            location.height(),
        )
        .to_image();

        let size = self.embedder_input;
        let input = to_nchw(&crop, size, size, Normalization::SYMMETRIC)?;
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| VisionError::Inference(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .embedder
            .run(ort::inputs![input_tensor])
            .map_err(|e| VisionError::Inference(format!("Face embedding failed: {}", e)))?;

        let output = nth_output(outputs.iter(), 0, "embedding")?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract embedding: {}", e)))?;

        Ok(FaceEmbedding::new(l2_normalize(data)))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceDetection>> {
        let locations = self.detect(image)?;
        log::debug!("Detected {} face(s)", locations.len());

        let mut faces = Vec::with_capacity(locations.len());
        for location in locations {
            let embedding = self.embed(image, &location)?;
            faces.push(FaceDetection {
                location,
                embedding,
            });
        }
        Ok(faces)
    }
}

/// UltraFace prior boxes as (cx, cy, w, h), normalized
fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8usize, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];

    let w = width as f32;
    let h = height as f32;
    let mut anchors = Vec::new();

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let stride = shrinkage as f32;
        let feature_h = height.div_ceil(shrinkage);
        let feature_w = width.div_ceil(shrinkage);

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * stride + stride / 2.0) / w;
                let cy = (v as f32 * stride + stride / 2.0) / h;

                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

/// Decode raw offsets against the anchors, keeping boxes above `threshold`
fn decode_candidates(
    anchors: &[(f32, f32, f32, f32)],
    scores: &[f32],
    boxes: &[f32],
    threshold: f32,
) -> Vec<Candidate> {
    let count = anchors
        .len()
        .min(scores.len() / 2)
        .min(boxes.len() / 4);

    (0..count)
        .filter_map(|i| {
            let score = scores[i * 2 + 1];
            if score <= threshold {
                return None;
            }

            let (ax, ay, aw, ah) = anchors[i];
            let cx = boxes[i * 4] * CENTER_VARIANCE * aw + ax;
            let cy = boxes[i * 4 + 1] * CENTER_VARIANCE * ah + ay;
            let w = (boxes[i * 4 + 2] * SIZE_VARIANCE).exp() * aw;
            let h = (boxes[i * 4 + 3] * SIZE_VARIANCE).exp() * ah;

            Some(Candidate {
                score,
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            })
        })
        .collect()
}

/// Scale an embedding to unit length; all-zero output is kept as is
fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return raw.to_vec();
    }
    raw.iter().map(|v| v / norm).collect()
}

/// Greedy NMS, highest score first
fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max {
            break;
        }
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Candidate {
        Candidate {
            score,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_anchor_count_rfb_320() {
        assert_eq!(generate_anchors(320, 240).len(), 4420);
    }

    #[test]
    fn test_decode_zero_offsets_returns_anchor() {
        let anchors = vec![(0.5, 0.5, 0.2, 0.4), (0.1, 0.1, 0.1, 0.1)];
        let scores = vec![0.1, 0.9, 0.9, 0.1];
        let boxes = vec![0.0; 8];

        let decoded = decode_candidates(&anchors, &scores, &boxes, 0.7);
        assert_eq!(decoded.len(), 1);
        let c = decoded[0];
        assert!((c.x1 - 0.4).abs() < 1e-6);
        assert!((c.x2 - 0.6).abs() < 1e-6);
        assert!((c.y1 - 0.3).abs() < 1e-6);
        assert!((c.y2 - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_drops_overlaps() {
        let candidates = vec![
            candidate(0.8, 0.10, 0.10, 0.30, 0.30),
            candidate(0.95, 0.11, 0.11, 0.31, 0.31),
            candidate(0.9, 0.60, 0.60, 0.80, 0.80),
        ];

        let kept = non_max_suppression(candidates, 0.3, 16);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].score, 0.9);
    }

    #[test]
    fn test_nms_respects_max() {
        let candidates = vec![
            candidate(0.9, 0.0, 0.0, 0.1, 0.1),
            candidate(0.8, 0.5, 0.5, 0.6, 0.6),
        ];
        assert_eq!(non_max_suppression(candidates, 0.3, 1).len(), 1);
    }

    #[test]
    fn test_l2_normalize() {
        let unit = l2_normalize(&[3.0, 4.0]);
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);

        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_normalized_embeddings_compare_by_direction() {
        // same direction, very different magnitudes
        let a = FaceEmbedding::new(l2_normalize(&[20.0, 0.0, 0.0]));
        let b = FaceEmbedding::new(l2_normalize(&[0.5, 0.0, 0.0]));
        let distance = crate::face_match::euclidean_distance(&a, &b).unwrap();
        assert!(distance < 1e-6);
    }

    #[test]
    fn test_params_follow_settings() {
        let settings = ModelSettings {
            face_score_threshold: 0.5,
            max_faces: 2,
            ..ModelSettings::default()
        };
        let params = DetectorParams::from_settings(&settings);
        assert_eq!(params.score_threshold, 0.5);
        assert_eq!(params.iou_threshold, 0.3);
        assert_eq!(params.max_faces, 2);
    }

    #[test]
    fn test_to_face_box_clamps() {
        let c = candidate(0.9, -0.1, 0.25, 0.5, 1.2);
        assert_eq!(c.to_face_box(320, 240), FaceBox::new(60, 160, 240, 0));
    }
}
