//! Fakes for the capture, perception and action seams.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::camera::{CameraFrame, FrameSource};
use crate::display::PreviewSink;
use crate::error::{Result, VisionError};
use crate::input::{MouseButton, PointerSink};
use crate::ml::{
    FaceAnalyzer, FaceBox, FaceDetection, FaceEmbedding, Hand, HandLandmark, HandTracker,
};

/// Frame source replaying a scripted sequence, then ending
pub struct ScriptedSource {
    frames: VecDeque<Result<CameraFrame>>,
    resolution: (u32, u32),
}

impl ScriptedSource {
    /// `count` blank frames of the given size
    pub fn blank(count: u64, width: u32, height: u32) -> Self {
        Self {
            frames: (1..=count)
                .map(|n| Ok(CameraFrame::new(RgbImage::new(width, height), n)))
                .collect(),
            resolution: (width, height),
        }
    }

    /// Blank frames captured `offsets_ms` after a common start
    pub fn timed(offsets_ms: &[u64], width: u32, height: u32) -> Self {
        let start = Instant::now();
        Self {
            frames: offsets_ms
                .iter()
                .zip(1..)
                .map(|(&offset, n)| {
                    let mut frame = CameraFrame::new(RgbImage::new(width, height), n);
                    frame.timestamp = start + Duration::from_millis(offset);
                    Ok(frame)
                })
                .collect(),
            resolution: (width, height),
        }
    }

    /// Append a capture failure
    pub fn then_fail(mut self) -> Self {
        self.frames
            .push_back(Err(VisionError::Camera("device unplugged".to_string())));
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<CameraFrame>> {
        self.frames.pop_front().transpose()
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

/// Analyzer returning the same faces for every image
pub struct FixedAnalyzer {
    pub faces: Vec<FaceDetection>,
    pub calls: usize,
    pub seen_sizes: Vec<(u32, u32)>,
    pub fail: bool,
}

impl FixedAnalyzer {
    pub fn new(faces: Vec<FaceDetection>) -> Self {
        Self {
            faces,
            calls: 0,
            seen_sizes: Vec::new(),
            fail: false,
        }
    }
}

impl FaceAnalyzer for FixedAnalyzer {
    fn analyze(&mut self, image: &RgbImage) -> Result<Vec<FaceDetection>> {
        self.calls += 1;
        self.seen_sizes.push(image.dimensions());
        if self.fail {
            return Err(VisionError::Inference("model crashed".to_string()));
        }
        Ok(self.faces.clone())
    }
}

pub fn face(embedding: Vec<f32>, location: FaceBox) -> FaceDetection {
    FaceDetection {
        location,
        embedding: FaceEmbedding::new(embedding),
    }
}

/// Tracker returning one scripted hand list per call, then nothing
pub struct ScriptedTracker {
    frames: VecDeque<Vec<Hand>>,
}

impl ScriptedTracker {
    pub fn new(frames: Vec<Vec<Hand>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl HandTracker for ScriptedTracker {
    fn track(&mut self, _image: &RgbImage) -> Result<Vec<Hand>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

/// Preview that records frames and asks to quit after `quit_after` of them
#[derive(Default)]
pub struct RecordingPreview {
    pub presented: Vec<RgbImage>,
    pub quit_after: Option<usize>,
}

impl PreviewSink for RecordingPreview {
    fn present(&mut self, frame: &RgbImage) -> Result<()> {
        self.presented.push(frame.clone());
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        self.quit_after
            .is_some_and(|n| self.presented.len() >= n)
    }
}

/// Pointer event seen by `RecordingPointer`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Move(i32, i32),
    Click(MouseButton),
}

/// Pointer that records every event
#[derive(Default)]
pub struct RecordingPointer {
    pub events: Vec<PointerEvent>,
    pub screen: (i32, i32),
}

impl PointerSink for RecordingPointer {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.events.push(PointerEvent::Move(x, y));
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.events.push(PointerEvent::Click(button));
        Ok(())
    }

    fn screen_size(&self) -> Result<(i32, i32)> {
        Ok(self.screen)
    }
}

/// Hand with every finger curled: tips below their base joints, thumb tip
/// to the right of its base.
pub fn closed_hand() -> Hand {
    let mut hand = Hand {
        confidence: 0.9,
        ..Hand::default()
    };
    for lm in hand.landmarks.iter_mut() {
        *lm = HandLandmark::new(0.5, 0.5);
    }
    // thumb: tip right of base
    hand.landmarks[3] = HandLandmark::new(0.40, 0.60);
    hand.landmarks[4] = HandLandmark::new(0.45, 0.60);
    // other fingers: tips below bases
    for (tip, base, x) in [(8, 6, 0.50), (12, 10, 0.55), (16, 14, 0.60), (20, 18, 0.65)] {
        hand.landmarks[base] = HandLandmark::new(x, 0.50);
        hand.landmarks[tip] = HandLandmark::new(x, 0.60);
    }
    hand
}

/// Raise a finger (1..=4) by moving its tip above the base
pub fn raise_finger(hand: &mut Hand, finger: usize) {
    let (tip, base) = [(8, 6), (12, 10), (16, 14), (20, 18)][finger - 1];
    let base_lm = hand.landmarks[base];
    hand.landmarks[tip] = HandLandmark::new(base_lm.x, base_lm.y - 0.1);
}

/// Extend the thumb by moving its tip left of the base
pub fn raise_thumb(hand: &mut Hand) {
    let base = hand.landmarks[3];
    hand.landmarks[4] = HandLandmark::new(base.x - 0.05, base.y);
}

/// Hand pointing with the index finger only, tip at (x, y)
pub fn pointing_hand(x: f32, y: f32) -> Hand {
    let mut hand = closed_hand();
    hand.landmarks[6] = HandLandmark::new(x, y + 0.1);
    hand.landmarks[8] = HandLandmark::new(x, y);
    hand
}
