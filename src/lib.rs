//! Gesture Vision - webcam face matching and hand-gesture mouse control
//!
//! Two small camera tools built on ONNX perception models: `face-match`
//! compares every face on the webcam against one reference photo, and
//! `gesture-mouse` moves and clicks the OS pointer from hand gestures.

pub mod camera;
pub mod display;
pub mod error;
pub mod face_match;
pub mod gesture;
pub mod input;
pub mod logging;
pub mod ml;
pub mod overlay;
pub mod settings;

#[cfg(test)]
mod testing;

pub use error::{Result, VisionError};
pub use settings::AppConfig;
