//! Preview window for annotated frames.

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{Result, VisionError};

/// Where annotated frames go
pub trait PreviewSink {
    /// Show a frame
    fn present(&mut self, frame: &RgbImage) -> Result<()>;

    /// True once the user asked to stop (quit key or window closed)
    fn quit_requested(&self) -> bool;
}

/// Parse a key name from the config: a single letter or digit, "escape" or "space"
pub fn parse_key(name: &str) -> Option<Key> {
    let lower = name.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "escape" | "esc" => Key::Escape,
        "space" => Key::Space,
        "a" => Key::A,
        "b" => Key::B,
        "c" => Key::C,
        "d" => Key::D,
        "e" => Key::E,
        "f" => Key::F,
        "g" => Key::G,
        "h" => Key::H,
        "i" => Key::I,
        "j" => Key::J,
        "k" => Key::K,
        "l" => Key::L,
        "m" => Key::M,
        "n" => Key::N,
        "o" => Key::O,
        "p" => Key::P,
        "q" => Key::Q,
        "r" => Key::R,
        "s" => Key::S,
        "t" => Key::T,
        "u" => Key::U,
        "v" => Key::V,
        "w" => Key::W,
        "x" => Key::X,
        "y" => Key::Y,
        "z" => Key::Z,
        "0" => Key::Key0,
        "1" => Key::Key1,
        "2" => Key::Key2,
        "3" => Key::Key3,
        "4" => Key::Key4,
        "5" => Key::Key5,
        "6" => Key::Key6,
        "7" => Key::Key7,
        "8" => Key::Key8,
        "9" => Key::Key9,
        _ => return None,
    };
    Some(key)
}

/// minifb-backed preview window
pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
    quit_key: Key,
}

impl PreviewWindow {
    pub fn new(title: &str, width: u32, height: u32, quit_key: Key) -> Result<Self> {
        let window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| VisionError::Display(format!("Failed to create window: {}", e)))?;

        log::info!("Preview window created: {}x{}", width, height);

        Ok(Self {
            window,
            buffer: Vec::new(),
            quit_key,
        })
    }
}

impl PreviewSink for PreviewWindow {
    fn present(&mut self, frame: &RgbImage) -> Result<()> {
        self.buffer.clear();
        self.buffer.extend(frame.pixels().map(|p| {
            let [r, g, b] = p.0;
            ((r as u32) << 16) | ((g as u32) << 8) | b as u32
        }));

        self.window
            .update_with_buffer(&self.buffer, frame.width() as usize, frame.height() as usize)
            .map_err(|e| VisionError::Display(format!("Window update failed: {}", e)))
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open() || self.window.is_key_down(self.quit_key)
    }
}
