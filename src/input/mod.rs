//! OS pointer output
//!
//! `EnigoPointer` injects real mouse events; `LoggingPointer` only logs them
//! and is used for dry runs.

use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::error::{Result, VisionError};

/// Mouse button
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

impl From<MouseButton> for Button {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        }
    }
}

/// Where pointer actions go
pub trait PointerSink {
    /// Move the cursor to absolute screen coordinates
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;

    /// Press and release a button
    fn click(&mut self, button: MouseButton) -> Result<()>;

    /// Main display size in pixels
    fn screen_size(&self) -> Result<(i32, i32)>;
}

impl<T: PointerSink + ?Sized> PointerSink for Box<T> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        (**self).click(button)
    }

    fn screen_size(&self) -> Result<(i32, i32)> {
        (**self).screen_size()
    }
}

/// System mouse through enigo
pub struct EnigoPointer {
    enigo: Enigo,
}

impl EnigoPointer {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            VisionError::Pointer(format!("Failed to connect to input backend: {}", e))
        })?;
        Ok(Self { enigo })
    }
}

impl PointerSink for EnigoPointer {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| VisionError::Pointer(format!("Failed to move to ({}, {}): {}", x, y, e)))
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.enigo
            .button(button.into(), Direction::Click)
            .map_err(|e| VisionError::Pointer(format!("Failed to click {:?}: {}", button, e)))
    }

    fn screen_size(&self) -> Result<(i32, i32)> {
        self.enigo
            .main_display()
            .map_err(|e| VisionError::Pointer(format!("Failed to query screen size: {}", e)))
    }
}

/// Pointer that logs actions instead of performing them
#[derive(Clone, Debug)]
pub struct LoggingPointer {
    screen: (i32, i32),
    position: (i32, i32),
}

impl LoggingPointer {
    pub fn new(screen: (i32, i32)) -> Self {
        Self {
            screen,
            position: (0, 0),
        }
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }
}

impl PointerSink for LoggingPointer {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.position = (x, y);
        log::info!("move to ({}, {})", x, y);
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        log::info!("{:?} click at {:?}", button, self.position);
        Ok(())
    }

    fn screen_size(&self) -> Result<(i32, i32)> {
        Ok(self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_mapping() {
        assert!(matches!(Button::from(MouseButton::Left), Button::Left));
        assert!(matches!(Button::from(MouseButton::Right), Button::Right));
    }

    #[test]
    fn test_logging_pointer_tracks_position() {
        let mut pointer: Box<dyn PointerSink> = Box::new(LoggingPointer::new((1280, 720)));
        pointer.move_to(10, 20).unwrap();
        pointer.click(MouseButton::Left).unwrap();
        assert_eq!(pointer.screen_size().unwrap(), (1280, 720));
    }
}
