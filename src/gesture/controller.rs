//! Gesture controller: finger state to pointer actions, with click
//! debouncing and cursor smoothing state kept across frames.

use std::time::{Duration, Instant};

use super::{fingers_up, landmark_distance, INDEX_TIP, MIDDLE_TIP, THUMB_TIP};
use crate::input::MouseButton;
use crate::ml::{Hand, HandLandmark};
use crate::settings::GestureSettings;

/// Pointer action derived from one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    MoveTo { x: i32, y: i32 },
    Click(MouseButton),
}

/// Centered part of the frame that maps onto the whole screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveRegion {
    frame_width: f32,
    frame_height: f32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl ActiveRegion {
    /// Region covering `fraction` of each frame dimension, centered
    pub fn centered(frame_width: u32, frame_height: u32, fraction: f32) -> Self {
        let width = ((frame_width as f32 * fraction) as i32).max(1);
        let height = ((frame_height as f32 * fraction) as i32).max(1);

        Self {
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
            x: (frame_width as i32 - width) / 2,
            y: (frame_height as i32 - height) / 2,
            width,
            height,
        }
    }

    /// Pixel bounds as (x, y, width, height)
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }

    fn to_pixels(&self, landmark: &HandLandmark) -> (f32, f32) {
        (landmark.x * self.frame_width, landmark.y * self.frame_height)
    }

    /// Whether a normalized landmark lies inside the region (edges included)
    pub fn contains(&self, landmark: &HandLandmark) -> bool {
        let (px, py) = self.to_pixels(landmark);
        (self.x as f32..=(self.x + self.width) as f32).contains(&px)
            && (self.y as f32..=(self.y + self.height) as f32).contains(&py)
    }

    /// Linear map from region pixels to screen pixels
    pub fn to_screen(&self, landmark: &HandLandmark, screen: (i32, i32)) -> (i32, i32) {
        let (px, py) = self.to_pixels(landmark);
        let x_scale = screen.0 as f32 / self.width as f32;
        let y_scale = screen.1 as f32 / self.height as f32;

        (
            ((px - self.x as f32) * x_scale) as i32,
            ((py - self.y as f32) * y_scale) as i32,
        )
    }
}

/// Exponential smoothing of the cursor position
#[derive(Clone, Debug)]
pub struct CursorSmoother {
    alpha: f64,
    prev: (i32, i32),
}

impl CursorSmoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha as f64,
            prev: (0, 0),
        }
    }

    /// Move a fraction `alpha` of the way towards `target`, truncating
    /// to whole pixels
    pub fn step(&mut self, target: (i32, i32)) -> (i32, i32) {
        let blend =
            |prev: i32, target: i32| (prev as f64 + self.alpha * (target - prev) as f64) as i32;
        self.prev = (blend(self.prev.0, target.0), blend(self.prev.1, target.1));
        self.prev
    }

    pub fn position(&self) -> (i32, i32) {
        self.prev
    }
}

/// Minimum interval between two clicks of the same button
#[derive(Clone, Debug)]
pub struct ClickDebounce {
    interval: Duration,
    last: Option<Instant>,
}

impl ClickDebounce {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_secs(secs: f32) -> Self {
        Self::new(Duration::from_secs_f32(secs.max(0.0)))
    }

    /// Record a click at `now` if the interval has passed since the last one
    pub fn try_fire(&mut self, now: Instant) -> bool {
        let ready = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };

        if ready {
            self.last = Some(self.last.map_or(now, |last| last.max(now)));
        }
        ready
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last
    }
}

/// Per-process gesture state
pub struct GestureController {
    region: ActiveRegion,
    screen: (i32, i32),
    smoother: CursorSmoother,
    left_click: ClickDebounce,
    right_click: ClickDebounce,
    pinch_threshold: f32,
    max_hands: usize,
}

impl GestureController {
    pub fn new(settings: &GestureSettings, frame_size: (u32, u32), screen: (i32, i32)) -> Self {
        let region =
            ActiveRegion::centered(frame_size.0, frame_size.1, settings.active_region_fraction);
        log::debug!("Active region {:?} mapped to screen {:?}", region.bounds(), screen);

        Self {
            region,
            screen,
            smoother: CursorSmoother::new(settings.smoothing_factor),
            left_click: ClickDebounce::from_secs(settings.left_click_interval_secs),
            right_click: ClickDebounce::from_secs(settings.right_click_interval_secs),
            pinch_threshold: settings.pinch_threshold,
            max_hands: settings.max_hands,
        }
    }

    pub fn region(&self) -> &ActiveRegion {
        &self.region
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.smoother.position()
    }

    /// Classify every tracked hand (up to `max_hands`) for this frame
    pub fn process_frame(&mut self, hands: &[Hand], now: Instant) -> Vec<PointerAction> {
        let mut actions = Vec::new();
        for hand in hands.iter().take(self.max_hands) {
            self.process_hand(hand, now, &mut actions);
        }
        actions
    }

    fn process_hand(&mut self, hand: &Hand, now: Instant, actions: &mut Vec<PointerAction>) {
        let fingers = fingers_up(hand);
        let lm = &hand.landmarks;
        log::trace!("Fingers {:?}", fingers.as_bits());

        if fingers.is_pointing() && self.region.contains(&lm[INDEX_TIP]) {
            let target = self.region.to_screen(&lm[INDEX_TIP], self.screen);
            let (x, y) = self.smoother.step(target);
            actions.push(PointerAction::MoveTo { x, y });
        }

        if fingers.thumb()
            && fingers.index()
            && landmark_distance(&lm[THUMB_TIP], &lm[INDEX_TIP]) < self.pinch_threshold
            && self.right_click.try_fire(now)
        {
            actions.push(PointerAction::Click(MouseButton::Right));
        }

        if fingers.index()
            && fingers.middle()
            && landmark_distance(&lm[INDEX_TIP], &lm[MIDDLE_TIP]) < self.pinch_threshold
            && self.left_click.try_fire(now)
        {
            actions.push(PointerAction::Click(MouseButton::Left));
        }
    }
}
