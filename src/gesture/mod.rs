//! Hand gesture classification
//!
//! Turns a hand landmark set into a finger state, and a finger state plus
//! fingertip distances into pointer actions. Landmark indices follow the
//! MediaPipe hand model: 4/8/12/16/20 are the fingertips.

use crate::ml::{Hand, HandLandmark};

mod controller;
mod pipeline;

pub use controller::{ActiveRegion, ClickDebounce, CursorSmoother, GestureController, PointerAction};
pub use pipeline::{run_gesture_mouse, GestureSummary};

/// Fingertip landmarks: thumb, index, middle, ring, pinky
pub const FINGER_TIPS: [usize; 5] = [4, 8, 12, 16, 20];
/// Joint each tip is compared against
pub const FINGER_BASES: [usize; 5] = [3, 6, 10, 14, 18];

pub const THUMB_TIP: usize = FINGER_TIPS[0];
pub const INDEX_TIP: usize = FINGER_TIPS[1];
pub const MIDDLE_TIP: usize = FINGER_TIPS[2];

/// Which fingers are extended: thumb, index, middle, ring, pinky
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerState(pub [bool; 5]);

impl FingerState {
    pub fn thumb(&self) -> bool {
        self.0[0]
    }

    pub fn index(&self) -> bool {
        self.0[1]
    }

    pub fn middle(&self) -> bool {
        self.0[2]
    }

    /// 0/1 form, e.g. `[0, 1, 0, 0, 0]`
    pub fn as_bits(&self) -> [u8; 5] {
        self.0.map(u8::from)
    }

    /// Only the index finger is up
    pub fn is_pointing(&self) -> bool {
        self.0 == [false, true, false, false, false]
    }
}

/// Decide which fingers are extended.
///
/// The thumb counts as extended when its tip is left of its base joint;
/// the other fingers when the tip is above the base (smaller y).
pub fn fingers_up(hand: &Hand) -> FingerState {
    let lm = &hand.landmarks;
    let mut state = [false; 5];

    state[0] = lm[FINGER_TIPS[0]].x < lm[FINGER_BASES[0]].x;
    for finger in 1..5 {
        state[finger] = lm[FINGER_TIPS[finger]].y < lm[FINGER_BASES[finger]].y;
    }

    FingerState(state)
}

/// Planar distance between two landmarks in normalized units
pub fn landmark_distance(a: &HandLandmark, b: &HandLandmark) -> f32 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{closed_hand, raise_finger, raise_thumb};

    #[test]
    fn test_all_fingers_down() {
        assert_eq!(fingers_up(&closed_hand()).as_bits(), [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_index_only() {
        let mut hand = closed_hand();
        raise_finger(&mut hand, 1);

        let state = fingers_up(&hand);
        assert_eq!(state.as_bits(), [0, 1, 0, 0, 0]);
        assert!(state.is_pointing());
    }

    #[test]
    fn test_thumb_uses_horizontal_axis() {
        let mut hand = closed_hand();
        // moving the thumb tip upwards does not extend it
        hand.landmarks[THUMB_TIP].y = 0.1;
        assert!(!fingers_up(&hand).thumb());

        raise_thumb(&mut hand);
        assert!(fingers_up(&hand).thumb());
    }

    #[test]
    fn test_open_hand() {
        let mut hand = closed_hand();
        raise_thumb(&mut hand);
        for finger in 1..=4 {
            raise_finger(&mut hand, finger);
        }

        let state = fingers_up(&hand);
        assert_eq!(state.as_bits(), [1, 1, 1, 1, 1]);
        assert!(!state.is_pointing());
    }

    #[test]
    fn test_landmark_distance() {
        let a = HandLandmark::new(0.1, 0.1);
        let b = HandLandmark { x: 0.4, y: 0.5, z: 0.9 };
        assert!((landmark_distance(&a, &b) - 0.5).abs() < 1e-6);
    }
}
