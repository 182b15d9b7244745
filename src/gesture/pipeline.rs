//! Gesture mouse loop: capture, track, classify, dispatch.

use super::{GestureController, PointerAction};
use crate::camera::FrameSource;
use crate::error::Result;
use crate::input::{MouseButton, PointerSink};
use crate::ml::HandTracker;

/// Counters reported when the loop ends
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GestureSummary {
    pub frames: u64,
    pub hands: u64,
    pub moves: u64,
    pub left_clicks: u64,
    pub right_clicks: u64,
}

impl GestureSummary {
    fn record(&mut self, action: PointerAction) {
        match action {
            PointerAction::MoveTo { .. } => self.moves += 1,
            PointerAction::Click(MouseButton::Left) => self.left_clicks += 1,
            PointerAction::Click(MouseButton::Right) => self.right_clicks += 1,
        }
    }
}

fn dispatch<P: PointerSink + ?Sized>(pointer: &mut P, action: PointerAction) -> Result<()> {
    match action {
        PointerAction::MoveTo { x, y } => pointer.move_to(x, y),
        PointerAction::Click(button) => {
            log::debug!("{:?} click", button);
            pointer.click(button)
        }
    }
}

/// Run until the frame source ends (`Ok`) or fails (`Err`).
///
/// A tracking failure only drops the current frame.
pub fn run_gesture_mouse<T, S, P>(
    controller: &mut GestureController,
    tracker: &mut T,
    source: &mut S,
    pointer: &mut P,
) -> Result<GestureSummary>
where
    T: HandTracker + ?Sized,
    S: FrameSource + ?Sized,
    P: PointerSink + ?Sized,
{
    let mut summary = GestureSummary::default();

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Frame source ended");
                break;
            }
            Err(e) => {
                log::error!("Capture failed after {} frames: {}", summary.frames, e);
                return Err(e);
            }
        };
        summary.frames += 1;

        let hands = match tracker.track(&frame.image) {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("Hand tracking failed on frame {}: {}", frame.frame_number, e);
                continue;
            }
        };
        summary.hands += hands.len() as u64;

        for action in controller.process_frame(&hands, frame.timestamp) {
            dispatch(pointer, action)?;
            summary.record(action);
        }
    }

    log::info!(
        "{} frames, {} hand(s), {} move(s), {} left / {} right click(s)",
        summary.frames,
        summary.hands,
        summary.moves,
        summary.left_clicks,
        summary.right_clicks
    );
    Ok(summary)
}
