//! Swipe-up-to-unlock on the lock screen.
//!
//! Only vertical displacement matters; there is no velocity component.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { y: f64 },
    Move { y: f64 },
    Up { y: f64 },
    Cancel,
    Leave,
}

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
enum GesturePhase {
    #[default]
    Idle,
    Tracking,
}

#[derive(Debug, Clone)]
pub struct SwipeUnlock {
    threshold: f64,
    phase: GesturePhase,
    start_y: f64,
    drag_offset: f64,
}

impl SwipeUnlock {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(1.0),
            phase: GesturePhase::Idle,
            start_y: 0.0,
            drag_offset: 0.0,
        }
    }

    /// Feeds one pointer event. Returns `true` when the gesture completes as an unlock.
    #[must_use]
    pub fn handle(&mut self, event: PointerEvent) -> bool {
        match (self.phase, event) {
            (_, PointerEvent::Down { y }) => {
                self.phase = GesturePhase::Tracking;
                self.start_y = y;
                self.drag_offset = 0.0;
                false
            }
            (GesturePhase::Tracking, PointerEvent::Move { y }) => {
                self.track(y);
                false
            }
            (GesturePhase::Tracking, PointerEvent::Up { y }) => {
                self.track(y);
                self.finish()
            }
            (GesturePhase::Tracking, PointerEvent::Cancel | PointerEvent::Leave) => self.finish(),
            (GesturePhase::Idle, _) => false,
        }
    }

    /// Current upward displacement, always `<= 0`.
    pub fn drag_offset(&self) -> f64 { self.drag_offset }

    /// Opacity for lock-screen chrome, fading out as the drag approaches the threshold.
    pub fn chrome_opacity(&self) -> f64 { (1.0 - self.drag_offset.abs() / self.threshold).clamp(0.0, 1.0) }

    pub fn is_tracking(&self) -> bool { self.phase == GesturePhase::Tracking }

    pub fn threshold(&self) -> f64 { self.threshold }

    pub fn reset(&mut self) {
        self.phase = GesturePhase::Idle;
        self.start_y = 0.0;
        self.drag_offset = 0.0;
    }

    fn track(&mut self, y: f64) { self.drag_offset = (y - self.start_y).min(0.0); }

    fn finish(&mut self) -> bool {
        let unlocked = self.drag_offset < 0.0 && self.drag_offset.abs() >= self.threshold;
        trace!(offset = self.drag_offset, unlocked, "swipe finished");
        self.reset();
        unlocked
    }
}

impl Default for SwipeUnlock {
    fn default() -> Self { Self::new(64.0) }
}
