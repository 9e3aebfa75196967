//! Turn indicators derived from the look-ahead steering

use super::timer::CycleTimer;
use super::types::BLINKER_THRESHOLD;

/// Time each blink phase (lit / dark) lasts
pub const BLINK_HALF_PERIOD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkerSide {
    Left,
    Right,
}

/// Left/right indicator pair; at most one side is active at a time
#[derive(Debug, Clone, PartialEq)]
pub struct Blinkers {
    active: Option<BlinkerSide>,
    lit: bool,
    timer: CycleTimer,
}

impl Default for Blinkers {
    fn default() -> Self {
        let mut timer = CycleTimer::new(BLINK_HALF_PERIOD);
        timer.cancel();
        Self {
            active: None,
            lit: false,
            timer,
        }
    }
}

impl Blinkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the indicators from `future_steering`
    ///
    /// Past -0.6 the left side switches on, past 0.6 the right side. Inside
    /// the band both go dark. A side that is already active keeps its blink
    /// phase.
    pub fn update(&mut self, future_steering: f32, delta_secs: f32) {
        let wanted = if future_steering < -BLINKER_THRESHOLD {
            Some(BlinkerSide::Left)
        } else if future_steering > BLINKER_THRESHOLD {
            Some(BlinkerSide::Right)
        } else {
            None
        };

        match wanted {
            Some(side) if self.active != Some(side) => {
                self.active = Some(side);
                self.lit = true;
                self.timer.reset();
            }
            Some(_) => {
                if self.timer.tick(delta_secs) % 2 == 1 {
                    self.lit = !self.lit;
                }
            }
            None => {
                self.active = None;
                self.lit = false;
                self.timer.cancel();
            }
        }
    }

    pub fn active(&self) -> Option<BlinkerSide> {
        self.active
    }

    pub fn left_active(&self) -> bool {
        self.active == Some(BlinkerSide::Left)
    }

    pub fn right_active(&self) -> bool {
        self.active == Some(BlinkerSide::Right)
    }

    /// Whether the left lamp is currently lit
    pub fn left_lit(&self) -> bool {
        self.left_active() && self.lit
    }

    /// Whether the right lamp is currently lit
    pub fn right_lit(&self) -> bool {
        self.right_active() && self.lit
    }
}
