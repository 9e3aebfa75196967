//! Tick-driven timers
//!
//! "Wait N seconds then act" is an accumulator advanced once per tick,
//! never a suspended task. Resetting the accumulator restarts the wait.

/// Accumulates elapsed time and fires each time it crosses its interval
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTimer {
    interval: f32,
    elapsed: f32,
    running: bool,
}

impl CycleTimer {
    /// A running timer that fires every `interval` seconds
    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(f32::EPSILON),
            elapsed: 0.0,
            running: true,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a full interval has accumulated since the last reset
    pub fn is_ready(&self) -> bool {
        self.elapsed >= self.interval
    }

    /// Adds time without consuming it
    pub fn accumulate(&mut self, delta_secs: f32) {
        if self.running {
            self.elapsed = (self.elapsed + delta_secs.max(0.0)).min(f32::MAX);
        }
    }

    /// Advances the timer and returns how many intervals completed
    ///
    /// The count saturates at `u32::MAX`; the leftover always ends below
    /// one interval.
    pub fn tick(&mut self, delta_secs: f32) -> u32 {
        self.accumulate(delta_secs);
        if !self.running || !self.is_ready() {
            return 0;
        }
        let fired = (self.elapsed / self.interval).floor();
        self.elapsed %= self.interval;
        fired as u32
    }

    /// Consumes a single interval if one has accumulated
    ///
    /// For callers whose interval changes after every firing.
    pub fn try_consume(&mut self) -> bool {
        if !self.running || !self.is_ready() {
            return false;
        }
        self.elapsed -= self.interval;
        true
    }

    /// Drops whole multiples of `period` from the accumulated time
    pub fn discard_periods(&mut self, period: f32) {
        if period > 0.0 {
            self.elapsed %= period;
        }
    }

    /// Restarts the wait from zero
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.running = true;
    }

    /// Stops the timer; it neither accumulates nor fires until reset
    pub fn cancel(&mut self) {
        self.elapsed = 0.0;
        self.running = false;
    }

    pub fn set_interval(&mut self, interval: f32) {
        self.interval = interval.max(f32::EPSILON);
    }
}
