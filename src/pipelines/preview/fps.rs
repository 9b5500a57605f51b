// SPDX-License-Identifier: GPL-3.0-only

//! Frames-per-second measurement over fixed windows

use crate::constants::fps::WINDOW;
use std::time::{Duration, Instant};

/// Counts completed frames per window and derives an integer rate
///
/// When a window of at least one second has elapsed the rate is
/// `count * 1000 / elapsed_ms`, truncated toward zero, and a new window
/// starts at that instant. A window with no frames yields 0.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    count: u64,
    window_start: Instant,
    window: Duration,
    rate: u32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Meter whose first window begins at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            count: 0,
            window_start: start,
            window: WINDOW,
            rate: 0,
        }
    }

    /// Count one completed frame at `now`
    ///
    /// Returns the new rate if this completion closed a window.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.count += 1;
        self.poll(now)
    }

    /// Close the window if it has run its length, without counting a frame
    ///
    /// Used to publish 0 when frames stop arriving.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let elapsed_ms = elapsed.as_millis() as u64;
        self.rate = if elapsed_ms == 0 {
            0
        } else {
            (self.count * 1000 / elapsed_ms) as u32
        };
        self.count = 0;
        self.window_start = now;
        Some(self.rate)
    }

    /// Last published rate
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Frames counted in the current window
    pub fn pending(&self) -> u64 {
        self.count
    }

    /// Forget everything and start a new window at `now`
    pub fn reset(&mut self, now: Instant) {
        *self = Self::starting_at(now);
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_frames_over_one_second() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(start);
        let n = 30u64;
        let mut published = None;
        for k in 1..=n {
            let at = start + Duration::from_millis(k * 1000 / n);
            if let Some(rate) = meter.record(at) {
                published = Some(rate);
            }
        }
        assert_eq!(published, Some(30));
        assert_eq!(meter.rate(), 30);
        assert_eq!(meter.pending(), 0);
    }

    #[test]
    fn test_empty_window_is_zero() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(start);
        assert_eq!(meter.poll(start + Duration::from_millis(999)), None);
        assert_eq!(meter.poll(start + Duration::from_millis(1000)), Some(0));
    }

    #[test]
    fn test_rate_truncates() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(start);
        for _ in 0..9 {
            meter.record(start + Duration::from_millis(500));
        }
        // 10 frames over 1500ms is 6.67 per second
        assert_eq!(meter.record(start + Duration::from_millis(1500)), Some(6));
    }

    #[test]
    fn test_window_restarts_at_publish() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(start);
        meter.record(start + Duration::from_millis(1000));
        assert_eq!(meter.record(start + Duration::from_millis(1500)), None);
        assert_eq!(meter.poll(start + Duration::from_millis(2000)), Some(1));
    }
}
