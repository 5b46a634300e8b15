//! Windowed frames-per-second estimate.
//!
//! Every `window` captures the estimator computes `window / elapsed`, re-anchors
//! the window at that instant, and holds the value until the next window
//! completes.

use anyhow::{anyhow, Result};
use std::time::Instant;

pub const DEFAULT_RATE_WINDOW: u32 = 10;

#[derive(Clone, Debug)]
pub struct RateEstimator {
    window: u32,
    count: u32,
    start: Instant,
    fps: Option<f64>,
}

impl RateEstimator {
    /// Anchor the first window now.
    pub fn new(window: u32) -> Result<Self> {
        Self::starting_at(window, Instant::now())
    }

    /// Anchor the first window at `start`.
    pub fn starting_at(window: u32, start: Instant) -> Result<Self> {
        if window == 0 {
            return Err(anyhow!("rate window must be at least one frame"));
        }
        Ok(Self {
            window,
            count: 0,
            start,
            fps: None,
        })
    }

    /// Record one capture now. Returns the new value when a window completes.
    pub fn record_capture(&mut self) -> Option<f64> {
        self.record_capture_at(Instant::now())
    }

    pub fn record_capture_at(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;
        if self.count < self.window {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        self.count = 0;
        self.start = now;
        if elapsed <= 0.0 {
            // Keep the previous value rather than reporting an infinite rate.
            return None;
        }
        let fps = self.window as f64 / elapsed;
        self.fps = Some(fps);
        Some(fps)
    }

    /// Last computed value; `None` until the first window completes.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }
}
