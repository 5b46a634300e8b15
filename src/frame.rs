//! Captured frame container.
//!
//! - `Frame`: immutable RGB snapshot tagged with its capture sequence number.
//!
//! Frames are created only by the ingestion layer (`FrameSource`). Once created
//! the pixels are never mutated: downstream stages borrow them, and the renderer
//! draws onto an owned copy obtained through `Frame::annotated_copy`.

use image::RgbImage;
use std::time::{Duration, Instant, SystemTime};

/// One captured image plus its sequence number and capture timestamps.
///
/// There is no `Clone` and no mutable pixel accessor. A frame moves from the
/// source into the pipeline loop and is dropped once rendered.
#[derive(Debug)]
pub struct Frame {
    /// Private pixel data. Read-only once captured.
    image: RgbImage,

    /// Capture order, starting at 1 with no gaps.
    sequence: u64,

    /// Wall-clock capture time (for display/logging).
    captured_at: SystemTime,

    /// Monotonic capture instant (for latency measurements).
    capture_instant: Instant,
}

impl Frame {
    /// Create a new frame. Called only by the ingestion layer.
    pub(crate) fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: SystemTime::now(),
            capture_instant: Instant::now(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Shared view of the pixels.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Time elapsed since capture.
    pub fn age(&self) -> Duration {
        self.capture_instant.elapsed()
    }

    /// Owned copy of the pixels for the renderer to draw on.
    pub fn annotated_copy(&self) -> RgbImage {
        self.image.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
