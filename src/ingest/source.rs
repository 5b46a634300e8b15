//! Sequenced frame source.
//!
//! `FrameSource` is the only producer of `Frame` values. It is responsible for:
//! - Assigning sequence numbers (1, 2, 3, ... with no gaps)
//! - Mirroring frames horizontally (selfie view)
//! - Turning device exhaustion and repeated failures into end-of-stream
//! - Closing the device exactly once

use image::imageops;

use super::CaptureDevice;
use crate::frame::Frame;

/// Frame source policy.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Flip frames horizontally before they enter the pipeline.
    pub mirror: bool,
    /// Consecutive failed reads tolerated before the stream ends.
    /// 1 ends the stream on the first failure.
    pub max_consecutive_failures: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            max_consecutive_failures: 1,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub failed_reads: u64,
    pub ended: bool,
}

pub struct FrameSource {
    device: Box<dyn CaptureDevice>,
    config: SourceConfig,
    last_sequence: u64,
    consecutive_failures: u32,
    failed_reads: u64,
    ended: bool,
    closed: bool,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>, config: SourceConfig) -> Self {
        Self {
            device,
            config,
            last_sequence: 0,
            consecutive_failures: 0,
            failed_reads: 0,
            ended: false,
            closed: false,
        }
    }

    /// Block until the next frame, or return `None` at end-of-stream.
    ///
    /// Failed reads do not consume a sequence number.
    pub fn next(&mut self) -> Option<Frame> {
        if self.ended || self.closed {
            return None;
        }
        loop {
            match self.device.read_frame() {
                Ok(Some(mut image)) => {
                    self.consecutive_failures = 0;
                    if self.config.mirror {
                        imageops::flip_horizontal_in_place(&mut image);
                    }
                    self.last_sequence += 1;
                    return Some(Frame::new(image, self.last_sequence));
                }
                Ok(None) => {
                    log::info!("FrameSource: {} exhausted", self.device.name());
                    self.ended = true;
                    return None;
                }
                Err(err) => {
                    self.failed_reads += 1;
                    self.consecutive_failures += 1;
                    log::warn!(
                        "FrameSource: failed to grab frame from {} ({}/{}): {:#}",
                        self.device.name(),
                        self.consecutive_failures,
                        self.config.max_consecutive_failures.max(1),
                        err
                    );
                    if self.consecutive_failures >= self.config.max_consecutive_failures.max(1) {
                        log::warn!(
                            "FrameSource: ending stream from {} after {} consecutive failures",
                            self.device.name(),
                            self.consecutive_failures
                        );
                        self.ended = true;
                        return None;
                    }
                }
            }
        }
    }

    /// Release the capture device. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.device.close();
        self.closed = true;
        log::info!(
            "FrameSource: released {} after {} frames",
            self.device.name(),
            self.last_sequence
        );
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.last_sequence,
            failed_reads: self.failed_reads,
            ended: self.ended,
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
