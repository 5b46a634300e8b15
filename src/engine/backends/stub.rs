use std::time::Duration;

use anyhow::Result;
use image::RgbImage;
use rand::Rng;

use crate::engine::backend::InferenceBackend;
use crate::engine::result::{Category, Detection, Payload};

const BRIGHT_LUMA: u8 = 200;

/// Stub backend for demos and tests.
///
/// Reports one detection covering the bright pixels in the image (luma above a
/// fixed threshold), scored by how densely they fill their bounding box. An
/// optional simulated latency with random jitter lets a worker pool complete
/// requests out of order.
pub struct StubBackend {
    label: String,
    latency: Duration,
    jitter: Duration,
    score_threshold: f32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            label: "bright_object".to_string(),
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            score_threshold: 0.0,
        }
    }

    /// Simulate model latency of `base` plus up to `jitter`.
    pub fn with_latency(mut self, base: Duration, jitter: Duration) -> Self {
        self.latency = base;
        self.jitter = jitter;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Drop the detection when its score is below `threshold`.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn simulate_latency(&self) {
        let mut delay = self.latency;
        if !self.jitter.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=self.jitter.as_micros() as u64);
            delay += Duration::from_micros(extra);
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Payload> {
        self.simulate_latency();

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut bright = 0u64;
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let luma = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
            if luma >= BRIGHT_LUMA as u32 {
                bright += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        if bright == 0 {
            return Ok(Payload::Detections(Vec::new()));
        }

        let box_w = max_x - min_x + 1;
        let box_h = max_y - min_y + 1;
        let score = (bright as f32 / (box_w as u64 * box_h as u64) as f32).min(1.0);
        if score < self.score_threshold {
            return Ok(Payload::Detections(Vec::new()));
        }
        let (width, height) = (image.width() as f32, image.height() as f32);

        Ok(Payload::Detections(vec![Detection {
            x: min_x as f32 / width,
            y: min_y as f32 / height,
            w: box_w as f32 / width,
            h: box_h as f32 / height,
            category: Category {
                label: self.label.clone(),
                score,
            },
        }]))
    }
}
