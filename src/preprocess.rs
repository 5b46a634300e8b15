//! Frame preprocessing.
//!
//! Turns a `Frame` into an `InferenceRequest` shaped for the engine. Pure and
//! deterministic: the same frame and policy always yield the same request.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::engine::{InferenceRequest, SourceRegion};
use crate::frame::Frame;

/// How a frame is resized before inference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Send the frame at capture size.
    #[default]
    Passthrough,
    /// Scale so the shorter side matches the target, then crop the centred
    /// target-sized region. Output is exactly `width x height`.
    CenterCrop { width: u32, height: u32 },
    /// Scale down until the frame fits inside `width x height`, keeping
    /// aspect ratio. Smaller frames are sent as captured.
    FitWithin { width: u32, height: u32 },
}

impl ResizePolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            ResizePolicy::Passthrough => Ok(()),
            ResizePolicy::CenterCrop { width, height }
            | ResizePolicy::FitWithin { width, height } => {
                if width == 0 || height == 0 {
                    Err(anyhow!("resize target must be non-zero, got {}x{}", width, height))
                } else {
                    Ok(())
                }
            }
        }
    }
}

const RESIZE_FILTER: FilterType = FilterType::Triangle;

#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    policy: ResizePolicy,
}

impl Preprocessor {
    pub fn new(policy: ResizePolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> ResizePolicy {
        self.policy
    }

    pub fn prepare(&self, frame: &Frame) -> InferenceRequest {
        let source = frame.image();
        let (width, height) = source.dimensions();
        let full = SourceRegion::full(width, height);
        if width == 0 || height == 0 {
            return InferenceRequest::new(frame.sequence(), source.clone(), full);
        }

        match self.policy {
            ResizePolicy::Passthrough => {
                InferenceRequest::new(frame.sequence(), source.clone(), full)
            }
            ResizePolicy::FitWithin {
                width: target_w,
                height: target_h,
            } => {
                let (w, h) = fit_within_dimensions(width, height, target_w, target_h);
                let image = if (w, h) == (width, height) {
                    source.clone()
                } else {
                    imageops::resize(source, w, h, RESIZE_FILTER)
                };
                InferenceRequest::new(frame.sequence(), image, full)
            }
            ResizePolicy::CenterCrop {
                width: target_w,
                height: target_h,
            } => {
                let (w, h) = cover_dimensions(width, height, target_w, target_h);
                let resized = imageops::resize(source, w, h, RESIZE_FILTER);
                let x = (w - target_w) / 2;
                let y = (h - target_h) / 2;
                let cropped = imageops::crop_imm(&resized, x, y, target_w, target_h).to_image();
                let region = crop_region_in_source(width, height, w, h, x, y, target_w, target_h);
                InferenceRequest::new(frame.sequence(), cropped, region)
            }
        }
    }
}

/// Smallest aspect-preserving size that covers the target on both axes.
pub fn cover_dimensions(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let scale = f64::max(
        target_w as f64 / width as f64,
        target_h as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).max(target_w);
    let h = ((height as f64 * scale).round() as u32).max(target_h);
    (w, h)
}

/// Largest aspect-preserving size that fits inside the target on both axes.
///
/// Frames that already fit are left at their size; sides are floored.
pub fn fit_within_dimensions(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if width <= target_w && height <= target_h {
        return (width, height);
    }
    let (w, h, tw, th) = (width as u64, height as u64, target_w as u64, target_h as u64);
    if tw * h <= th * w {
        (target_w, ((h * tw / w) as u32).max(1))
    } else {
        (((w * th / h) as u32).max(1), target_h)
    }
}

#[allow(clippy::too_many_arguments)]
fn crop_region_in_source(
    src_w: u32,
    src_h: u32,
    scaled_w: u32,
    scaled_h: u32,
    x: u32,
    y: u32,
    crop_w: u32,
    crop_h: u32,
) -> SourceRegion {
    let sx = src_w as f64 / scaled_w as f64;
    let sy = src_h as f64 / scaled_h as f64;
    SourceRegion {
        x: (x as f64 * sx).round() as u32,
        y: (y as f64 * sy).round() as u32,
        width: ((crop_w as f64 * sx).round() as u32).max(1),
        height: ((crop_h as f64 * sy).round() as u32).max(1),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame(width: u32, height: u32) -> Frame {
        // Left half red, right half blue.
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        Frame::new(image, 5)
    }

    #[test]
    fn center_crop_640x480_to_256() -> Result<()> {
        assert_eq!(cover_dimensions(640, 480, 256, 256), (341, 256));

        let pre = Preprocessor::new(ResizePolicy::CenterCrop {
            width: 256,
            height: 256,
        })?;
        let request = pre.prepare(&frame(640, 480));

        assert_eq!(request.sequence, 5);
        assert_eq!(request.image.dimensions(), (256, 256));
        // 42 px trimmed from the left of the 341 px intermediate.
        assert_eq!(
            request.region,
            SourceRegion {
                x: 79,
                y: 0,
                width: 480,
                height: 480
            }
        );
        // The centred crop keeps both halves of the source.
        let left = request.image.get_pixel(10, 128).0;
        let right = request.image.get_pixel(245, 128).0;
        assert!(left[0] > 200 && left[2] < 50);
        assert!(right[2] > 200 && right[0] < 50);
        Ok(())
    }

    #[test]
    fn center_crop_portrait_trims_vertically() {
        assert_eq!(cover_dimensions(480, 640, 256, 256), (256, 341));
    }

    #[test]
    fn fit_within_respects_both_sides_of_a_wide_box() {
        let (w, h) = fit_within_dimensions(1280, 720, 480, 200);
        assert_eq!((w, h), (355, 200));
        assert_eq!(fit_within_dimensions(720, 1280, 480, 200), (112, 200));
        assert_eq!(fit_within_dimensions(1280, 400, 480, 480), (480, 150));
    }

    #[test]
    fn fit_within_never_enlarges() -> Result<()> {
        assert_eq!(fit_within_dimensions(100, 50, 480, 480), (100, 50));

        let pre = Preprocessor::new(ResizePolicy::FitWithin {
            width: 480,
            height: 480,
        })?;
        let request = pre.prepare(&frame(100, 50));
        assert_eq!(request.image.dimensions(), (100, 50));
        Ok(())
    }

    #[test]
    fn fit_within_matches_longer_side() -> Result<()> {
        assert_eq!(fit_within_dimensions(1280, 720, 480, 480), (480, 270));
        assert_eq!(fit_within_dimensions(720, 1280, 480, 480), (270, 480));

        let pre = Preprocessor::new(ResizePolicy::FitWithin {
            width: 480,
            height: 480,
        })?;
        let request = pre.prepare(&frame(1280, 720));
        assert_eq!(request.image.dimensions(), (480, 270));
        assert_eq!(request.region, SourceRegion::full(1280, 720));
        Ok(())
    }

    #[test]
    fn passthrough_keeps_frame_size() -> Result<()> {
        let pre = Preprocessor::new(ResizePolicy::Passthrough)?;
        let request = pre.prepare(&frame(64, 48));
        assert_eq!(request.image.dimensions(), (64, 48));
        Ok(())
    }

    #[test]
    fn zero_target_is_rejected() {
        assert!(Preprocessor::new(ResizePolicy::CenterCrop {
            width: 0,
            height: 256
        })
        .is_err());
    }

    #[test]
    fn policy_deserializes_from_config() -> Result<()> {
        let policy: ResizePolicy =
            serde_json::from_str(r#"{"policy":"center_crop","width":224,"height":224}"#)?;
        assert_eq!(
            policy,
            ResizePolicy::CenterCrop {
                width: 224,
                height: 224
            }
        );
        Ok(())
    }
}
