//! Frame ingestion.
//!
//! This module provides the capture side of the pipeline:
//! - `CaptureDevice`: the device collaborator (read a bitmap, close)
//! - `FrameSource`: wraps a device, assigns sequence numbers, mirrors frames
//!   and applies the consecutive-failure policy
//! - Synthetic `stub://` camera (testing, demos)
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! Device failures never abort the process: the source logs them and, once the
//! failure budget is spent, reports end-of-stream so the pipeline can shut down
//! and release the device.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod source;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use image::RgbImage;

pub use source::{FrameSource, SourceConfig, SourceStats};
pub use synthetic::{SyntheticCamera, SyntheticConfig};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Camera, V4l2Config};

/// Capture device collaborator.
///
/// Devices are opened by their constructors (see `open_device`). After that the
/// frame source only reads and eventually closes them.
pub trait CaptureDevice: Send {
    /// Human-readable device identifier for logs.
    fn name(&self) -> &str;

    /// Block until the next bitmap is available.
    ///
    /// - `Ok(Some(image))`: a frame was captured
    /// - `Ok(None)`: the device is exhausted (finite sources)
    /// - `Err(_)`: the capture failed; the caller decides whether to retry
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Release the device. Must be idempotent.
    fn close(&mut self) {}
}

/// Which device to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSpec {
    /// Local camera index (`/dev/video<N>` on Linux).
    Camera(u32),
    /// Explicit device URL or path. `stub://` selects the synthetic camera.
    Url(String),
}

impl DeviceSpec {
    /// `--url` wins over `--camera_id` when both are present.
    pub fn from_parts(url: Option<&str>, camera_id: u32) -> Self {
        match url {
            Some(url) if !url.trim().is_empty() => DeviceSpec::Url(url.trim().to_string()),
            _ => DeviceSpec::Camera(camera_id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DeviceSpec::Camera(id) => format!("camera:{}", id),
            DeviceSpec::Url(url) => url.clone(),
        }
    }
}

/// Open a capture device. Failure here is the one unrecoverable startup error.
///
/// `target_fps` of 0 leaves the device at its default rate. A `fps=` query on
/// a `stub://` URL takes precedence.
pub fn open_device(
    spec: &DeviceSpec,
    width: u32,
    height: u32,
    target_fps: u32,
) -> Result<Box<dyn CaptureDevice>> {
    match spec {
        DeviceSpec::Url(url) if url.starts_with("stub://") => {
            let mut config = SyntheticConfig::from_url(url, width, height)?;
            if config.target_fps == 0 {
                config.target_fps = target_fps;
            }
            Ok(Box::new(SyntheticCamera::open(config)))
        }
        DeviceSpec::Url(url) if url.contains("://") => Err(anyhow!(
            "unsupported device url '{}'; expected stub:// or a local device path",
            url
        )),
        #[cfg(feature = "ingest-v4l2")]
        DeviceSpec::Url(path) => Ok(Box::new(V4l2Camera::open(V4l2Config {
            device: path.clone(),
            width,
            height,
            target_fps,
            ..V4l2Config::default()
        })?)),
        #[cfg(feature = "ingest-v4l2")]
        DeviceSpec::Camera(id) => Ok(Box::new(V4l2Camera::open(V4l2Config {
            device: format!("/dev/video{}", id),
            width,
            height,
            target_fps,
            ..V4l2Config::default()
        })?)),
        #[cfg(not(feature = "ingest-v4l2"))]
        other => Err(anyhow!(
            "capture from {} requires the ingest-v4l2 feature; use --url stub://<name> instead",
            other.describe()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_overrides_camera_id() {
        assert_eq!(
            DeviceSpec::from_parts(Some("stub://desk"), 3),
            DeviceSpec::Url("stub://desk".to_string())
        );
        assert_eq!(DeviceSpec::from_parts(Some("  "), 3), DeviceSpec::Camera(3));
        assert_eq!(DeviceSpec::from_parts(None, 0), DeviceSpec::Camera(0));
    }

    #[test]
    fn opens_synthetic_device() -> Result<()> {
        let mut device = open_device(&DeviceSpec::Url("stub://test".into()), 32, 24, 0)?;
        let image = device.read_frame()?.expect("synthetic frame");
        assert_eq!(image.dimensions(), (32, 24));
        Ok(())
    }

    #[test]
    fn rejects_remote_urls() {
        let result = open_device(&DeviceSpec::Url("rtsp://camera".into()), 32, 24, 0);
        assert!(result.is_err());
    }

    #[test]
    fn requested_rate_paces_synthetic_reads() -> Result<()> {
        let mut device = open_device(&DeviceSpec::Url("stub://paced".into()), 16, 16, 50)?;
        let start = std::time::Instant::now();
        for _ in 0..3 {
            assert!(device.read_frame()?.is_some());
        }
        // Two paced gaps of 20ms each.
        assert!(start.elapsed() >= std::time::Duration::from_millis(35));
        Ok(())
    }
}
