//! Synthetic camera (`stub://`).
//!
//! Produces a dark gradient with a bright block sweeping across the frame, so
//! the stub backend has something to find. Query parameters:
//! - `frames=N`: device exhausts after N frames (default: unbounded)
//! - `fps=N`: pace reads to roughly N frames per second (default: unpaced)
//!
//! Example: `stub://desk?frames=100&fps=30`

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

use super::CaptureDevice;

/// Configuration for a synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
    pub target_fps: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
            frame_limit: None,
            target_fps: 0,
        }
    }
}

impl SyntheticConfig {
    pub fn from_url(url: &str, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("synthetic camera needs non-zero dimensions"));
        }
        let (name, query) = match url.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (url, None),
        };
        let mut config = Self {
            name: name.to_string(),
            width,
            height,
            ..Self::default()
        };
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
            match key {
                "frames" => {
                    config.frame_limit = Some(
                        value
                            .parse()
                            .map_err(|_| anyhow!("stub frames must be an integer"))?,
                    )
                }
                "fps" => {
                    config.target_fps = value
                        .parse()
                        .map_err(|_| anyhow!("stub fps must be an integer"))?
                }
                other => return Err(anyhow!("unknown stub query parameter '{}'", other)),
            }
        }
        Ok(config)
    }
}

pub struct SyntheticCamera {
    config: SyntheticConfig,
    frame_count: u64,
    last_read_at: Option<Instant>,
    open: bool,
}

impl SyntheticCamera {
    /// Synthetic cameras are always available.
    pub fn open(config: SyntheticConfig) -> Self {
        log::info!(
            "SyntheticCamera: opened {} ({}x{})",
            config.name,
            config.width,
            config.height
        );
        Self {
            config,
            frame_count: 0,
            last_read_at: None,
            open: true,
        }
    }

    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / self.config.target_fps as f64);
        if let Some(last) = self.last_read_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_read_at = Some(Instant::now());
    }

    fn generate(&self) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        let block = (width.min(height) / 4).max(1);
        let travel = width.saturating_sub(block).max(1) as u64;
        let block_x = ((self.frame_count * 8) % travel) as u32;
        let block_y = (height - block.min(height)) / 2;

        RgbImage::from_fn(width, height, |x, y| {
            let inside = x >= block_x && x < block_x + block && y >= block_y && y < block_y + block;
            if inside {
                Rgb([250, 250, 250])
            } else {
                let shade = ((x + y) % 64) as u8;
                Rgb([shade, shade / 2, 32])
            }
        })
    }
}

impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if !self.open {
            return Err(anyhow!("{} is closed", self.config.name));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.pace();
        let image = self.generate();
        self.frame_count += 1;
        Ok(Some(image))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_parameters() -> Result<()> {
        let config = SyntheticConfig::from_url("stub://desk?frames=20&fps=15", 320, 240)?;
        assert_eq!(config.name, "stub://desk");
        assert_eq!(config.frame_limit, Some(20));
        assert_eq!(config.target_fps, 15);
        assert!(SyntheticConfig::from_url("stub://desk?speed=2", 320, 240).is_err());
        Ok(())
    }

    #[test]
    fn exhausts_after_frame_limit() -> Result<()> {
        let config = SyntheticConfig::from_url("stub://short?frames=2", 16, 16)?;
        let mut camera = SyntheticCamera::open(config);

        assert!(camera.read_frame()?.is_some());
        assert!(camera.read_frame()?.is_some());
        assert!(camera.read_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn frames_contain_a_bright_block() -> Result<()> {
        let mut camera = SyntheticCamera::open(SyntheticConfig {
            width: 64,
            height: 48,
            ..SyntheticConfig::default()
        });
        let image = camera.read_frame()?.expect("frame");
        let bright = image.pixels().filter(|p| p.0[0] >= 200).count();
        assert_eq!(bright, 12 * 12);
        Ok(())
    }

    #[test]
    fn closed_camera_fails_reads() {
        let mut camera = SyntheticCamera::open(SyntheticConfig::default());
        camera.close();
        assert!(camera.read_frame().is_err());
    }
}
