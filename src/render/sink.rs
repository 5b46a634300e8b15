//! Display sinks and keyboard input.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use anyhow::{Context, Result};
use image::RgbImage;

/// Display collaborator.
pub trait DisplaySink {
    /// Present one rendered bitmap.
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()>;

    /// Next pending key press, without blocking.
    fn poll_input(&mut self) -> Option<char> {
        None
    }

    /// Release display resources. Must be idempotent.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Key presses read from stdin on a background thread.
///
/// Each line typed contributes its characters in order, so `m<Enter>` cycles
/// the overlay mode and `q<Enter>` quits.
pub struct StdinKeys {
    keys: Receiver<char>,
}

impl StdinKeys {
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-keys".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    for key in line.trim().chars() {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                }
            })
            .context("spawn stdin key reader")?;
        Ok(Self { keys: rx })
    }

    pub fn poll(&mut self) -> Option<char> {
        match self.keys.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Sink that presents nothing; keeps a frame count for health logs.
#[derive(Default)]
pub struct HeadlessSink {
    shown: u64,
    keys: Option<StdinKeys>,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, keys: StdinKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for HeadlessSink {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        self.shown += 1;
        log::debug!(
            "{}: frame {} ({}x{})",
            window,
            self.shown,
            image.width(),
            image.height()
        );
        Ok(())
    }

    fn poll_input(&mut self) -> Option<char> {
        self.keys.as_mut().and_then(StdinKeys::poll)
    }
}

/// Sink that writes every rendered frame to a directory as PNG.
pub struct DirectorySink {
    dir: PathBuf,
    written: u64,
    keys: Option<StdinKeys>,
}

impl DirectorySink {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create frame dump directory {}", dir.display()))?;
        Ok(Self {
            dir,
            written: 0,
            keys: None,
        })
    }

    pub fn with_keys(mut self, keys: StdinKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    fn path_for(&self, window: &str, index: u64) -> PathBuf {
        let stem: String = window
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        self.dir.join(format!("{}_{:06}.png", stem, index))
    }
}

impl DisplaySink for DirectorySink {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        self.written += 1;
        let path = self.path_for(window, self.written);
        image
            .save(&path)
            .with_context(|| format!("write frame {}", path.display()))
    }

    fn poll_input(&mut self) -> Option<char> {
        self.keys.as_mut().and_then(StdinKeys::poll)
    }

    fn close(&mut self) -> Result<()> {
        if self.written > 0 {
            log::info!("wrote {} frames to {}", self.written, self.dir.display());
        }
        self.written = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_sink_writes_png_per_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = DirectorySink::create(dir.path().join("frames"))?;

        sink.show("Object Detection", &RgbImage::new(4, 4))?;
        sink.show("Object Detection", &RgbImage::new(4, 4))?;

        assert!(dir.path().join("frames/object_detection_000001.png").exists());
        assert!(dir.path().join("frames/object_detection_000002.png").exists());
        sink.close()?;
        Ok(())
    }

    #[test]
    fn headless_sink_counts_frames() -> Result<()> {
        let mut sink = HeadlessSink::new();
        sink.show("w", &RgbImage::new(1, 1))?;
        assert_eq!(sink.shown(), 1);
        assert_eq!(sink.poll_input(), None);
        Ok(())
    }
}
