//! Startup progress on stderr.
//!
//! Each startup step gets a spinner when stderr is a terminal, or a single
//! `==>` line otherwise. The pipeline itself reports through `log`.

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct Ui {
    spinners: bool,
}

impl Ui {
    /// Resolve `--ui auto|plain|pretty` against the terminal state.
    ///
    /// `auto` draws spinners only when stdout is also a terminal, so piped runs
    /// keep a clean stderr.
    pub fn from_args(mode: &str, stderr_tty: bool, stdout_tty: bool) -> Result<Self> {
        let wanted = match mode {
            "auto" => stdout_tty,
            "pretty" => true,
            "plain" => false,
            other => return Err(anyhow!("unknown ui mode '{}' (auto, plain, pretty)", other)),
        };
        Ok(Self {
            spinners: wanted && stderr_tty,
        })
    }

    /// Announce a startup step. Dropping the guard prints how long it took.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.spinners {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        StageGuard {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
            detail: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    detail: Option<String>,
}

impl StageGuard {
    /// Text appended to the completion line, such as the device that opened.
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }

    fn summary(&self, elapsed: Duration) -> String {
        match &self.detail {
            Some(detail) => format!("✔ {}: {} ({})", self.name, detail, short_duration(elapsed)),
            None => format!("✔ {} ({})", self.name, short_duration(elapsed)),
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let line = self.summary(self.started.elapsed());
        match self.spinner.take() {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

fn short_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinners_need_a_terminal() -> Result<()> {
        assert!(!Ui::from_args("pretty", false, true)?.spinners);
        assert!(Ui::from_args("pretty", true, false)?.spinners);
        assert!(Ui::from_args("auto", true, true)?.spinners);
        assert!(!Ui::from_args("auto", true, false)?.spinners);
        assert!(!Ui::from_args("plain", true, true)?.spinners);
        Ok(())
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Ui::from_args("fancy", true, true).is_err());
    }

    #[test]
    fn summary_includes_detail_and_duration() {
        let mut stage = Ui::from_args("plain", false, false)
            .expect("plain mode")
            .stage("Open capture device");
        stage.set_detail("stub://desk");

        assert_eq!(
            stage.summary(Duration::from_millis(42)),
            "✔ Open capture device: stub://desk (42ms)"
        );
        assert_eq!(short_duration(Duration::from_millis(1500)), "1.50s");
    }
}
