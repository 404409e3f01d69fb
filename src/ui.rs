//! Terminal progress for the command-line front end.
//!
//! Pretty mode draws indicatif spinners on stderr; plain mode prints one
//! line per stage so output stays readable when piped.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn is_pretty(&self) -> bool {
        // Pretty output is only drawn on a terminal, even when requested.
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Timed step; reports its duration when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.is_pretty() {
            let spinner = spinner_with_template("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }

    /// Running count of processed frames for video and camera runs.
    pub fn frame_counter(&self, label: &str) -> FrameCounter {
        let spinner = self.is_pretty().then(|| {
            let spinner = spinner_with_template("{spinner} {prefix} {pos} frames ({per_sec}) {msg}");
            spinner.set_prefix(label.to_string());
            spinner
        });
        FrameCounter {
            label: label.to_string(),
            frames: 0,
            start: Instant::now(),
            spinner,
        }
    }
}

fn spinner_with_template(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct FrameCounter {
    label: String,
    frames: u64,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl FrameCounter {
    /// Count one frame; `detections` is shown next to the counter.
    pub fn tick(&mut self, detections: usize) {
        self.frames += 1;
        if let Some(spinner) = &self.spinner {
            spinner.set_position(self.frames);
            spinner.set_message(format!("last: {} detections", detections));
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn finish(self, outcome: &str) {
        let message = format!(
            "{}: {} frames in {} ({})",
            self.label,
            self.frames,
            format_duration(self.start.elapsed()),
            outcome
        );
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
