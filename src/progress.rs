//! Per-table progress spinners.
//!
//! Spinners draw on stderr while a table is worked on and leave a ✔/✖ line
//! behind. With progress disabled (`--no-progress`, `--json`, non-interactive
//! runs) the same milestones are emitted as `tracing` events instead.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct Spinner {
    bar: Option<ProgressBar>,
    label: String,
}

impl Spinner {
    /// Start a spinner labelled `label`, indented by `indent` spaces
    pub fn start(label: impl Into<String>, indent: usize, enabled: bool) -> Self {
        let label = label.into();
        let prefix = " ".repeat(indent);

        let bar = enabled.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{prefix}{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            pb.set_prefix(prefix);
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        Self { bar, label }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.into());
        }
    }

    /// Finish with a success mark, keeping the original label
    pub fn succeed(self) {
        let label = self.label.clone();
        self.succeed_with(label);
    }

    pub fn succeed_with(self, message: impl Into<String>) {
        let message = message.into();
        match self.bar {
            Some(bar) => finish(&bar, "✔", &message),
            None => tracing::info!("{}", message),
        }
    }

    pub fn fail(self) {
        match self.bar {
            Some(bar) => finish(&bar, "✖", &self.label),
            None => tracing::warn!("{} failed", self.label),
        }
    }
}

/// Replace the spinner glyph with a fixed mark and leave the line on screen
fn finish(bar: &ProgressBar, mark: &str, message: &str) {
    bar.set_style(
        ProgressStyle::with_template("{prefix}{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.finish_with_message(format!("{} {}", mark, message));
}
