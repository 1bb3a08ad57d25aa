//! Terminal feedback for long-running commands
//!
//! Wraps an optional indicatif bar: when `--quiet` is set every call is a
//! no-op, so commands never branch on the flag themselves.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner or counter shown on stderr while a command works.
pub struct Feedback {
    bar: Option<ProgressBar>,
}

impl Feedback {
    /// Indeterminate spinner with a message
    pub fn spinner(message: &str, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(pb) }
    }

    /// Counter over a known number of records
    pub fn counter(total: u64, message: &str, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.set_message(message.to_string());
        Self { bar: Some(pb) }
    }

    /// Whether anything is drawn
    #[cfg(test)]
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Move a counter to an absolute position
    pub fn set_position(&self, position: u64) {
        if let Some(ref pb) = self.bar {
            pb.set_position(position);
        }
    }

    /// Finish with a green check
    pub fn succeed(self, message: &str) {
        self.finish("{prefix:.green} {msg}", "✓", message);
    }

    /// Finish with a yellow bang
    pub fn warn(self, message: &str) {
        self.finish("{prefix:.yellow} {msg}", "!", message);
    }

    /// Finish with a red cross
    pub fn fail(self, message: &str) {
        self.finish("{prefix:.red} {msg}", "✗", message);
    }

    fn finish(self, template: &str, prefix: &'static str, message: &str) {
        if let Some(pb) = self.bar {
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                pb.set_style(style);
            }
            pb.set_prefix(prefix);
            pb.finish_with_message(message.to_string());
        }
    }
}
