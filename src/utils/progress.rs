//! Progress reporting for downloads and packaging.
//!
//! Thin wrappers over `indicatif` so the rest of the crate never touches the
//! library directly and progress can be disabled wholesale (CI, tests, or
//! `HOTPATCH_NO_PROGRESS=1`). Hidden bars silently ignore all operations.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var("HOTPATCH_NO_PROGRESS").is_ok_and(|v| v == "1" || v == "true")
        || !std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// A progress bar with consistent styling.
///
/// Wraps [`indicatif::ProgressBar`] and becomes a hidden no-op bar when
/// progress output is disabled.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a progress bar tracking `len` work units.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self { inner: bar }
    }

    /// Creates a byte-oriented bar for a single download.
    ///
    /// Shows transferred/total bytes and ETA. `len` is the expected size in
    /// bytes when known.
    pub fn new_download(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(download_style());
            bar
        };
        Self { inner: bar }
    }

    /// Creates a spinner for indeterminate operations.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self { inner: bar }
    }

    /// Sets the message displayed alongside the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Sets the prefix displayed before the bar.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Advances the bar by `delta` units.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Sets the absolute position.
    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    /// Updates the total length (e.g. once `Content-Length` is known).
    pub fn set_length(&self, len: u64) {
        self.inner.set_length(len);
    }

    /// Completes the bar, leaving a final message.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Completes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    fn inner(&self) -> &IndicatifBar {
        &self.inner
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap()
        .progress_chars("━╸━")
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap()
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// Container for stacking several progress bars (one per concurrent bundle
/// download).
pub struct MultiProgress {
    inner: indicatif::MultiProgress,
}

impl MultiProgress {
    /// Creates a new multi-progress container.
    pub fn new() -> Self {
        Self { inner: indicatif::MultiProgress::new() }
    }

    /// Adds a download bar for an artifact of `len` bytes.
    pub fn add_download(&self, len: u64) -> ProgressBar {
        let bar = ProgressBar::new_download(len);
        let inner = self.inner.add(bar.inner().clone());
        ProgressBar { inner }
    }

    /// Adds a spinner.
    pub fn add_spinner(&self) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let inner = self.inner.add(bar.inner().clone());
        ProgressBar { inner }
    }
}

impl Default for MultiProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_operations_do_not_panic() {
        let bar = ProgressBar::new(10);
        bar.set_message("working");
        bar.set_prefix("pack");
        bar.inc(3);
        bar.set_position(7);
        bar.finish_with_message("done");
    }

    #[test]
    fn test_download_bar_length_update() {
        let bar = ProgressBar::new_download(0);
        bar.set_length(2048);
        bar.set_position(1024);
        bar.finish_and_clear();
    }

    #[test]
    fn test_multi_progress_add() {
        let multi = MultiProgress::new();
        let a = multi.add_download(100);
        let b = multi.add_spinner();
        a.inc(10);
        b.set_message("merging catalog");
        a.finish_and_clear();
        b.finish_and_clear();
    }
}
