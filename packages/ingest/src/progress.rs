//! `indicatif`-backed progress rendering for interactive runs.

use indicatif::{ProgressBar, ProgressStyle};
use obs_sync_source::progress::ProgressCallback;

/// Renders run progress as a terminal bar. Until the source declares a
/// total, the bar acts as a spinner with a running count; once a total
/// is known it shows a percentage.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Creates a spinner-style bar for a run.
    #[must_use]
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_message(label.to_string());
        Self { bar }
    }
}

impl ProgressCallback for BarProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_style(
            ProgressStyle::with_template("{msg} {bar:40} {pos}/{len} ({percent}%)")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self, msg: &str) {
        self.bar.finish_with_message(msg.to_string());
    }
}
