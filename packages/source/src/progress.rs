//! Progress reporting for long-running imports.
//!
//! The framework reports progress through this trait without choosing a
//! rendering backend; the CLI provides an `indicatif` implementation,
//! tests and scheduled runs use [`NullProgress`]. Reporting is purely
//! observational and never affects control flow.

use std::sync::Arc;

/// Receives progress updates from a run.
///
/// Implementations must be `Send + Sync` for `Arc`-based sharing.
pub trait ProgressCallback: Send + Sync {
    /// Declares the expected total units of work, when the source knows
    /// it (enables percentage display).
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Marks the run complete with a final message.
    fn finish(&self, msg: &str);
}

/// A no-op [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: &str) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
