//! Progress reporting for a pipeline run.
//!
//! The pipeline reports one unit of work per region. Rendering is left to
//! the caller: the CLI draws an `indicatif` bar, the server and tests use
//! [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a pipeline run.
///
/// Regions are processed on a rayon pool, so implementations must be
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Announces how many regions the run will model.
    fn set_total(&self, total: u64);

    /// Records `delta` more finished regions.
    fn inc(&self, delta: u64);

    /// Describes the current phase.
    fn set_message(&self, msg: String);

    /// Marks the run as complete with a closing message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
