//! Progress-callback trait for per-target batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractConfigBuilder::progress_callback`] to receive
//! events as the scheduler works through a job file.
//!
//! # Example
//!
//! ```rust
//! use spectract::{BatchProgressCallback, ExtractConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rows: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_target_complete(&self, name: &str, rows: usize) {
//!         self.rows.fetch_add(rows, Ordering::SeqCst);
//!         eprintln!("{name}: {rows} rows");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rows: AtomicUsize::new(0) });
//!
//! let config = ExtractConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scheduler as it processes each target.
///
/// Targets run concurrently, so `on_target_start`, `on_target_complete` and
/// `on_target_error` may be called from several threads at once.
/// Implementations must protect shared mutable state with appropriate
/// synchronisation primitives (e.g. `Mutex`, `AtomicUsize`).
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the job file is parsed, before any extraction.
    fn on_batch_start(&self, total_targets: usize) {
        let _ = total_targets;
    }

    /// Called when a worker picks up a target.
    fn on_target_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a target produced a normalized table.
    fn on_target_complete(&self, name: &str, rows: usize) {
        let _ = (name, rows);
    }

    /// Called when a target was dropped because of a non-fatal error.
    fn on_target_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after every target has been attempted.
    fn on_batch_complete(&self, total_targets: usize, success_count: usize) {
        let _ = (total_targets, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
