//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through a batch. The CLI drives its
//! progress bar from these; the HTTP server runs without one.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, name: &str, markdown_len: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} bytes)", index, total, name, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each file of a batch.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the per-file
/// methods may be called from several tasks at once. All methods default to
/// no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the batch and its file records exist.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file moves to `Converting`.
    ///
    /// `index` is 1-based in upload order.
    fn on_file_start(&self, index: usize, total_files: usize, name: &str) {
        let _ = (index, total_files, name);
    }

    /// Called when a file reaches `Converted`.
    fn on_file_complete(&self, index: usize, total_files: usize, name: &str, markdown_len: usize) {
        let _ = (index, total_files, name, markdown_len);
    }

    /// Called when a file reaches `Failed`.
    fn on_file_error(&self, index: usize, total_files: usize, name: &str, error: &str) {
        let _ = (index, total_files, name, error);
    }

    /// Called once after every file is terminal, before the batch is finalised.
    fn on_batch_complete(&self, total_files: usize, converted: usize) {
        let _ = (total_files, converted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
