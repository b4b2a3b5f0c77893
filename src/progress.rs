//! Progress-callback trait for per-page split events.
//!
//! Inject an [`Arc<dyn SplitProgressCallback>`] via
//! [`crate::config::SplitConfigBuilder::progress_callback`] to receive events
//! as the pipeline walks the document. Callbacks are observational only:
//! nothing they do changes which pages are accepted or how files are named.
//!
//! # Example
//!
//! ```rust
//! use settlement_split::{SplitConfig, SplitProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SplitProgressCallback for Printer {
//!     fn on_page(&self, page_index: usize, total_pages: usize, status: &str) {
//!         eprintln!("[{}/{}] {}", page_index + 1, total_pages, status);
//!     }
//! }
//!
//! let config = SplitConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn SplitProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PageOutcome;
use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages are processed strictly in order on one task, so events arrive in
/// document order. All methods default to no-ops.
pub trait SplitProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called exactly once per page, before any work on it.
    ///
    /// # Arguments
    /// * `page_index`  — 0-indexed page
    /// * `total_pages` — pages in the document
    /// * `status`      — human-readable status line
    fn on_page(&self, page_index: usize, total_pages: usize, status: &str) {
        let _ = (page_index, total_pages, status);
    }

    /// Called once per page with its final outcome.
    fn on_page_done(&self, page_index: usize, total_pages: usize, outcome: &PageOutcome) {
        let _ = (page_index, total_pages, outcome);
    }

    /// Called once after the last page.
    fn on_run_complete(&self, total_pages: usize, accepted: usize) {
        let _ = (total_pages, accepted);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl SplitProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SplitConfig`].
pub type ProgressCallback = Arc<dyn SplitProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SplitProgressCallback for Recorder {
        fn on_page(&self, page_index: usize, total_pages: usize, status: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{page_index}/{total_pages}:{status}"));
        }

        fn on_run_complete(&self, _total_pages: usize, accepted: usize) {
            self.events.lock().unwrap().push(format!("done:{accepted}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_page(0, 3, "Processing page 1 of 3");
        cb.on_page_done(
            0,
            3,
            &PageOutcome::SkippedUnparseable { malformed: false },
        );
        cb.on_run_complete(3, 0);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_page(0, 2, "a");
        rec.on_page(1, 2, "b");
        rec.on_run_complete(2, 1);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["0/2:a".to_string(), "1/2:b".to_string(), "done:1".to_string()]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
    }
}
