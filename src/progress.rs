//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the segmenter walks each page.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a progress bar, a log sink or a channel of
//! their own without the library knowing how the host application reports.
//! The trait is `Send + Sync` because [`crate::extract::extract_batch`]
//! runs several documents on blocking worker threads at once.
//!
//! # Example
//!
//! ```rust
//! use dhsplits::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RowCounter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, rows_found: usize) {
//!         self.rows.fetch_add(rows_found, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} rows", page_num, total_pages, rows_found);
//!     }
//! }
//!
//! let counter = Arc::new(RowCounter { rows: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Within one document, calls arrive in page order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the text stream is read, before segmentation.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page has been segmented and decoded.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for extraction
    /// * `rows_found`  — records decoded on this page, before validation
    fn on_page_complete(&self, page_num: usize, total_pages: usize, rows_found: usize) {
        let _ = (page_num, total_pages, rows_found);
    }

    /// Called when a window is abandoned and the segmenter advances one line.
    fn on_window_skipped(&self, page_num: usize, line: usize, reason: &str) {
        let _ = (page_num, line, reason);
    }

    /// Called once with the final row count and the number of excluded records.
    fn on_document_complete(&self, rows: usize, excluded: usize) {
        let _ = (rows, excluded);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        rows: AtomicUsize,
        skipped: AtomicUsize,
        excluded: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, rows_found: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            self.rows.fetch_add(rows_found, Ordering::SeqCst);
        }

        fn on_window_skipped(&self, _page_num: usize, _line: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _rows: usize, excluded: usize) {
            self.excluded.store(excluded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start(3);
        cb.on_page_complete(1, 3, 12);
        cb.on_window_skipped(1, 40, "too short");
        cb.on_document_complete(12, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_complete(1, 2, 10);
        tracker.on_window_skipped(1, 7, "not a rider start");
        tracker.on_page_complete(2, 2, 5);
        tracker.on_document_complete(13, 2);

        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 15);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.excluded.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start(10);
        cb.on_page_complete(1, 10, 20);
    }
}
