//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the aggregator works through the document. Pages are processed
//! one at a time, in page order, so events for a page never interleave with
//! events for another page.
//!
//! # Example
//!
//! ```rust
//! use electoral_roll_ocr::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RecordCounter {
//!     records: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RecordCounter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, record_count: usize) {
//!         self.records.fetch_add(record_count, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} records", page_num, total_pages, record_count);
//!     }
//! }
//!
//! let counter = Arc::new(RecordCounter { records: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the page aggregator as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The trait is `Send + Sync` because extraction runs
/// on a blocking worker thread, not the caller's thread.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after rasterisation, before the first page is recognised.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is normalised and recognised.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: pages selected for this run
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been segmented. `record_count` may be zero.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, record_count: usize) {
        let _ = (page_num, total_pages, record_count);
    }

    /// Called when a page fails. Under the default abort policy this is the
    /// last event of the run.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been processed without a fatal error.
    fn on_extraction_complete(&self, total_pages: usize, total_records: usize) {
        let _ = (total_pages, total_records);
    }
}

/// A no-op implementation for callers that don't need progress events.
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
        starts: AtomicUsize,
        records: AtomicUsize,
        errors: AtomicUsize,
        finished_total: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, record_count: usize) {
            self.records.fetch_add(record_count, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, _total_pages: usize, total_records: usize) {
            self.finished_total.store(total_records, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 12);
        cb.on_page_error(2, 5, "tesseract missing");
        cb.on_extraction_complete(5, 12);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 10);
        tracker.on_page_start(2, 2);
        tracker.on_page_complete(2, 2, 0);
        tracker.on_extraction_complete(2, 10);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 10);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.finished_total.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(3);
        cb.on_page_error(1, 3, "recognition failed");
    }
}
