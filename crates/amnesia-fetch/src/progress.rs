//! Fetch progress reporting.

use std::time::{Duration, Instant};

use amnesia_core::ItemKind;

/// Progress information during a fetch.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    /// Feed being fetched.
    pub kind: ItemKind,
    /// Number of pages received so far.
    pub pages_fetched: u32,
    /// Number of new items collected so far.
    pub items_fetched: usize,
    /// Set while waiting out a rate limit.
    pub rate_limited_for: Option<Duration>,
    /// Time elapsed since the fetch started.
    pub elapsed: Duration,
}

impl FetchProgress {
    /// Create initial progress state.
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            pages_fetched: 0,
            items_fetched: 0,
            rate_limited_for: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Items collected per second.
    pub fn items_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.items_fetched as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    kind: ItemKind,
    pages_fetched: u32,
    items_fetched: usize,
    rate_limited_for: Option<Duration>,
}

impl ProgressTracker {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            start_time: Instant::now(),
            kind,
            pages_fetched: 0,
            items_fetched: 0,
            rate_limited_for: None,
        }
    }

    pub fn record_page(&mut self, new_items: usize) {
        self.pages_fetched += 1;
        self.items_fetched += new_items;
        self.rate_limited_for = None;
    }

    pub fn record_rate_limit(&mut self, wait: Duration) {
        self.rate_limited_for = Some(wait);
    }

    pub fn snapshot(&self) -> FetchProgress {
        FetchProgress {
            kind: self.kind,
            pages_fetched: self.pages_fetched,
            items_fetched: self.items_fetched,
            rate_limited_for: self.rate_limited_for,
            elapsed: self.start_time.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_snapshot() {
        let mut tracker = ProgressTracker::new(ItemKind::Favorite);
        tracker.record_rate_limit(Duration::from_secs(30));
        assert_eq!(tracker.snapshot().rate_limited_for, Some(Duration::from_secs(30)));

        tracker.record_page(200);
        tracker.record_page(13);

        let progress = tracker.snapshot();
        assert_eq!(progress.kind, ItemKind::Favorite);
        assert_eq!(progress.pages_fetched, 2);
        assert_eq!(progress.items_fetched, 213);
        assert_eq!(progress.rate_limited_for, None);
    }

    #[test]
    fn test_rate_with_no_elapsed_time() {
        assert_eq!(FetchProgress::new(ItemKind::Tweet).items_per_second(), 0.0);
    }
}
