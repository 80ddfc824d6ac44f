//! Whole-feed fetching with rate-limit handling.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use amnesia_api::Session;
use amnesia_core::{AmnesiaError, Collection, FetchConfig, ItemKind, Result};

use crate::pager::ItemPager;
use crate::progress::{FetchProgress, ProgressTracker};

/// Capacity of the progress broadcast channel.
const PROGRESS_CHANNEL_SIZE: usize = 100;

/// Pulls whole feeds into [`Collection`]s.
pub struct CollectionFetcher {
    config: FetchConfig,
    progress_tx: broadcast::Sender<FetchProgress>,
}

impl CollectionFetcher {
    /// Create a fetcher.
    pub fn new(config: FetchConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self {
            config,
            progress_tx,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Subscribe to fetch progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<FetchProgress> {
        self.progress_tx.subscribe()
    }

    /// A pager over one of the session's feeds.
    pub fn pager(&self, session: &Session, kind: ItemKind) -> ItemPager {
        ItemPager::new(
            session.client(),
            session.user_id(),
            kind,
            self.config.clone(),
        )
    }

    /// Fetch a whole feed.
    ///
    /// Rate-limit rejections are waited out (for the reported reset time, or
    /// `rate_limit_wait`) up to `rate_limit_retries` times in a row. Any other
    /// error is returned as is. Returns [`AmnesiaError::Cancelled`] if `cancel`
    /// fires first.
    pub async fn fetch_all(
        &self,
        session: &Session,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> Result<Collection> {
        let mut pager = self.pager(session, kind);
        let mut collection = Collection::new(kind);
        let mut tracker = ProgressTracker::new(kind);
        let mut rate_limit_hits = 0;

        let _ = self.progress_tx.send(tracker.snapshot());

        loop {
            if cancel.is_cancelled() {
                return Err(AmnesiaError::Cancelled);
            }

            let page = match pager.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) if e.is_rate_limited() && rate_limit_hits < self.config.rate_limit_retries => {
                    rate_limit_hits += 1;
                    let wait = e.retry_after().unwrap_or(self.config.rate_limit_wait);
                    warn!(
                        %kind,
                        wait_secs = wait.as_secs(),
                        attempt = rate_limit_hits,
                        "Rate limited while fetching, waiting"
                    );

                    tracker.record_rate_limit(wait);
                    let _ = self.progress_tx.send(tracker.snapshot());

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AmnesiaError::Cancelled),
                        _ = tokio::time::sleep(wait) => continue,
                    }
                }
                Err(e) => return Err(e),
            };

            rate_limit_hits = 0;
            let added = collection.append_page(page);
            tracker.record_page(added);
            let _ = self.progress_tx.send(tracker.snapshot());
        }

        collection.mark_complete();
        info!(
            %kind,
            items = collection.len(),
            pages = pager.pages_fetched(),
            "Fetched collection"
        );

        Ok(collection)
    }
}

impl Default for CollectionFetcher {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}
