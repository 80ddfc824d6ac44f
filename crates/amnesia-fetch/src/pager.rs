//! Restartable cursor over one feed.

use std::sync::Arc;

use futures::{Stream, TryStreamExt, stream};
use tracing::debug;

use amnesia_api::{PageRequest, SocialApi};
use amnesia_core::{AmnesiaError, FetchConfig, Item, ItemId, ItemKind, Result};

/// Walks a feed from newest to oldest, one page per call.
///
/// The cursor only advances after a page was received, so a failed call
/// (typically a rate-limit rejection) can simply be repeated and resumes
/// where the pager stopped.
pub struct ItemPager {
    api: Arc<dyn SocialApi>,
    kind: ItemKind,
    user_id: String,
    config: FetchConfig,
    max_id: Option<ItemId>,
    yielded: usize,
    pages: u32,
    exhausted: bool,
}

impl ItemPager {
    /// Create a pager positioned at the newest item.
    pub fn new(
        api: Arc<dyn SocialApi>,
        user_id: impl Into<String>,
        kind: ItemKind,
        config: FetchConfig,
    ) -> Self {
        Self {
            api,
            kind,
            user_id: user_id.into(),
            config,
            max_id: None,
            yielded: 0,
            pages: 0,
            exhausted: false,
        }
    }

    /// The feed this pager walks.
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Whether the end of the feed (or `max_items`) was reached.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Items returned so far.
    pub fn items_yielded(&self) -> usize {
        self.yielded
    }

    /// Pages received so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages
    }

    /// Start over from the newest item.
    pub fn reset(&mut self) {
        self.max_id = None;
        self.yielded = 0;
        self.pages = 0;
        self.exhausted = false;
    }

    /// Fetch the next page. `Ok(None)` means the feed is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let remaining = self
            .config
            .max_items
            .map_or(usize::MAX, |max| max.saturating_sub(self.yielded));
        if remaining == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let count = u32::try_from(remaining)
            .map_or(self.config.page_size, |r| r.min(self.config.page_size));
        let request = PageRequest {
            user_id: self.user_id.clone(),
            count,
            max_id: self.max_id,
            include_retweets: self.config.include_retweets,
        };

        let mut page = self.api.fetch_page(self.kind, &request).await?;
        self.pages += 1;

        if page.is_empty() {
            debug!(kind = %self.kind, pages = self.pages, "Feed exhausted");
            self.exhausted = true;
            return Ok(None);
        }

        page.truncate(remaining);
        self.yielded += page.len();

        let oldest = page.iter().map(|item| item.id).min();
        let next_max_id = oldest.and_then(ItemId::previous);

        // A cursor that does not move backwards would loop forever.
        let moved = match (next_max_id, self.max_id) {
            (Some(next), Some(current)) => next < current,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !moved || self.yielded >= self.config.max_items.unwrap_or(usize::MAX) {
            self.exhausted = true;
        }
        self.max_id = next_max_id;

        debug!(
            kind = %self.kind,
            items = page.len(),
            max_id = ?self.max_id,
            "Fetched page"
        );

        Ok(Some(page))
    }

    /// Turn the pager into a stream of items.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Item>> + Send {
        stream::try_unfold(self, |mut pager| async move {
            let next = pager.next_page().await?.map(|page| {
                let items = page.into_iter().map(Ok::<Item, AmnesiaError>);
                (stream::iter(items), pager)
            });
            Ok::<_, AmnesiaError>(next)
        })
        .try_flatten()
    }
}

impl std::fmt::Debug for ItemPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemPager")
            .field("kind", &self.kind)
            .field("user_id", &self.user_id)
            .field("max_id", &self.max_id)
            .field("yielded", &self.yielded)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}
