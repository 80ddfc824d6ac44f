//! Provider abstraction consumed by the fetcher and the deletion engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use amnesia_core::{Item, ItemId, ItemKind, Result};

/// The authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Numeric user id, as a string.
    pub user_id: String,
    /// Handle without the leading `@`.
    pub screen_name: String,
}

/// One page request against a timeline-like endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Owner of the feed.
    pub user_id: String,
    /// Maximum items to return.
    pub count: u32,
    /// Only return items with an id less than or equal to this.
    pub max_id: Option<ItemId>,
    /// Include retweets in the tweet timeline.
    pub include_retweets: bool,
}

impl PageRequest {
    /// First page of a feed.
    pub fn first(user_id: impl Into<String>, count: u32) -> Self {
        Self {
            user_id: user_id.into(),
            count,
            max_id: None,
            include_retweets: true,
        }
    }

    /// The same request continuing below `max_id`.
    pub fn with_max_id(mut self, max_id: Option<ItemId>) -> Self {
        self.max_id = max_id;
        self
    }
}

/// Calls the deletion workflow needs from a social provider.
///
/// Implementations make a single attempt per call. Retrying and backing off
/// are the caller's decision, driven by [`amnesia_core::AmnesiaError::is_retryable`].
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Check the credentials and return the account they belong to.
    async fn verify_credentials(&self) -> Result<Account>;

    /// Fetch one page of a feed, newest first. An empty page means end of data.
    async fn fetch_page(&self, kind: ItemKind, request: &PageRequest) -> Result<Vec<Item>>;

    /// Delete a tweet or remove a favorite.
    async fn delete_item(&self, kind: ItemKind, id: ItemId) -> Result<()>;
}
