//! In-memory provider for exercising the fetcher and the engine without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use amnesia_core::{AmnesiaError, Item, ItemId, ItemKind, Result, UserKeys};

use crate::api::{Account, PageRequest, SocialApi};
use crate::session::Connector;

type DeleteHook = Box<dyn Fn(ItemKind, ItemId, usize) + Send + Sync>;

#[derive(Default)]
struct State {
    tweets: Vec<Item>,
    favorites: Vec<Item>,
    fetch_errors: VecDeque<AmnesiaError>,
    delete_errors: HashMap<(ItemKind, ItemId), VecDeque<AmnesiaError>>,
    permanent_errors: HashMap<(ItemKind, ItemId), AmnesiaError>,
    fetch_requests: Vec<(ItemKind, PageRequest)>,
    delete_calls: Vec<(ItemKind, ItemId)>,
    deleted: Vec<(ItemKind, ItemId)>,
    revoked: bool,
}

impl State {
    fn feed_mut(&mut self, kind: ItemKind) -> &mut Vec<Item> {
        match kind {
            ItemKind::Tweet => &mut self.tweets,
            ItemKind::Favorite => &mut self.favorites,
        }
    }
}

/// A scripted [`SocialApi`] holding its feeds in memory.
///
/// Feeds are served newest first (highest id first) and honour `count` and
/// `max_id` like the real endpoints. Errors can be queued per call.
pub struct MemoryApi {
    account: Account,
    state: Mutex<State>,
    delete_delay: Option<Duration>,
    on_delete: Option<DeleteHook>,
}

impl MemoryApi {
    /// Create an empty provider for the given account.
    pub fn new(user_id: impl Into<String>, screen_name: impl Into<String>) -> Self {
        Self {
            account: Account {
                user_id: user_id.into(),
                screen_name: screen_name.into(),
            },
            state: Mutex::new(State::default()),
            delete_delay: None,
            on_delete: None,
        }
    }

    /// Add items to their feeds.
    pub fn with_items(self, items: impl IntoIterator<Item = Item>) -> Self {
        {
            let mut state = self.lock();
            for item in items {
                state.feed_mut(item.kind).push(item);
            }
            state.tweets.sort_by(|a, b| b.id.cmp(&a.id));
            state.favorites.sort_by(|a, b| b.id.cmp(&a.id));
        }
        self
    }

    /// Make every delete call take this long.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Call `hook` after each successful delete with the running total.
    pub fn on_delete(mut self, hook: impl Fn(ItemKind, ItemId, usize) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Box::new(hook));
        self
    }

    /// Fail the next fetch call with `error`.
    pub fn fail_next_fetch(&self, error: AmnesiaError) {
        self.lock().fetch_errors.push_back(error);
    }

    /// Fail the next `times` delete calls for `id` with `error`.
    pub fn fail_delete(&self, kind: ItemKind, id: ItemId, error: AmnesiaError, times: usize) {
        let mut state = self.lock();
        let queue = state.delete_errors.entry((kind, id)).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Fail every delete call for `id` with `error`.
    pub fn fail_delete_always(&self, kind: ItemKind, id: ItemId, error: AmnesiaError) {
        self.lock().permanent_errors.insert((kind, id), error);
    }

    /// Reject every call from now on as if the token had been revoked.
    pub fn revoke(&self) {
        self.lock().revoked = true;
    }

    /// Ids deleted so far, in call order.
    pub fn deleted(&self, kind: ItemKind) -> Vec<ItemId> {
        self.lock()
            .deleted
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Number of delete calls made for `id`, including failed ones.
    pub fn delete_attempts(&self, kind: ItemKind, id: ItemId) -> usize {
        self.lock()
            .delete_calls
            .iter()
            .filter(|call| **call == (kind, id))
            .count()
    }

    /// Total number of delete calls made.
    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls.len()
    }

    /// Page requests received for a feed.
    pub fn fetch_requests(&self, kind: ItemKind) -> Vec<PageRequest> {
        self.lock()
            .fetch_requests
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Items still present in a feed.
    pub fn remaining(&self, kind: ItemKind) -> usize {
        self.lock().feed_mut(kind).len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_revoked(state: &State) -> Result<()> {
        if state.revoked {
            return Err(AmnesiaError::auth("Invalid or expired token."));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialApi for MemoryApi {
    async fn verify_credentials(&self) -> Result<Account> {
        Self::check_revoked(&self.lock())?;
        Ok(self.account.clone())
    }

    async fn fetch_page(&self, kind: ItemKind, request: &PageRequest) -> Result<Vec<Item>> {
        let mut state = self.lock();
        state.fetch_requests.push((kind, request.clone()));
        Self::check_revoked(&state)?;

        if let Some(error) = state.fetch_errors.pop_front() {
            return Err(error);
        }

        let count = usize::try_from(request.count).unwrap_or(usize::MAX);
        Ok(state
            .feed_mut(kind)
            .iter()
            .filter(|item| request.max_id.is_none_or(|max| item.id <= max))
            .take(count)
            .cloned()
            .collect())
    }

    async fn delete_item(&self, kind: ItemKind, id: ItemId) -> Result<()> {
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        let total = {
            let mut state = self.lock();
            state.delete_calls.push((kind, id));
            Self::check_revoked(&state)?;

            if let Some(error) = state
                .delete_errors
                .get_mut(&(kind, id))
                .and_then(VecDeque::pop_front)
            {
                return Err(error);
            }
            if let Some(error) = state.permanent_errors.get(&(kind, id)) {
                return Err(error.clone());
            }

            state.feed_mut(kind).retain(|item| item.id != id);
            state.deleted.push((kind, id));
            state.deleted.len()
        };

        if let Some(hook) = &self.on_delete {
            hook(kind, id, total);
        }
        Ok(())
    }
}

/// Hands out the same [`MemoryApi`] for any complete key bundle.
///
/// Keys whose access token is `"revoked"` are rejected at login.
pub struct MemoryConnector {
    api: Arc<MemoryApi>,
}

impl MemoryConnector {
    /// Wrap a provider.
    pub fn new(api: Arc<MemoryApi>) -> Self {
        Self { api }
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, keys: &UserKeys) -> Result<Arc<dyn SocialApi>> {
        if keys.access_token == "revoked" {
            return Ok(Arc::new(MemoryApi {
                account: self.api.account.clone(),
                state: Mutex::new(State {
                    revoked: true,
                    ..State::default()
                }),
                delete_delay: None,
                on_delete: None,
            }));
        }
        let api: Arc<dyn SocialApi> = self.api.clone();
        Ok(api)
    }
}
