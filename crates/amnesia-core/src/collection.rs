//! Fetched collection container and statistics.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId, ItemKind};

/// Summary statistics for a fetched collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of items held.
    pub total_items: u64,
    /// Number of pages appended.
    pub pages_fetched: u32,
    /// Number of items dropped because they were already present.
    pub duplicates_skipped: u64,
    /// Oldest item (id, time).
    pub oldest: Option<(ItemId, DateTime<Utc>)>,
    /// Newest item (id, time).
    pub newest: Option<(ItemId, DateTime<Utc>)>,
}

impl CollectionStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with an appended item.
    pub fn record_item(&mut self, item: &Item) {
        self.total_items += 1;

        if self.oldest.as_ref().is_none_or(|(_, t)| item.created_at < *t) {
            self.oldest = Some((item.id, item.created_at));
        }

        if self.newest.as_ref().is_none_or(|(_, t)| item.created_at > *t) {
            self.newest = Some((item.id, item.created_at));
        }
    }
}

/// Ordered, append-only sequence of items of one kind.
///
/// Pages are appended in fetch order (newest first). Items already present are
/// skipped so a resumed fetch never yields duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    kind: ItemKind,
    items: Vec<Item>,
    #[serde(skip)]
    seen: HashSet<ItemId>,
    stats: CollectionStats,
    fetched_at: Option<DateTime<Utc>>,
    complete: bool,
}

impl Collection {
    /// Create an empty collection.
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            seen: HashSet::new(),
            stats: CollectionStats::new(),
            fetched_at: None,
            complete: false,
        }
    }

    /// Build a collection from already fetched items.
    pub fn from_items(kind: ItemKind, items: impl IntoIterator<Item = Item>) -> Self {
        let mut collection = Self::new(kind);
        collection.append_page(items);
        collection
    }

    /// Append one fetched page, returning the number of new items.
    ///
    /// Items of another kind or already present are ignored.
    pub fn append_page(&mut self, page: impl IntoIterator<Item = Item>) -> usize {
        let mut appended = 0;

        for item in page {
            if item.kind != self.kind {
                continue;
            }
            if !self.seen.insert(item.id) {
                self.stats.duplicates_skipped += 1;
                continue;
            }
            self.stats.record_item(&item);
            self.items.push(item);
            appended += 1;
        }

        self.stats.pages_fetched += 1;
        self.fetched_at = Some(Utc::now());
        appended
    }

    /// Mark the collection as fully fetched.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Whether the provider signalled end of data.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The kind of items held.
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// All items in fetch order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Iterate over items in fetch order.
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an item with this id is held.
    pub fn contains(&self, id: ItemId) -> bool {
        self.seen.contains(&id)
    }

    /// Look up an item by id.
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        if !self.contains(id) {
            return None;
        }
        self.items.iter().find(|item| item.id == id)
    }

    /// Collection statistics.
    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// When the last page was appended.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
