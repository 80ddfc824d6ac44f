//! User-curated set of items that must never be deleted.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::item::{ItemId, ItemKind};

/// Whitelisted tweet and favorite ids.
///
/// An id present here is never passed to a delete call. Insertion order is kept
/// so the persisted settings file stays stable between saves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Whitelist {
    tweets: IndexSet<ItemId>,
    favorites: IndexSet<ItemId>,
}

impl Whitelist {
    /// Create an empty whitelist.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: ItemKind) -> &IndexSet<ItemId> {
        match kind {
            ItemKind::Tweet => &self.tweets,
            ItemKind::Favorite => &self.favorites,
        }
    }

    fn set_mut(&mut self, kind: ItemKind) -> &mut IndexSet<ItemId> {
        match kind {
            ItemKind::Tweet => &mut self.tweets,
            ItemKind::Favorite => &mut self.favorites,
        }
    }

    /// Check whether an id is protected for the given kind.
    pub fn is_whitelisted(&self, kind: ItemKind, id: ItemId) -> bool {
        self.set(kind).contains(&id)
    }

    /// Protect an id. Returns `true` if it was not already whitelisted.
    pub fn add(&mut self, kind: ItemKind, id: ItemId) -> bool {
        self.set_mut(kind).insert(id)
    }

    /// Stop protecting an id. Returns `true` if it was whitelisted.
    pub fn remove(&mut self, kind: ItemKind, id: ItemId) -> bool {
        self.set_mut(kind).shift_remove(&id)
    }

    /// Number of ids protected for the given kind.
    pub fn len(&self, kind: ItemKind) -> usize {
        self.set(kind).len()
    }

    /// Whether nothing is whitelisted for either kind.
    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty() && self.favorites.is_empty()
    }

    /// Iterate over the protected ids of a kind in insertion order.
    pub fn ids(&self, kind: ItemKind) -> impl Iterator<Item = ItemId> + '_ {
        self.set(kind).iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut whitelist = Whitelist::new();
        assert!(whitelist.add(ItemKind::Tweet, ItemId(3)));
        assert!(!whitelist.add(ItemKind::Tweet, ItemId(3)));
        assert_eq!(whitelist.len(ItemKind::Tweet), 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut whitelist = Whitelist::new();
        whitelist.add(ItemKind::Favorite, ItemId(7));

        assert!(whitelist.is_whitelisted(ItemKind::Favorite, ItemId(7)));
        assert!(!whitelist.is_whitelisted(ItemKind::Tweet, ItemId(7)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut whitelist = Whitelist::new();
        whitelist.add(ItemKind::Tweet, ItemId(1));
        whitelist.add(ItemKind::Tweet, ItemId(2));

        assert!(whitelist.remove(ItemKind::Tweet, ItemId(1)));
        assert!(!whitelist.remove(ItemKind::Tweet, ItemId(1)));

        let ids: Vec<_> = whitelist.ids(ItemKind::Tweet).collect();
        assert_eq!(ids, vec![ItemId(2)]);
    }
}
