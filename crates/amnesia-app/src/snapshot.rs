//! Read-only view of the controller state for front ends.

use amnesia_api::Account;
use amnesia_core::{Collection, CollectionStats, ItemKind, Whitelist};
use amnesia_ops::{DeletionProgress, DeletionReport};

/// What the controller is busy with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    Fetching(ItemKind),
    Deleting(Vec<ItemKind>),
}

impl Activity {
    pub fn is_idle(&self) -> bool {
        matches!(self, Activity::Idle)
    }
}

/// Counts of one fetched feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub kind: ItemKind,
    pub items: usize,
    pub stats: CollectionStats,
}

impl From<&Collection> for CollectionSummary {
    fn from(collection: &Collection) -> Self {
        Self {
            kind: collection.kind(),
            items: collection.len(),
            stats: collection.stats().clone(),
        }
    }
}

/// State published after every change.
#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    pub account: Option<Account>,
    pub activity: Activity,
    pub collections: Vec<CollectionSummary>,
    pub whitelist: Whitelist,
    /// Counters of the deletion in progress, or of the last one.
    pub deletion: Vec<DeletionProgress>,
    pub last_reports: Vec<DeletionReport>,
}

impl AppSnapshot {
    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    pub fn collection(&self, kind: ItemKind) -> Option<&CollectionSummary> {
        self.collections.iter().find(|c| c.kind == kind)
    }
}
