//! Splitting a collection into delete targets and kept items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use amnesia_core::{Item, ItemId, ItemKind, KeepPolicy, Whitelist};

/// Why an item was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// The id is on the whitelist.
    Whitelisted,
    /// Younger than the keep window.
    TooRecent,
    /// Favorited more often than the threshold.
    TooManyFavorites,
    /// Retweeted more often than the threshold.
    TooManyRetweets,
}

/// An item excluded from deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeptItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub reason: KeepReason,
}

/// The partition of one collection.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    /// Items to delete, in collection order.
    pub targets: Vec<Item>,
    /// Items that stay.
    pub kept: Vec<KeptItem>,
}

impl DeletionPlan {
    /// Ids of the delete targets.
    pub fn target_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.targets.iter().map(|item| item.id)
    }
}

/// Decide whether an item stays. The whitelist wins over every other rule.
pub fn keep_reason(
    item: &Item,
    whitelist: &Whitelist,
    keep: &KeepPolicy,
    now: DateTime<Utc>,
) -> Option<KeepReason> {
    if whitelist.is_whitelisted(item.kind, item.id) {
        return Some(KeepReason::Whitelisted);
    }
    if keep
        .keep_younger_than
        .is_some_and(|window| item.age(now) < window)
    {
        return Some(KeepReason::TooRecent);
    }
    if keep.max_favorites.is_some_and(|max| item.favorite_count > max) {
        return Some(KeepReason::TooManyFavorites);
    }
    if keep.max_retweets.is_some_and(|max| item.retweet_count > max) {
        return Some(KeepReason::TooManyRetweets);
    }
    None
}

/// Partition `items` into targets and kept items.
pub fn plan(
    items: impl IntoIterator<Item = Item>,
    whitelist: &Whitelist,
    keep: &KeepPolicy,
    now: DateTime<Utc>,
) -> DeletionPlan {
    let mut plan = DeletionPlan::default();

    for item in items {
        match keep_reason(&item, whitelist, keep, now) {
            Some(reason) => plan.kept.push(KeptItem {
                id: item.id,
                kind: item.kind,
                reason,
            }),
            None => plan.targets.push(item),
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn tweet(id: u64, age_hours: i64, favorites: u64, retweets: u64, now: DateTime<Utc>) -> Item {
        Item::new(id, ItemKind::Tweet, now - ChronoDuration::hours(age_hours))
            .with_counts(favorites, retweets)
    }

    #[test]
    fn test_whitelist_only() {
        let now = Utc::now();
        let mut whitelist = Whitelist::new();
        whitelist.add(ItemKind::Tweet, ItemId(3));
        whitelist.add(ItemKind::Tweet, ItemId(7));

        let items = (1..=10).map(|id| tweet(id, 1, 0, 0, now));
        let plan = plan(items, &whitelist, &KeepPolicy::default(), now);

        assert_eq!(plan.targets.len(), 8);
        assert!(plan.target_ids().all(|id| id != ItemId(3) && id != ItemId(7)));
        assert_eq!(plan.kept.len(), 2);
        assert!(plan.kept.iter().all(|k| k.reason == KeepReason::Whitelisted));
    }

    #[test]
    fn test_whitelist_is_per_kind() {
        let now = Utc::now();
        let mut whitelist = Whitelist::new();
        whitelist.add(ItemKind::Favorite, ItemId(3));

        let item = tweet(3, 1, 0, 0, now);
        assert_eq!(keep_reason(&item, &whitelist, &KeepPolicy::default(), now), None);
    }

    #[test]
    fn test_keep_window() {
        let now = Utc::now();
        let keep = KeepPolicy {
            keep_younger_than: Some(Duration::from_secs(48 * 3600)),
            ..KeepPolicy::default()
        };

        let young = tweet(1, 47, 0, 0, now);
        let old = tweet(2, 49, 0, 0, now);
        assert_eq!(
            keep_reason(&young, &Whitelist::new(), &keep, now),
            Some(KeepReason::TooRecent)
        );
        assert_eq!(keep_reason(&old, &Whitelist::new(), &keep, now), None);
    }

    #[test]
    fn test_engagement_thresholds() {
        let now = Utc::now();
        let keep = KeepPolicy {
            max_favorites: Some(10),
            max_retweets: Some(5),
            ..KeepPolicy::default()
        };

        let at_limit = tweet(1, 100, 10, 5, now);
        let popular = tweet(2, 100, 11, 0, now);
        let shared = tweet(3, 100, 0, 6, now);

        assert_eq!(keep_reason(&at_limit, &Whitelist::new(), &keep, now), None);
        assert_eq!(
            keep_reason(&popular, &Whitelist::new(), &keep, now),
            Some(KeepReason::TooManyFavorites)
        );
        assert_eq!(
            keep_reason(&shared, &Whitelist::new(), &keep, now),
            Some(KeepReason::TooManyRetweets)
        );
    }

    #[test]
    fn test_whitelist_reported_first() {
        let now = Utc::now();
        let mut whitelist = Whitelist::new();
        whitelist.add(ItemKind::Tweet, ItemId(1));
        let keep = KeepPolicy {
            max_favorites: Some(0),
            ..KeepPolicy::default()
        };

        let item = tweet(1, 1, 50, 0, now);
        assert_eq!(
            keep_reason(&item, &whitelist, &keep, now),
            Some(KeepReason::Whitelisted)
        );
    }
}
