use amnesia_core::{
    AmnesiaError, Collection, DeletionConfig, Item, ItemId, ItemKind, KeepPolicy, RetryPolicy,
    RunMode, Whitelist,
};
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn item(id: u64, kind: ItemKind) -> Item {
    Item::new(id, kind, Utc.with_ymd_and_hms(2019, 6, 1, 8, 30, 0).unwrap())
}

#[test]
fn test_whitelist_serializes_as_id_lists() {
    let mut whitelist = Whitelist::new();
    whitelist.add(ItemKind::Tweet, ItemId(3));
    whitelist.add(ItemKind::Tweet, ItemId(7));
    whitelist.add(ItemKind::Favorite, ItemId(11));

    let json = serde_json::to_value(&whitelist).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "tweets": [3, 7], "favorites": [11] })
    );

    let parsed: Whitelist = serde_json::from_value(serde_json::json!({ "tweets": [3] })).unwrap();
    assert!(parsed.is_whitelisted(ItemKind::Tweet, ItemId(3)));
    assert_eq!(parsed.len(ItemKind::Favorite), 0);
}

#[test]
fn test_whitelist_add_size_invariant() {
    let mut whitelist = Whitelist::new();
    for _ in 0..5 {
        whitelist.add(ItemKind::Favorite, ItemId(42));
    }
    assert_eq!(whitelist.len(ItemKind::Favorite), 1);
    assert!(!whitelist.is_empty());
}

#[test]
fn test_deletion_config_defaults_from_partial_json() {
    let config: DeletionConfig = serde_json::from_value(serde_json::json!({
        "dry_run": true,
        "run_mode": "concurrent",
        "keep": { "max_favorites": 10 }
    }))
    .unwrap();

    assert!(config.dry_run);
    assert_eq!(config.run_mode, RunMode::Concurrent);
    assert_eq!(config.keep.max_favorites, Some(10));
    assert_eq!(config.keep.keep_younger_than, None);
    assert_eq!(config.retry, RetryPolicy::default());
}

#[test]
fn test_keep_policy_serializes_window_in_seconds() {
    let policy = KeepPolicy::builder()
        .keep_younger_than(KeepPolicy::keep_window(0, 2, 0, 0).unwrap())
        .build()
        .unwrap();

    let json = serde_json::to_value(&policy).unwrap();
    assert_eq!(json["keep_younger_than"], serde_json::json!(172800));
    assert!(!policy.is_empty());
    assert!(KeepPolicy::default().is_empty());
}

#[test]
fn test_collection_keeps_fetch_order_across_pages() {
    let mut collection = Collection::new(ItemKind::Favorite);
    collection.append_page(vec![item(30, ItemKind::Favorite), item(20, ItemKind::Favorite)]);
    collection.append_page(vec![item(10, ItemKind::Favorite)]);
    collection.mark_complete();

    let ids: Vec<u64> = collection.iter().map(|i| i.id.0).collect();
    assert_eq!(ids, vec![30, 20, 10]);
    assert_eq!(collection.stats().total_items, 3);
    assert!(collection.is_complete());
    assert!(collection.fetched_at().is_some());
}

#[test]
fn test_error_retry_after() {
    let err = AmnesiaError::RateLimited {
        retry_after: Some(Duration::from_secs(900)),
    };
    assert!(err.is_rate_limited());
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(900)));
    assert_eq!(AmnesiaError::NotLoggedIn.retry_after(), None);
}
