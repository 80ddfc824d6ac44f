//! Deletion engine behavior against an in-memory provider.

use std::sync::Arc;
use std::time::Duration;

use amnesia_api::{AmnesiaError, MemoryApi};
use amnesia_core::{
    Collection, DeletionConfig, Item, ItemId, ItemKind, KeepPolicy, RetryPolicy, RunMode,
    Whitelist,
};
use amnesia_ops::{DeletionEngine, DeletionEvent, DeletionState, KeepReason, start_run};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

fn items(kind: ItemKind, ids: impl IntoIterator<Item = u64>) -> Vec<Item> {
    ids.into_iter()
        .map(|id| Item::new(id, kind, Utc::now() - chrono::Duration::days(30)))
        .collect()
}

fn provider(items: Vec<Item>) -> Arc<MemoryApi> {
    Arc::new(MemoryApi::new("42", "someone").with_items(items))
}

fn engine(api: &Arc<MemoryApi>, config: DeletionConfig) -> DeletionEngine {
    DeletionEngine::new(api.clone(), config)
}

fn whitelist(kind: ItemKind, ids: &[u64]) -> Whitelist {
    let mut whitelist = Whitelist::new();
    for id in ids {
        whitelist.add(kind, ItemId(*id));
    }
    whitelist
}

#[tokio::test]
async fn test_whitelisted_items_are_never_deleted() {
    let tweets = items(ItemKind::Tweet, 1..=10);
    let api = provider(tweets.clone());

    let handle = engine(&api, DeletionConfig::default()).start(
        ItemKind::Tweet,
        tweets,
        &whitelist(ItemKind::Tweet, &[3, 7]),
    );
    let report = handle.wait().await;

    assert_eq!(report.state, DeletionState::Completed);
    assert_eq!(report.total_items, 8);
    assert_eq!(report.deleted_count, 8);
    assert!(report.failures.is_empty());
    assert_eq!(report.kept.len(), 2);

    assert_eq!(api.delete_attempts(ItemKind::Tweet, ItemId(3)), 0);
    assert_eq!(api.delete_attempts(ItemKind::Tweet, ItemId(7)), 0);
    assert_eq!(api.remaining(ItemKind::Tweet), 2);
}

#[tokio::test(start_paused = true)]
async fn test_item_failing_every_attempt_is_skipped() {
    let tweets = items(ItemKind::Tweet, 1..=10);
    let api = provider(tweets.clone());
    api.fail_delete(
        ItemKind::Tweet,
        ItemId(5),
        AmnesiaError::api(500, "Internal error"),
        3,
    );

    let report = engine(&api, DeletionConfig::default())
        .start(ItemKind::Tweet, tweets, &whitelist(ItemKind::Tweet, &[3, 7]))
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Completed);
    assert_eq!(report.total_items, 8);
    assert_eq!(report.deleted_count, 7);
    assert_eq!(report.processed_count, 8);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.id, ItemId(5));
    assert_eq!(failure.attempts, 3);
    assert!(failure.message.contains("Internal error"));
    assert_eq!(api.delete_attempts(ItemKind::Tweet, ItemId(5)), 3);
    assert_eq!(report.summary(), "Deleted 7 of 8 tweets, 1 failed, 2 kept");
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_within_budget() {
    let tweets = items(ItemKind::Tweet, 1..=3);
    let api = provider(tweets.clone());
    api.fail_delete(ItemKind::Tweet, ItemId(2), AmnesiaError::http("connection reset"), 2);

    let report = engine(&api, DeletionConfig::default())
        .start(ItemKind::Tweet, tweets, &Whitelist::new())
        .wait()
        .await;

    assert!(report.is_success());
    assert_eq!(report.deleted_count, 3);
    assert_eq!(api.delete_attempts(ItemKind::Tweet, ItemId(2)), 3);
}

#[tokio::test]
async fn test_non_retryable_error_skips_immediately() {
    let tweets = items(ItemKind::Tweet, 1..=3);
    let api = provider(tweets.clone());
    api.fail_delete_always(
        ItemKind::Tweet,
        ItemId(2),
        AmnesiaError::Api {
            status: 404,
            code: Some(144),
            message: "No status found with that ID.".into(),
        },
    );

    let report = engine(&api, DeletionConfig::default())
        .start(ItemKind::Tweet, tweets, &Whitelist::new())
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Completed);
    assert_eq!(report.deleted_count, 2);
    assert_eq!(report.failures[0].attempts, 1);
    assert_eq!(api.delete_attempts(ItemKind::Tweet, ItemId(2)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_for_reset() {
    let tweets = items(ItemKind::Tweet, 1..=2);
    let api = provider(tweets.clone());
    api.fail_delete(
        ItemKind::Tweet,
        ItemId(2),
        AmnesiaError::RateLimited {
            retry_after: Some(Duration::from_secs(120)),
        },
        1,
    );

    let started = tokio::time::Instant::now();
    let mut handle = engine(&api, DeletionConfig::default()).start(
        ItemKind::Tweet,
        tweets,
        &Whitelist::new(),
    );

    let mut retry_delay = None;
    while let Some(event) = handle.next_event().await {
        if let DeletionEvent::Retrying { id, delay, .. } = event {
            assert_eq!(id, ItemId(2));
            retry_delay = Some(delay);
        }
    }
    let report = handle.wait().await;

    assert_eq!(retry_delay, Some(Duration::from_secs(120)));
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(report.deleted_count, 2);
}

#[tokio::test]
async fn test_auth_error_fails_the_run() {
    let tweets = items(ItemKind::Tweet, 1..=5);
    let api = provider(tweets.clone());
    api.revoke();

    let report = engine(&api, DeletionConfig::default())
        .start(ItemKind::Tweet, tweets, &Whitelist::new())
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Failed);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(report.processed_count, 0);
    assert!(report.error.unwrap().contains("Authentication failed"));
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test]
async fn test_cancel_stops_after_in_flight_delete() {
    let tweets = items(ItemKind::Tweet, 1..=10);
    let cancel = CancellationToken::new();

    let hook_token = cancel.clone();
    let api = Arc::new(
        MemoryApi::new("42", "someone")
            .with_items(tweets.clone())
            .on_delete(move |_, _, total| {
                if total == 3 {
                    hook_token.cancel();
                }
            }),
    );

    let report = engine(&api, DeletionConfig::default())
        .start_with_token(ItemKind::Tweet, tweets, &Whitelist::new(), cancel)
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Cancelled);
    assert_eq!(report.deleted_count, 3);
    assert!(report.deleted_count <= report.total_items);
    assert_eq!(api.delete_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let tweets = items(ItemKind::Tweet, 1..=3);
    let api = provider(tweets.clone());
    api.fail_delete_always(ItemKind::Tweet, ItemId(1), AmnesiaError::http("timeout"));

    let config = DeletionConfig::builder()
        .retry(
            RetryPolicy::builder()
                .max_attempts(10u32)
                .initial_delay(Duration::from_secs(60))
                .jitter(false)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let mut handle = engine(&api, config).start(ItemKind::Tweet, tweets, &Whitelist::new());

    loop {
        match handle.next_event().await {
            Some(DeletionEvent::Retrying { id, .. }) => {
                assert_eq!(id, ItemId(1));
                break;
            }
            Some(_) => continue,
            None => panic!("run ended without retrying"),
        }
    }
    handle.cancel();
    let report = handle.wait().await;

    assert_eq!(report.state, DeletionState::Cancelled);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(api.delete_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deleted_count_is_monotonic() {
    let tweets = items(ItemKind::Tweet, 1..=20);
    let api = Arc::new(
        MemoryApi::new("42", "someone")
            .with_items(tweets.clone())
            .with_delete_delay(Duration::from_millis(10)),
    );
    api.fail_delete(ItemKind::Tweet, ItemId(9), AmnesiaError::api(503, "Over capacity"), 5);

    let handle = engine(&api, DeletionConfig::default()).start(
        ItemKind::Tweet,
        tweets,
        &Whitelist::new(),
    );
    let mut progress = handle.watch();

    let mut observed = Vec::new();
    loop {
        let snapshot = progress.borrow_and_update().clone();
        observed.push(snapshot.deleted_count);
        assert!(snapshot.deleted_count <= snapshot.total_items);
        if snapshot.state.is_terminal() || progress.changed().await.is_err() {
            break;
        }
    }
    let report = handle.wait().await;

    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(report.deleted_count, 19);
    assert_eq!(*observed.last().unwrap(), 19);
}

#[tokio::test]
async fn test_dry_run_deletes_nothing() {
    let tweets = items(ItemKind::Tweet, 1..=10);
    let api = provider(tweets.clone());
    let config = DeletionConfig::builder().dry_run(true).build().unwrap();

    let report = engine(&api, config)
        .start(ItemKind::Tweet, tweets, &whitelist(ItemKind::Tweet, &[3, 7]))
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Completed);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(report.processed_count, 8);
    assert_eq!(report.would_delete.len(), 8);
    assert!(!report.would_delete.contains(&ItemId(3)));
    assert_eq!(api.delete_calls(), 0);
    assert_eq!(report.summary(), "Would delete 8 of 8 tweets, 2 kept");
}

#[tokio::test]
async fn test_keep_policy_protects_popular_and_recent_items() {
    let now = Utc::now();
    let tweets = vec![
        Item::new(1, ItemKind::Tweet, now - chrono::Duration::days(400)),
        Item::new(2, ItemKind::Tweet, now - chrono::Duration::days(400)).with_counts(50, 0),
        Item::new(3, ItemKind::Tweet, now - chrono::Duration::hours(2)),
    ];
    let api = provider(tweets.clone());
    let keep = KeepPolicy::builder()
        .keep_younger_than(KeepPolicy::keep_window(0, 1, 0, 0).unwrap())
        .max_favorites(Some(10u64))
        .build()
        .unwrap();
    let config = DeletionConfig::builder().keep(keep).build().unwrap();

    let report = engine(&api, config)
        .start(ItemKind::Tweet, tweets, &Whitelist::new())
        .wait()
        .await;

    assert_eq!(report.total_items, 1);
    assert_eq!(api.deleted(ItemKind::Tweet), vec![ItemId(1)]);

    let reasons: Vec<_> = report.kept.iter().map(|k| (k.id, k.reason)).collect();
    assert!(reasons.contains(&(ItemId(2), KeepReason::TooManyFavorites)));
    assert!(reasons.contains(&(ItemId(3), KeepReason::TooRecent)));
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let favorites = items(ItemKind::Favorite, 1..=3);
    let api = provider(favorites.clone());

    let mut handle = engine(&api, DeletionConfig::default()).start(
        ItemKind::Favorite,
        favorites,
        &Whitelist::new(),
    );

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(DeletionEvent::Started { kind: ItemKind::Favorite, total_items: 3, .. })
    ));
    let deleted = events
        .iter()
        .filter(|e| matches!(e, DeletionEvent::Deleted { .. }))
        .count();
    assert_eq!(deleted, 3);
    match events.last() {
        Some(DeletionEvent::Finished(report)) => {
            assert_eq!(report.summary(), "Removed 3 of 3 favorites");
        }
        other => panic!("unexpected last event: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_collection_completes() {
    let api = provider(Vec::new());
    let report = engine(&api, DeletionConfig::default())
        .start(ItemKind::Tweet, Vec::new(), &Whitelist::new())
        .wait()
        .await;

    assert_eq!(report.state, DeletionState::Completed);
    assert_eq!(report.total_items, 0);
}

fn both_feeds() -> (Vec<Item>, Vec<Item>) {
    (items(ItemKind::Tweet, 1..=5), items(ItemKind::Favorite, 100..=104))
}

#[tokio::test]
async fn test_sequential_run_processes_both_feeds() {
    let (tweets, favorites) = both_feeds();
    let api = provider(tweets.iter().chain(&favorites).cloned().collect());

    let collections = vec![
        Collection::from_items(ItemKind::Tweet, tweets),
        Collection::from_items(ItemKind::Favorite, favorites),
    ];
    let mut whitelist = whitelist(ItemKind::Favorite, &[100]);
    whitelist.add(ItemKind::Tweet, ItemId(1));

    let handle = start_run(
        &engine(&api, DeletionConfig::default()),
        collections,
        &whitelist,
        CancellationToken::new(),
    );
    assert_eq!(handle.mode(), RunMode::Sequential);
    let reports = handle.wait().await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].kind, ItemKind::Tweet);
    assert_eq!(reports[0].deleted_count, 4);
    assert_eq!(reports[1].kind, ItemKind::Favorite);
    assert_eq!(reports[1].deleted_count, 4);
    assert_eq!(api.remaining(ItemKind::Favorite), 1);
}

#[tokio::test]
async fn test_concurrent_run_processes_both_feeds() {
    let (tweets, favorites) = both_feeds();
    let api = provider(tweets.iter().chain(&favorites).cloned().collect());
    let config = DeletionConfig::builder()
        .run_mode(RunMode::Concurrent)
        .build()
        .unwrap();

    let handle = start_run(
        &engine(&api, config),
        vec![
            Collection::from_items(ItemKind::Tweet, tweets),
            Collection::from_items(ItemKind::Favorite, favorites),
        ],
        &Whitelist::new(),
        CancellationToken::new(),
    );
    let reports = handle.wait().await;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_success() && r.deleted_count == 5));
    assert_eq!(api.remaining(ItemKind::Tweet), 0);
    assert_eq!(api.remaining(ItemKind::Favorite), 0);
}

#[tokio::test]
async fn test_sequential_run_stops_after_failed_feed() {
    let (tweets, favorites) = both_feeds();
    let api = provider(tweets.iter().chain(&favorites).cloned().collect());
    api.revoke();

    let reports = start_run(
        &engine(&api, DeletionConfig::default()),
        vec![
            Collection::from_items(ItemKind::Tweet, tweets),
            Collection::from_items(ItemKind::Favorite, favorites),
        ],
        &Whitelist::new(),
        CancellationToken::new(),
    )
    .wait()
    .await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].state, DeletionState::Failed);
    assert_eq!(api.delete_calls(), 1);
}
