//! The deletion engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amnesia_api::SocialApi;
use amnesia_core::{
    AmnesiaError, DeletionConfig, Item, ItemFailure, ItemId, ItemKind, Whitelist,
};

use crate::OPERATION_CHANNEL_SIZE;
use crate::backoff::Backoff;
use crate::filter::{self, DeletionPlan};
use crate::progress::{DeletionEvent, DeletionProgress, DeletionReport, DeletionState};

/// Where a run publishes what it does.
///
/// `progress` holds the latest counters; `events` carries one message per
/// step. A closed event channel is ignored so a caller may listen to either.
#[derive(Debug, Clone)]
pub(crate) struct RunContext {
    pub cancel: CancellationToken,
    pub events: mpsc::Sender<DeletionEvent>,
    pub progress: watch::Sender<DeletionProgress>,
}

impl RunContext {
    async fn emit(&self, event: DeletionEvent) {
        let _ = self.events.send(event).await;
    }

    fn publish(&self, progress: &DeletionProgress) {
        self.progress.send_replace(progress.clone());
    }
}

enum Attempt {
    Deleted,
    Skipped(ItemFailure),
    Cancelled,
    Fatal(AmnesiaError),
}

/// Deletes the non-protected items of a collection through a [`SocialApi`].
#[derive(Clone)]
pub struct DeletionEngine {
    api: Arc<dyn SocialApi>,
    config: DeletionConfig,
}

impl DeletionEngine {
    /// Create an engine.
    pub fn new(api: Arc<dyn SocialApi>, config: DeletionConfig) -> Self {
        Self { api, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &DeletionConfig {
        &self.config
    }

    /// Partition `items` without running anything.
    pub fn plan(&self, items: impl IntoIterator<Item = Item>, whitelist: &Whitelist) -> DeletionPlan {
        filter::plan(items, whitelist, &self.config.keep, Utc::now())
    }

    /// Start deleting `items` of `kind` in a background task.
    ///
    /// The whitelist is read once, here: later edits do not affect the run.
    /// Items of another kind are ignored.
    pub fn start(
        &self,
        kind: ItemKind,
        items: impl IntoIterator<Item = Item>,
        whitelist: &Whitelist,
    ) -> DeletionHandle {
        self.start_with_token(kind, items, whitelist, CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancel` fires.
    pub fn start_with_token(
        &self,
        kind: ItemKind,
        items: impl IntoIterator<Item = Item>,
        whitelist: &Whitelist,
        cancel: CancellationToken,
    ) -> DeletionHandle {
        let items: Vec<Item> = items.into_iter().filter(|item| item.kind == kind).collect();
        let plan = self.plan(items, whitelist);

        let (events_tx, events_rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);
        let (progress_tx, progress_rx) = watch::channel(DeletionProgress::idle(kind));
        let ctx = RunContext {
            cancel: cancel.clone(),
            events: events_tx,
            progress: progress_tx,
        };

        let engine = self.clone();
        let task = tokio::spawn(async move { engine.run(kind, plan, &ctx).await });

        DeletionHandle {
            kind,
            events: events_rx,
            progress: progress_rx,
            cancel,
            task,
        }
    }

    /// Work through a plan to a terminal state.
    pub(crate) async fn run(
        &self,
        kind: ItemKind,
        plan: DeletionPlan,
        ctx: &RunContext,
    ) -> DeletionReport {
        let started = Instant::now();
        let dry_run = self.config.dry_run;
        let DeletionPlan { targets, kept } = plan;

        let mut progress = DeletionProgress {
            kind,
            state: DeletionState::Running,
            total_items: targets.len(),
            processed_count: 0,
            deleted_count: 0,
            failed_count: 0,
            kept_count: kept.len(),
            current: None,
            dry_run,
        };
        let mut failures = Vec::new();
        let mut would_delete = Vec::new();
        let mut error = None;

        info!(
            %kind,
            total = progress.total_items,
            kept = progress.kept_count,
            dry_run,
            "Starting deletion"
        );
        ctx.publish(&progress);
        ctx.emit(DeletionEvent::Started {
            kind,
            total_items: progress.total_items,
            kept: progress.kept_count,
            dry_run,
        })
        .await;

        for item in &targets {
            if ctx.cancel.is_cancelled() {
                progress.state = DeletionState::Cancelled;
                break;
            }

            progress.current = Some(item.id);
            ctx.publish(&progress);

            if dry_run {
                would_delete.push(item.id);
                progress.processed_count += 1;
                ctx.publish(&progress);
                ctx.emit(DeletionEvent::WouldDelete { kind, id: item.id }).await;
                continue;
            }

            match self.delete_with_retry(kind, item.id, ctx).await {
                Attempt::Deleted => {
                    progress.deleted_count += 1;
                    progress.processed_count += 1;
                    debug!(%kind, id = %item.id, "Deleted");
                    ctx.emit(DeletionEvent::Deleted { kind, id: item.id }).await;
                }
                Attempt::Skipped(failure) => {
                    progress.failed_count += 1;
                    progress.processed_count += 1;
                    warn!(%failure, "Skipping item");
                    ctx.emit(DeletionEvent::Failed(failure.clone())).await;
                    failures.push(failure);
                }
                Attempt::Cancelled => {
                    progress.state = DeletionState::Cancelled;
                    break;
                }
                Attempt::Fatal(e) => {
                    warn!(%kind, error = %e, "Deletion run failed");
                    progress.state = DeletionState::Failed;
                    error = Some(e.to_string());
                    break;
                }
            }
            ctx.publish(&progress);
        }

        if progress.state == DeletionState::Running {
            progress.state = DeletionState::Completed;
        }
        progress.current = None;
        ctx.publish(&progress);

        let report = DeletionReport {
            kind,
            state: progress.state,
            total_items: progress.total_items,
            processed_count: progress.processed_count,
            deleted_count: progress.deleted_count,
            failures,
            kept,
            would_delete,
            dry_run,
            error,
            elapsed: started.elapsed(),
        };

        info!(%kind, state = %report.state, "{}", report.summary());
        ctx.emit(DeletionEvent::Finished(report.clone())).await;
        report
    }

    async fn delete_with_retry(&self, kind: ItemKind, id: ItemId, ctx: &RunContext) -> Attempt {
        let policy = &self.config.retry;
        let mut backoff = Backoff::new(policy.clone());
        let mut attempts = 0;

        loop {
            attempts += 1;

            let e = match self.api.delete_item(kind, id).await {
                Ok(()) => return Attempt::Deleted,
                Err(e) => e,
            };

            if e.is_auth() {
                return Attempt::Fatal(e);
            }
            if !e.is_retryable() || attempts >= policy.max_attempts {
                return Attempt::Skipped(ItemFailure::new(id, kind, &e, attempts));
            }

            let delay = backoff.next_delay(&e);
            debug!(
                %kind,
                %id,
                attempt = attempts,
                delay = ?delay,
                error = %e,
                "Retrying delete"
            );
            ctx.emit(DeletionEvent::Retrying {
                kind,
                id,
                attempt: attempts,
                delay,
                message: e.to_string(),
            })
            .await;

            tokio::select! {
                _ = ctx.cancel.cancelled() => return Attempt::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for DeletionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A running deletion of one feed.
///
/// Either drain `events` or drop them (as [`wait`](Self::wait) does): the
/// engine pauses while the event channel is full.
#[derive(Debug)]
pub struct DeletionHandle {
    kind: ItemKind,
    events: mpsc::Receiver<DeletionEvent>,
    progress: watch::Receiver<DeletionProgress>,
    cancel: CancellationToken,
    task: JoinHandle<DeletionReport>,
}

impl DeletionHandle {
    /// The feed being processed.
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Ask the run to stop. The delete call in flight, if any, still completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelling this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest counters.
    pub fn progress(&self) -> DeletionProgress {
        self.progress.borrow().clone()
    }

    /// A receiver notified on every counter change.
    pub fn watch(&self) -> watch::Receiver<DeletionProgress> {
        self.progress.clone()
    }

    /// Next event, or `None` once the run is over and all events were read.
    pub async fn next_event(&mut self) -> Option<DeletionEvent> {
        self.events.recv().await
    }

    /// Wait for the run to finish, discarding unread events.
    pub async fn wait(self) -> DeletionReport {
        let Self {
            kind,
            events,
            progress,
            task,
            ..
        } = self;
        drop(events);

        match task.await {
            Ok(report) => report,
            Err(e) => aborted_report(kind, &progress.borrow(), e.to_string()),
        }
    }
}

/// A report for a run whose task died.
pub(crate) fn aborted_report(
    kind: ItemKind,
    progress: &DeletionProgress,
    message: String,
) -> DeletionReport {
    DeletionReport {
        kind,
        state: DeletionState::Failed,
        total_items: progress.total_items,
        processed_count: progress.processed_count,
        deleted_count: progress.deleted_count,
        failures: Vec::new(),
        kept: Vec::new(),
        would_delete: Vec::new(),
        dry_run: progress.dry_run,
        error: Some(message),
        elapsed: std::time::Duration::ZERO,
    }
}
