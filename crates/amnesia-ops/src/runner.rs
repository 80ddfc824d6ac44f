//! Running tweets and favorites deletions together.

use std::collections::HashMap;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use amnesia_core::{Collection, ItemKind, RunMode, Whitelist};

use crate::OPERATION_CHANNEL_SIZE;
use crate::engine::{DeletionEngine, RunContext, aborted_report};
use crate::filter::DeletionPlan;
use crate::progress::{DeletionEvent, DeletionProgress, DeletionReport, DeletionState};

/// Start one deletion per collection, ordered by the engine's [`RunMode`].
///
/// Every run stops when `cancel` fires. In sequential mode collections run
/// in the given order and a cancelled or failed run stops the ones after it.
/// Each run only ever gets its own collection's items, so the two feeds never
/// share a worker.
pub fn start_run(
    engine: &DeletionEngine,
    collections: Vec<Collection>,
    whitelist: &Whitelist,
    cancel: CancellationToken,
) -> RunHandle {
    let mode = engine.config().run_mode;
    let (events_tx, events_rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    let mut progress = HashMap::new();
    let mut jobs = Vec::new();
    for collection in collections {
        let kind = collection.kind();
        let (progress_tx, progress_rx) = watch::channel(DeletionProgress::idle(kind));
        progress.insert(kind, progress_rx);

        let plan = engine.plan(collection.items().iter().cloned(), whitelist);
        let ctx = RunContext {
            cancel: cancel.clone(),
            events: events_tx.clone(),
            progress: progress_tx,
        };
        jobs.push((kind, plan, ctx));
    }
    drop(events_tx);

    let engine = engine.clone();
    let task = tokio::spawn(async move { drive(engine, mode, jobs).await });

    RunHandle {
        mode,
        events: events_rx,
        progress,
        cancel,
        task,
    }
}

async fn drive(
    engine: DeletionEngine,
    mode: RunMode,
    jobs: Vec<(ItemKind, DeletionPlan, RunContext)>,
) -> Vec<DeletionReport> {
    info!(%mode, runs = jobs.len(), "Starting deletion run");

    match mode {
        RunMode::Concurrent => {
            join_all(
                jobs.iter()
                    .map(|(kind, plan, ctx)| engine.run(*kind, plan.clone(), ctx)),
            )
            .await
        }
        RunMode::Sequential => {
            let mut reports = Vec::with_capacity(jobs.len());
            for (kind, plan, ctx) in &jobs {
                let report = engine.run(*kind, plan.clone(), ctx).await;
                let stop = report.state != DeletionState::Completed;
                reports.push(report);
                if stop {
                    break;
                }
            }
            reports
        }
    }
}

/// Deletions of several feeds in flight.
///
/// Events of all runs arrive on one channel; each carries its kind.
#[derive(Debug)]
pub struct RunHandle {
    mode: RunMode,
    events: mpsc::Receiver<DeletionEvent>,
    progress: HashMap<ItemKind, watch::Receiver<DeletionProgress>>,
    cancel: CancellationToken,
    task: JoinHandle<Vec<DeletionReport>>,
}

impl RunHandle {
    /// How the runs are ordered.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Stop every run. Delete calls in flight still complete.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelling every run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest counters of one feed's run.
    pub fn progress(&self, kind: ItemKind) -> Option<DeletionProgress> {
        self.progress.get(&kind).map(|rx| rx.borrow().clone())
    }

    /// A receiver notified on every counter change of one feed's run.
    pub fn watch(&self, kind: ItemKind) -> Option<watch::Receiver<DeletionProgress>> {
        self.progress.get(&kind).cloned()
    }

    /// Next event from any run.
    pub async fn next_event(&mut self) -> Option<DeletionEvent> {
        self.events.recv().await
    }

    /// Wait for every run to finish, discarding unread events.
    ///
    /// Runs that never started (after an earlier one stopped in sequential
    /// mode) have no report.
    pub async fn wait(self) -> Vec<DeletionReport> {
        let Self {
            events,
            progress,
            task,
            ..
        } = self;
        drop(events);

        match task.await {
            Ok(reports) => reports,
            Err(e) => progress
                .iter()
                .map(|(kind, rx)| aborted_report(*kind, &rx.borrow(), e.to_string()))
                .collect(),
        }
    }
}
