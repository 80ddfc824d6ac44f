//! Fetch-then-delete runs, on demand or once a day.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use amnesia_core::ItemKind;
use amnesia_ops::{DailySchedule, DeletionReport, run_daily};

use crate::command::{Command, Event};
use crate::controller::{ControllerClosed, ControllerHandle};

/// How a fetch-then-delete run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Deletion ran; one report per feed that started.
    Finished(Vec<DeletionReport>),
    FetchFailed { kind: ItemKind, message: String },
    Rejected(String),
    Cancelled,
}

/// Fetch each feed in `kinds`, then delete them all in one run.
///
/// Every event seen while waiting is passed to `on_event`. Firing `cancel`
/// stops whichever step is in progress.
pub async fn fetch_and_delete(
    handle: &ControllerHandle,
    kinds: &[ItemKind],
    cancel: &CancellationToken,
    mut on_event: impl FnMut(&Event),
) -> Result<RunOutcome, ControllerClosed> {
    for &kind in kinds {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let failure = step(
            handle,
            Command::Fetch(kind),
            cancel,
            |event| match event {
                Event::FetchCompleted { kind: k, .. } if *k == kind => Some(None),
                Event::FetchFailed { kind: k, message } if *k == kind => {
                    Some(Some(RunOutcome::FetchFailed {
                        kind,
                        message: message.clone(),
                    }))
                }
                Event::Rejected { message } => Some(Some(RunOutcome::Rejected(message.clone()))),
                _ => None,
            },
            &mut on_event,
        )
        .await?;

        if let Some(outcome) = failure {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            return Ok(outcome);
        }
    }

    if cancel.is_cancelled() {
        return Ok(RunOutcome::Cancelled);
    }

    step(
        handle,
        Command::StartDeletion(kinds.to_vec()),
        cancel,
        |event| match event {
            Event::DeletionFinished(reports) => Some(RunOutcome::Finished(reports.clone())),
            Event::Rejected { message } => Some(RunOutcome::Rejected(message.clone())),
            _ => None,
        },
        &mut on_event,
    )
    .await
}

/// Send a command and wait for its result, forwarding `cancel` as [`Command::Cancel`].
async fn step<T>(
    handle: &ControllerHandle,
    command: Command,
    cancel: &CancellationToken,
    pick: impl FnMut(&Event) -> Option<T>,
    on_event: impl FnMut(&Event),
) -> Result<T, ControllerClosed> {
    let request = handle.request(command, pick, on_event);
    tokio::pin!(request);

    tokio::select! {
        // The command must be queued before a cancel can follow it.
        biased;
        result = &mut request => return result,
        _ = cancel.cancelled() => {}
    }

    handle.send(Command::Cancel).await?;
    request.await
}

/// Run [`fetch_and_delete`] at every firing of `schedule` until `cancel` fires.
///
/// `report` sees the outcome of each run. Returns the number of runs.
pub async fn run_scheduled(
    handle: &ControllerHandle,
    schedule: DailySchedule,
    kinds: Vec<ItemKind>,
    cancel: CancellationToken,
    report: impl Fn(&RunOutcome),
) -> usize {
    let kinds = kinds.as_slice();
    let report = &report;

    run_daily(schedule, cancel, move |token| async move {
        match fetch_and_delete(handle, kinds, &token, |_| {}).await {
            Ok(outcome) => {
                if let RunOutcome::Finished(reports) = &outcome {
                    for r in reports {
                        info!(summary = %r.summary(), "Scheduled deletion finished");
                    }
                }
                report(&outcome);
            }
            Err(e) => {
                warn!(error = %e, "Scheduled run aborted");
                token.cancel();
            }
        }
    })
    .await
}
