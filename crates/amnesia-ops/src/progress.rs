//! Progress and result types for deletion runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

use amnesia_core::{ItemFailure, ItemId, ItemKind};

use crate::filter::KeptItem;

/// Lifecycle of a deletion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeletionState {
    /// Not started.
    #[default]
    Idle,
    /// Working through the targets.
    Running,
    /// Every target was processed.
    Completed,
    /// Stopped on request before the end.
    Cancelled,
    /// Stopped by an error that affects every remaining item.
    Failed,
}

impl DeletionState {
    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Live counters of a deletion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionProgress {
    /// Which feed is being processed.
    pub kind: ItemKind,
    /// Current lifecycle state.
    pub state: DeletionState,
    /// Number of delete targets, fixed when the run starts.
    pub total_items: usize,
    /// Targets handled so far (deleted, failed or reported in a dry run).
    pub processed_count: usize,
    /// Confirmed deletions.
    pub deleted_count: usize,
    /// Targets skipped after failing.
    pub failed_count: usize,
    /// Items excluded by the whitelist or keep policy.
    pub kept_count: usize,
    /// Target currently being deleted.
    pub current: Option<ItemId>,
    /// Whether delete calls are suppressed.
    pub dry_run: bool,
}

impl DeletionProgress {
    /// Progress of a run that has not started.
    pub fn idle(kind: ItemKind) -> Self {
        Self {
            kind,
            state: DeletionState::Idle,
            total_items: 0,
            processed_count: 0,
            deleted_count: 0,
            failed_count: 0,
            kept_count: 0,
            current: None,
            dry_run: false,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total_items > 0 {
            (self.processed_count as f64 / self.total_items as f64) * 100.0
        } else if self.state.is_terminal() {
            100.0
        } else {
            0.0
        }
    }

    /// Targets not yet handled.
    pub fn remaining(&self) -> usize {
        self.total_items.saturating_sub(self.processed_count)
    }
}

/// Discrete things that happen during a run.
#[derive(Debug, Clone)]
pub enum DeletionEvent {
    /// The run started with this many targets.
    Started {
        kind: ItemKind,
        total_items: usize,
        kept: usize,
        dry_run: bool,
    },
    /// An item was deleted.
    Deleted { kind: ItemKind, id: ItemId },
    /// Dry run: an item would have been deleted.
    WouldDelete { kind: ItemKind, id: ItemId },
    /// A delete attempt failed and will be retried.
    Retrying {
        kind: ItemKind,
        id: ItemId,
        attempt: u32,
        delay: Duration,
        message: String,
    },
    /// An item was given up on.
    Failed(ItemFailure),
    /// The run reached a terminal state.
    Finished(DeletionReport),
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionReport {
    /// Which feed was processed.
    pub kind: ItemKind,
    /// Terminal state.
    pub state: DeletionState,
    /// Number of delete targets.
    pub total_items: usize,
    /// Targets handled.
    pub processed_count: usize,
    /// Confirmed deletions.
    pub deleted_count: usize,
    /// Items given up on.
    pub failures: Vec<ItemFailure>,
    /// Items excluded from the run.
    pub kept: Vec<KeptItem>,
    /// Dry run: targets that would have been deleted.
    pub would_delete: Vec<ItemId>,
    /// Whether delete calls were suppressed.
    pub dry_run: bool,
    /// Reason for a `Failed` run.
    pub error: Option<String>,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl DeletionReport {
    /// Check if every target was deleted.
    pub fn is_success(&self) -> bool {
        self.state == DeletionState::Completed && self.failures.is_empty()
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        let noun = self.kind.plural();

        let mut summary = if self.dry_run {
            format!(
                "Would delete {} of {} {}",
                self.would_delete.len(),
                self.total_items,
                noun
            )
        } else {
            format!(
                "{} {} of {} {}",
                self.kind.deleted_verb(),
                self.deleted_count,
                self.total_items,
                noun
            )
        };

        if !self.failures.is_empty() {
            summary.push_str(&format!(", {} failed", self.failures.len()));
        }
        if !self.kept.is_empty() {
            summary.push_str(&format!(", {} kept", self.kept.len()));
        }
        match self.state {
            DeletionState::Cancelled => summary.push_str(" (cancelled)"),
            DeletionState::Failed => {
                summary.push_str(" (failed");
                if let Some(error) = &self.error {
                    summary.push_str(": ");
                    summary.push_str(error);
                }
                summary.push(')');
            }
            _ => {}
        }

        summary
    }
}
