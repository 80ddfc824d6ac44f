//! Deletion engine for amnesia.
//!
//! This crate turns fetched collections into delete calls with progress
//! reporting via channels: counters on a `watch` channel, discrete events on
//! an `mpsc` channel, and a [`DeletionReport`] at the end.
//!
//! Items protected by the whitelist or the keep policy never reach the
//! provider. Transient failures are retried with exponential backoff; an item
//! that still fails is skipped and reported while the run continues.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(api: std::sync::Arc<dyn amnesia_api::SocialApi>, items: Vec<amnesia_core::Item>) {
//! use amnesia_core::{DeletionConfig, ItemKind, Whitelist};
//! use amnesia_ops::DeletionEngine;
//!
//! let engine = DeletionEngine::new(api, DeletionConfig::default());
//! let handle = engine.start(ItemKind::Tweet, items, &Whitelist::new());
//!
//! let report = handle.wait().await;
//! println!("{}", report.summary());
//! # }
//! ```

mod backoff;
mod engine;
mod filter;
mod progress;
mod runner;
mod schedule;

pub use backoff::Backoff;
pub use engine::{DeletionEngine, DeletionHandle};
pub use filter::{DeletionPlan, KeepReason, KeptItem, keep_reason, plan};
pub use progress::{DeletionEvent, DeletionProgress, DeletionReport, DeletionState};
pub use runner::{RunHandle, start_run};
pub use schedule::{DailySchedule, run_daily};

/// Default channel buffer size for deletion events.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
