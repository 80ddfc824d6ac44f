//! Collection fetching for amnesia.
//!
//! Both feeds (tweets and favorites) are read newest first, one page at a
//! time, using a `max_id` cursor that moves below the oldest item of each
//! page. [`ItemPager`] exposes that cursor directly; [`CollectionFetcher`]
//! drains it into a [`Collection`], waiting out rate limits.
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use amnesia_fetch::CollectionFetcher;
//!
//! let fetcher = CollectionFetcher::default();
//! let mut progress_rx = fetcher.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Fetched {} {}", progress.items_fetched, progress.kind.plural());
//!     }
//! });
//! ```

mod fetcher;
mod pager;
mod progress;

pub use fetcher::CollectionFetcher;
pub use pager::ItemPager;
pub use progress::FetchProgress;

// Re-export core types for convenience
pub use amnesia_core::{Collection, CollectionStats, FetchConfig, Item, ItemId, ItemKind};
