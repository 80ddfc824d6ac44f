//! Core types and configuration for amnesia.
//!
//! This crate provides the data structures shared by every other amnesia
//! crate: fetched items and collections, the whitelist, API credentials,
//! the error taxonomy and the run configuration.

mod collection;
mod config;
mod credentials;
mod error;
mod item;
mod whitelist;

pub use collection::{Collection, CollectionStats};
pub use config::{
    ApiConfig, ApiConfigBuilder, DeletionConfig, DeletionConfigBuilder, FetchConfig,
    FetchConfigBuilder, KeepPolicy, KeepPolicyBuilder, RetryPolicy, RetryPolicyBuilder, RunMode,
};
pub use credentials::UserKeys;
pub use error::{AmnesiaError, ItemFailure, Result};
pub use item::{Item, ItemId, ItemKind};
pub use whitelist::Whitelist;
