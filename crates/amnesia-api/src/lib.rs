//! Provider access for amnesia.
//!
//! The engine never talks HTTP directly: everything goes through the
//! [`SocialApi`] trait. [`TwitterClient`] implements it against the Twitter
//! v1.1 REST API with OAuth 1.0a user-context signing, and [`SessionManager`]
//! turns a key bundle into a verified [`Session`].

mod api;
mod client;
#[cfg(feature = "testing")]
mod memory;
mod oauth;
mod ratelimit;
mod session;
mod types;

pub use api::{Account, PageRequest, SocialApi};
pub use client::TwitterClient;
#[cfg(feature = "testing")]
pub use memory::{MemoryApi, MemoryConnector};
pub use oauth::OAuthSigner;
pub use ratelimit::RateLimitInfo;
pub use session::{Connector, Session, SessionManager, TwitterConnector};

// Re-export core types for convenience
pub use amnesia_core::{AmnesiaError, ApiConfig, Item, ItemId, ItemKind, Result, UserKeys};
