//! Messages into and out of the controller.

use amnesia_api::Account;
use amnesia_core::{DeletionConfig, ItemId, ItemKind, UserKeys};
use amnesia_fetch::FetchProgress;
use amnesia_ops::{DeletionEvent, DeletionReport};

/// A request for the controller.
#[derive(Debug, Clone)]
pub enum Command {
    /// Verify keys and start a session.
    Login(UserKeys),
    /// End the session, stopping any fetch or deletion in progress.
    Logout,
    /// Fetch one feed of the logged-in account.
    Fetch(ItemKind),
    /// Protect an item from deletion.
    WhitelistAdd(ItemKind, ItemId),
    /// Stop protecting an item.
    WhitelistRemove(ItemKind, ItemId),
    /// Replace the settings used by the next deletion.
    Configure(DeletionConfig),
    /// Delete the fetched items of the given feeds.
    StartDeletion(Vec<ItemKind>),
    /// Stop the fetch or deletion in progress.
    Cancel,
    /// Stop the controller.
    Shutdown,
}

/// Something that happened inside the controller.
#[derive(Debug, Clone)]
pub enum Event {
    LoggedIn(Account),
    LoginFailed { message: String },
    /// The session ended, by request or because the provider rejected the keys.
    LoggedOut { reason: Option<String> },
    FetchProgress(FetchProgress),
    FetchCompleted { kind: ItemKind, items: usize },
    FetchFailed { kind: ItemKind, message: String },
    WhitelistChanged {
        kind: ItemKind,
        id: ItemId,
        whitelisted: bool,
    },
    Deletion(DeletionEvent),
    DeletionFinished(Vec<DeletionReport>),
    /// A command could not be carried out in the current state.
    Rejected { message: String },
}
