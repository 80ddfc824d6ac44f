//! Application layer for amnesia.
//!
//! A [`Controller`] task owns the session, the fetched feeds, the whitelist
//! and at most one running job. Front ends send it [`Command`]s, listen to
//! [`Event`]s and read the latest [`AppSnapshot`]. [`Settings`] is the
//! persisted part of that state.
//!
//! # Example
//!
//! ```rust,no_run
//! use amnesia_api::SessionManager;
//! use amnesia_app::{Command, Controller, Event, Settings};
//!
//! # async fn demo() -> Result<(), amnesia_app::ControllerClosed> {
//! let settings = Settings::load();
//! let (handle, task) = Controller::spawn(
//!     SessionManager::twitter(settings.api.clone()),
//!     settings.fetch.clone(),
//!     settings.deletion.clone(),
//!     settings.whitelist.clone(),
//! );
//!
//! if let Some(keys) = settings.keys.clone() {
//!     let account = handle
//!         .request(
//!             Command::Login(keys),
//!             |event| match event {
//!                 Event::LoggedIn(account) => Some(Ok(account.clone())),
//!                 Event::LoginFailed { message } => Some(Err(message.clone())),
//!                 _ => None,
//!             },
//!             |_| {},
//!         )
//!         .await?;
//!     println!("{account:?}");
//! }
//!
//! handle.send(Command::Shutdown).await?;
//! let _whitelist = task.await;
//! # Ok(())
//! # }
//! ```

mod command;
mod controller;
mod scheduled;
mod settings;
mod snapshot;

pub use command::{Command, Event};
pub use controller::{Controller, ControllerClosed, ControllerHandle};
pub use scheduled::{RunOutcome, fetch_and_delete, run_scheduled};
pub use settings::Settings;
pub use snapshot::{Activity, AppSnapshot, CollectionSummary};
