//! The task owning the session, the fetched feeds and the running job.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amnesia_api::SessionManager;
use amnesia_core::{AmnesiaError, Collection, DeletionConfig, FetchConfig, ItemKind, Whitelist};
use amnesia_fetch::{CollectionFetcher, FetchProgress};
use amnesia_ops::{DeletionEngine, DeletionEvent, DeletionProgress, DeletionReport, DeletionState, start_run};

use crate::command::{Command, Event};
use crate::snapshot::{Activity, AppSnapshot, CollectionSummary};

const COMMAND_CHANNEL_SIZE: usize = 32;
const EVENT_CHANNEL_SIZE: usize = 256;
const INTERNAL_CHANNEL_SIZE: usize = 100;

/// The controller task is gone.
#[derive(Debug, Clone, Copy, Error)]
#[error("Controller has shut down")]
pub struct ControllerClosed;

/// Results of background jobs, fed back into the controller loop.
enum Internal {
    FetchProgress(FetchProgress),
    FetchDone(ItemKind, Result<Collection, AmnesiaError>),
    Deletion(DeletionEvent, Vec<DeletionProgress>),
    DeletionDone(Vec<DeletionReport>),
}

struct Job {
    cancel: CancellationToken,
}

/// Owns every piece of mutable state; front ends talk to it through a
/// [`ControllerHandle`].
///
/// At most one fetch or deletion runs at a time. Whitelist edits are allowed
/// while a deletion runs but only affect the next one.
pub struct Controller {
    sessions: SessionManager,
    fetcher: Arc<CollectionFetcher>,
    deletion: DeletionConfig,
    whitelist: Whitelist,
    collections: HashMap<ItemKind, Collection>,
    job: Option<Job>,
    snapshot: AppSnapshot,
    pending: Vec<Event>,

    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
    state_tx: watch::Sender<AppSnapshot>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
}

impl Controller {
    /// Create a controller and the handle used to drive it.
    pub fn new(
        sessions: SessionManager,
        fetch: FetchConfig,
        deletion: DeletionConfig,
        whitelist: Whitelist,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_CHANNEL_SIZE);

        let snapshot = AppSnapshot {
            whitelist: whitelist.clone(),
            ..AppSnapshot::default()
        };
        let (state_tx, state_rx) = watch::channel(snapshot.clone());

        let handle = ControllerHandle {
            commands: commands_tx,
            events: events_tx.clone(),
            state: state_rx,
        };

        let controller = Self {
            sessions,
            fetcher: Arc::new(CollectionFetcher::new(fetch)),
            deletion,
            whitelist,
            collections: HashMap::new(),
            job: None,
            snapshot,
            pending: Vec::new(),
            commands: commands_rx,
            events: events_tx,
            state_tx,
            internal_tx,
            internal_rx,
        };

        (controller, handle)
    }

    /// Create a controller and run it on a new task.
    ///
    /// The task ends on [`Command::Shutdown`] or when every handle is dropped,
    /// and yields the final whitelist so it can be persisted.
    pub fn spawn(
        sessions: SessionManager,
        fetch: FetchConfig,
        deletion: DeletionConfig,
        whitelist: Whitelist,
    ) -> (ControllerHandle, JoinHandle<Whitelist>) {
        let (controller, handle) = Self::new(sessions, fetch, deletion, whitelist);
        (handle, tokio::spawn(controller.run()))
    }

    /// Process commands until shutdown.
    pub async fn run(mut self) -> Whitelist {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
            }
            self.publish();
        }

        if let Some(job) = self.job.take() {
            job.cancel.cancel();
        }
        debug!("Controller stopped");
        self.whitelist
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Login(keys) => match self.sessions.login(keys).await {
                Ok(session) => {
                    self.cancel_job();
                    self.collections.clear();
                    self.snapshot.account = Some(session.account.clone());
                    self.emit(Event::LoggedIn(session.account));
                }
                Err(e) => self.emit(Event::LoginFailed {
                    message: e.to_string(),
                }),
            },
            Command::Logout => self.logout(None),
            Command::Fetch(kind) => self.start_fetch(kind),
            Command::WhitelistAdd(kind, id) => {
                self.whitelist.add(kind, id);
                self.emit(Event::WhitelistChanged {
                    kind,
                    id,
                    whitelisted: true,
                });
            }
            Command::WhitelistRemove(kind, id) => {
                self.whitelist.remove(kind, id);
                self.emit(Event::WhitelistChanged {
                    kind,
                    id,
                    whitelisted: false,
                });
            }
            Command::Configure(config) => self.deletion = config,
            Command::StartDeletion(kinds) => self.start_deletion(kinds),
            Command::Cancel => {
                if let Some(job) = &self.job {
                    info!("Cancelling current job");
                    job.cancel.cancel();
                }
            }
            Command::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::FetchProgress(progress) => self.emit(Event::FetchProgress(progress)),
            Internal::FetchDone(kind, result) => {
                self.job = None;
                self.snapshot.activity = Activity::Idle;
                match result {
                    Ok(collection) => {
                        let items = collection.len();
                        self.collections.insert(kind, collection);
                        self.emit(Event::FetchCompleted { kind, items });
                    }
                    Err(e) => {
                        self.emit(Event::FetchFailed {
                            kind,
                            message: e.to_string(),
                        });
                        if e.is_auth() {
                            self.logout(Some(e.to_string()));
                        }
                    }
                }
            }
            Internal::Deletion(event, progress) => {
                self.snapshot.deletion = progress;
                self.emit(Event::Deletion(event));
            }
            Internal::DeletionDone(reports) => {
                self.job = None;
                self.snapshot.activity = Activity::Idle;

                // Deleted items are gone from the provider; the next run needs a fresh fetch.
                for report in reports.iter().filter(|r| !r.dry_run && r.deleted_count > 0) {
                    self.collections.remove(&report.kind);
                }

                // The engine only fails a run when the provider rejects the keys.
                let auth_failure = reports
                    .iter()
                    .find(|r| r.state == DeletionState::Failed)
                    .and_then(|r| r.error.clone());

                self.snapshot.last_reports = reports.clone();
                self.emit(Event::DeletionFinished(reports));

                if let Some(message) = auth_failure {
                    self.logout(Some(message));
                }
            }
        }
    }

    fn start_fetch(&mut self, kind: ItemKind) {
        if self.job.is_some() {
            self.reject("Another operation is in progress");
            return;
        }
        let session = match self.sessions.require() {
            Ok(session) => session.clone(),
            Err(e) => {
                self.reject(e.to_string());
                return;
            }
        };

        let cancel = CancellationToken::new();
        self.job = Some(Job {
            cancel: cancel.clone(),
        });
        self.snapshot.activity = Activity::Fetching(kind);

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let mut progress_rx = fetcher.subscribe();
            let progress_tx = tx.clone();
            let forward = tokio::spawn(async move {
                loop {
                    match progress_rx.recv().await {
                        Ok(progress) => {
                            if progress_tx.send(Internal::FetchProgress(progress)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            let result = fetcher.fetch_all(&session, kind, &cancel).await;
            forward.abort();
            let _ = tx.send(Internal::FetchDone(kind, result)).await;
        });
    }

    fn start_deletion(&mut self, mut kinds: Vec<ItemKind>) {
        if self.job.is_some() {
            self.reject("Another operation is in progress");
            return;
        }
        let session = match self.sessions.require() {
            Ok(session) => session.clone(),
            Err(e) => {
                self.reject(e.to_string());
                return;
            }
        };
        if kinds.is_empty() {
            self.reject("Nothing selected for deletion");
            return;
        }
        // Each feed runs once, in the order first requested.
        let mut seen = HashSet::with_capacity(kinds.len());
        kinds.retain(|kind| seen.insert(*kind));

        let mut collections = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            match self.collections.get(kind) {
                Some(collection) => collections.push(collection.clone()),
                None => {
                    self.reject(format!("Fetch {} before deleting them", kind.plural()));
                    return;
                }
            }
        }

        let cancel = CancellationToken::new();
        let engine = DeletionEngine::new(session.client(), self.deletion.clone());
        let mut run = start_run(&engine, collections, &self.whitelist, cancel.clone());

        self.job = Some(Job { cancel });
        self.snapshot.activity = Activity::Deleting(kinds.clone());
        self.snapshot.deletion = kinds.iter().filter_map(|k| run.progress(*k)).collect();

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = run.next_event().await {
                let progress = kinds.iter().filter_map(|k| run.progress(*k)).collect();
                if tx.send(Internal::Deletion(event, progress)).await.is_err() {
                    run.cancel();
                    break;
                }
            }
            let reports = run.wait().await;
            let _ = tx.send(Internal::DeletionDone(reports)).await;
        });
    }

    fn logout(&mut self, reason: Option<String>) {
        self.cancel_job();
        self.collections.clear();
        self.snapshot.account = None;
        if self.sessions.logout().is_some() {
            if let Some(reason) = &reason {
                warn!(%reason, "Session ended by the provider");
            }
            self.emit(Event::LoggedOut { reason });
        }
    }

    fn cancel_job(&mut self) {
        if let Some(job) = &self.job {
            job.cancel.cancel();
        }
    }

    fn reject(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "Command rejected");
        self.emit(Event::Rejected { message });
    }

    fn emit(&mut self, event: Event) {
        self.pending.push(event);
    }

    fn publish(&mut self) {
        self.snapshot.whitelist = self.whitelist.clone();
        let mut collections: Vec<_> = self.collections.values().map(CollectionSummary::from).collect();
        collections.sort_by_key(|c| c.kind == ItemKind::Favorite);
        self.snapshot.collections = collections;
        self.state_tx.send_replace(self.snapshot.clone());

        // Events go out after the state they describe is visible.
        for event in self.pending.drain(..) {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Cheap, cloneable access to a running [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
    state: watch::Receiver<AppSnapshot>,
}

impl ControllerHandle {
    /// Queue a command.
    pub async fn send(&self, command: Command) -> Result<(), ControllerClosed> {
        self.commands.send(command).await.map_err(|_| ControllerClosed)
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> AppSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<AppSnapshot> {
        self.state.clone()
    }

    /// Send `command` and wait for the first event `pick` accepts.
    ///
    /// Events arriving in between are passed to `on_other`.
    pub async fn request<T>(
        &self,
        command: Command,
        mut pick: impl FnMut(&Event) -> Option<T>,
        mut on_other: impl FnMut(&Event),
    ) -> Result<T, ControllerClosed> {
        let mut events = self.subscribe();
        self.send(command).await?;

        loop {
            let received = tokio::select! {
                received = events.recv() => received,
                _ = self.commands.closed() => return Err(ControllerClosed),
            };
            match received {
                Ok(event) => match pick(&event) {
                    Some(value) => return Ok(value),
                    None => on_other(&event),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ControllerClosed),
            }
        }
    }
}
