//! amnesia - bulk-delete your tweets and favorites.
//!
//! Usage:
//!   amnesia login              Verify and save API keys
//!   amnesia fetch [FEED]       Fetch and summarize tweets or favorites
//!   amnesia whitelist ...      Manage items that are never deleted
//!   amnesia delete [FEED]      Delete everything not whitelisted or kept
//!   amnesia schedule [FEED]    Delete once a day at a fixed hour
//!   amnesia logout             Forget saved API keys
//!   amnesia --help             Show help

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use amnesia_api::SessionManager;
use amnesia_app::{
    Command as AppCommand, Controller, ControllerHandle, Event, RunOutcome, Settings,
    fetch_and_delete, run_scheduled,
};
use amnesia_core::{ItemId, ItemKind, KeepPolicy, RunMode, UserKeys, Whitelist};
use amnesia_fetch::CollectionFetcher;
use amnesia_ops::{DailySchedule, DeletionEvent, DeletionReport};

#[derive(Parser)]
#[command(
    name = "amnesia",
    version,
    about = "Bulk-delete your tweets and favorites",
    long_about = "amnesia deletes your old tweets and removes your old favorites.\n\n\
                  Log in once with `amnesia login`, whitelist what you want to keep, \
                  then run `amnesia delete --dry-run` to preview a deletion."
)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug). AMNESIA_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify API keys and save them
    Login {
        #[arg(long, env = "AMNESIA_CONSUMER_KEY")]
        consumer_key: String,
        #[arg(long, env = "AMNESIA_CONSUMER_SECRET", hide_env_values = true)]
        consumer_secret: String,
        #[arg(long, env = "AMNESIA_ACCESS_TOKEN")]
        access_token: String,
        #[arg(long, env = "AMNESIA_ACCESS_TOKEN_SECRET", hide_env_values = true)]
        access_token_secret: String,
    },

    /// Forget saved API keys
    Logout,

    /// Fetch a feed and show a summary
    Fetch {
        #[arg(default_value = "all")]
        feed: Feed,

        /// List every item
        #[arg(short, long)]
        list: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage items that are never deleted
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Delete tweets and remove favorites
    Delete {
        #[arg(default_value = "all")]
        feed: Feed,

        #[command(flatten)]
        options: DeleteOptions,
    },

    /// Run a deletion every day at a fixed hour until interrupted
    Schedule {
        #[arg(default_value = "all")]
        feed: Feed,

        /// Hour of the day (0-23); saved for later runs
        #[arg(long)]
        hour: Option<u32>,

        #[command(flatten)]
        options: DeleteOptions,
    },
}

#[derive(Subcommand)]
enum WhitelistAction {
    /// Protect an item
    Add { kind: Kind, id: u64 },
    /// Stop protecting an item
    Remove { kind: Kind, id: u64 },
    /// Show protected items
    List,
}

#[derive(clap::Args)]
struct DeleteOptions {
    /// Show what would be deleted without deleting anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Keep items younger than this (e.g., "12h", "30d", "2w", "1y"; "0" keeps nothing by age)
    #[arg(short, long)]
    keep: Option<String>,

    /// Keep tweets favorited more than this many times
    #[arg(long)]
    max_favorites: Option<u64>,

    /// Keep tweets retweeted more than this many times
    #[arg(long)]
    max_retweets: Option<u64>,

    /// Delete tweets and favorites at the same time
    #[arg(long)]
    concurrent: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Feed {
    Tweets,
    Favorites,
    All,
}

impl Feed {
    fn kinds(self) -> Vec<ItemKind> {
        match self {
            Feed::Tweets => vec![ItemKind::Tweet],
            Feed::Favorites => vec![ItemKind::Favorite],
            Feed::All => vec![ItemKind::Tweet, ItemKind::Favorite],
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Tweet,
    Favorite,
}

impl From<Kind> for ItemKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Tweet => ItemKind::Tweet,
            Kind::Favorite => ItemKind::Favorite,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = SettingsStore::new(cli.config)?;
    let mut settings = store.load()?;

    match cli.command {
        Command::Login {
            consumer_key,
            consumer_secret,
            access_token,
            access_token_secret,
        } => {
            let keys = UserKeys::new(consumer_key, consumer_secret, access_token, access_token_secret);
            run_login(&store, &mut settings, keys).await?;
        }
        Command::Logout => {
            if settings.keys.take().is_some() {
                store.save(&settings)?;
                println!("Saved keys removed.");
            } else {
                println!("Not logged in.");
            }
        }
        Command::Fetch { feed, list, format } => {
            run_fetch(&settings, feed, list, format).await?;
        }
        Command::Whitelist { action } => {
            run_whitelist(&store, &mut settings, action)?;
        }
        Command::Delete { feed, options } => {
            apply_options(&mut settings, &options)?;
            run_delete(&settings, feed).await?;
        }
        Command::Schedule {
            feed,
            hour,
            options,
        } => {
            if let Some(hour) = hour {
                DailySchedule::new(hour)?;
                settings.schedule_hour = Some(hour);
                store.save(&settings)?;
            }
            apply_options(&mut settings, &options)?;
            run_schedule(&settings, feed).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("AMNESIA_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Where settings are read from and written to.
struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        let path = path
            .or_else(Settings::config_path)
            .ok_or_else(|| eyre!("No config directory; pass --config"))?;
        Ok(Self { path })
    }

    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        Settings::load_from(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        settings
            .save_to(&self.path)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn apply_options(settings: &mut Settings, options: &DeleteOptions) -> Result<()> {
    let deletion = &mut settings.deletion;
    deletion.dry_run |= options.dry_run;
    if options.concurrent {
        deletion.run_mode = RunMode::Concurrent;
    }

    let keep = &mut deletion.keep;
    if let Some(keep_for) = &options.keep {
        keep.keep_younger_than = parse_keep_window(keep_for)?;
    }
    if options.max_favorites.is_some() {
        keep.max_favorites = options.max_favorites;
    }
    if options.max_retweets.is_some() {
        keep.max_retweets = options.max_retweets;
    }
    Ok(())
}

/// Verify keys against the provider, then save them.
async fn run_login(store: &SettingsStore, settings: &mut Settings, keys: UserKeys) -> Result<()> {
    let mut sessions = SessionManager::twitter(settings.api.clone());
    let session = sessions.login(keys).await.context("Login failed")?;

    println!("Logged in as @{}", session.account.screen_name);
    settings.keys = Some(session.keys);
    store.save(settings)?;
    Ok(())
}

/// Fetch feeds directly and print them.
async fn run_fetch(settings: &Settings, feed: Feed, list: bool, format: OutputFormat) -> Result<()> {
    let keys = saved_keys(settings)?;
    let mut sessions = SessionManager::twitter(settings.api.clone());
    let session = sessions.login(keys).await.context("Login failed")?;

    let fetcher = CollectionFetcher::new(settings.fetch.clone());
    let mut progress_rx = fetcher.subscribe();
    let progress_task = tokio::spawn(async move {
        while let Ok(progress) = progress_rx.recv().await {
            eprint!(
                "\rFetching {}: {} items, {} pages",
                progress.kind.plural(),
                progress.items_fetched,
                progress.pages_fetched
            );
            let _ = std::io::stderr().flush();
        }
    });

    let cancel = cancel_on_ctrl_c();
    let mut collections = Vec::new();
    for kind in feed.kinds() {
        let collection = fetcher
            .fetch_all(&session, kind, &cancel)
            .await
            .with_context(|| format!("Failed to fetch {}", kind.plural()))?;
        eprintln!();
        collections.push(collection);
    }
    progress_task.abort();

    match format {
        OutputFormat::Text => {
            for collection in &collections {
                let stats = collection.stats();
                println!();
                println!("{}", "─".repeat(60));
                println!(
                    " {} {} in {} pages",
                    collection.len(),
                    collection.kind().plural(),
                    stats.pages_fetched
                );
                if let (Some((_, oldest)), Some((_, newest))) = (stats.oldest, stats.newest) {
                    println!(
                        " From {} to {}",
                        oldest.format("%Y-%m-%d"),
                        newest.format("%Y-%m-%d")
                    );
                }
                let protected = collection
                    .iter()
                    .filter(|item| settings.whitelist.is_whitelisted(item.kind, item.id))
                    .count();
                println!(" {protected} whitelisted");
                println!("{}", "─".repeat(60));

                if list {
                    for item in collection.iter() {
                        let mark = if settings.whitelist.is_whitelisted(item.kind, item.id) {
                            "*"
                        } else {
                            " "
                        };
                        println!(
                            " {mark} {:>20}  {}  {}",
                            item.id,
                            item.created_at.format("%Y-%m-%d"),
                            item.snippet(50)
                        );
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&collections)?);
        }
    }

    Ok(())
}

fn run_whitelist(store: &SettingsStore, settings: &mut Settings, action: WhitelistAction) -> Result<()> {
    match action {
        WhitelistAction::Add { kind, id } => {
            let kind = ItemKind::from(kind);
            if settings.whitelist.add(kind, ItemId(id)) {
                store.save(settings)?;
                println!("Whitelisted {kind} {id}");
            } else {
                println!("{kind} {id} is already whitelisted");
            }
        }
        WhitelistAction::Remove { kind, id } => {
            let kind = ItemKind::from(kind);
            if settings.whitelist.remove(kind, ItemId(id)) {
                store.save(settings)?;
                println!("Removed {kind} {id} from the whitelist");
            } else {
                println!("{kind} {id} is not whitelisted");
            }
        }
        WhitelistAction::List => {
            print_whitelist(&settings.whitelist);
        }
    }
    Ok(())
}

fn print_whitelist(whitelist: &Whitelist) {
    if whitelist.is_empty() {
        println!("The whitelist is empty.");
        return;
    }
    for kind in [ItemKind::Tweet, ItemKind::Favorite] {
        println!("{} ({}):", kind.plural(), whitelist.len(kind));
        for id in whitelist.ids(kind) {
            println!("  {id}");
        }
    }
}

async fn run_delete(settings: &Settings, feed: Feed) -> Result<()> {
    let (handle, task) = start_controller(settings).await?;
    let cancel = cancel_on_ctrl_c();

    let outcome = fetch_and_delete(&handle, &feed.kinds(), &cancel, print_event).await?;
    let result = print_outcome(&outcome);

    handle.send(AppCommand::Shutdown).await?;
    task.await?;
    result
}

async fn run_schedule(settings: &Settings, feed: Feed) -> Result<()> {
    let hour = settings
        .schedule_hour
        .ok_or_else(|| eyre!("No hour configured; pass --hour"))?;
    let schedule = DailySchedule::new(hour)?;

    let (handle, task) = start_controller(settings).await?;
    let cancel = cancel_on_ctrl_c();

    println!("Running every day at {hour:02}:00. Press Ctrl-C to stop.");
    let runs = run_scheduled(&handle, schedule, feed.kinds(), cancel, |outcome| {
        if let Err(e) = print_outcome(outcome) {
            eprintln!("{e}");
        }
    })
    .await;
    println!("Stopped after {runs} run(s).");

    handle.send(AppCommand::Shutdown).await?;
    task.await?;
    Ok(())
}

fn saved_keys(settings: &Settings) -> Result<UserKeys> {
    settings
        .keys
        .clone()
        .ok_or_else(|| eyre!("Not logged in; run `amnesia login` first"))
}

/// Spawn the controller and log in with the saved keys.
async fn start_controller(settings: &Settings) -> Result<(ControllerHandle, JoinHandle<Whitelist>)> {
    let keys = saved_keys(settings)?;
    let (handle, task) = Controller::spawn(
        SessionManager::twitter(settings.api.clone()),
        settings.fetch.clone(),
        settings.deletion.clone(),
        settings.whitelist.clone(),
    );

    let login = handle
        .request(
            AppCommand::Login(keys),
            |event| match event {
                Event::LoggedIn(account) => Some(Ok(account.screen_name.clone())),
                Event::LoginFailed { message } => Some(Err(message.clone())),
                _ => None,
            },
            |_| {},
        )
        .await?;

    match login {
        Ok(screen_name) => eprintln!("Logged in as @{screen_name}"),
        Err(message) => bail!("Login failed: {message}"),
    }
    Ok((handle, task))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after the current item...");
            token.cancel();
        }
    });
    cancel
}

fn print_event(event: &Event) {
    match event {
        Event::FetchCompleted { kind, items } => {
            eprintln!("Fetched {items} {}", kind.plural());
        }
        Event::Deletion(DeletionEvent::Started {
            kind,
            total_items,
            kept,
            dry_run,
        }) => {
            let verb = if *dry_run { "Checking" } else { "Processing" };
            eprintln!("{verb} {total_items} {} ({kept} kept)", kind.plural());
        }
        Event::Deletion(DeletionEvent::Retrying {
            kind,
            id,
            attempt,
            delay,
            message,
        }) => {
            eprintln!(
                "  {kind} {id}: {message}; retry {attempt} in {:.1}s",
                delay.as_secs_f64()
            );
        }
        Event::Deletion(DeletionEvent::Failed(failure)) => {
            eprintln!("  {failure}");
        }
        _ => {}
    }
}

fn print_outcome(outcome: &RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Finished(reports) => {
            for report in reports {
                print_report(report);
            }
            Ok(())
        }
        RunOutcome::FetchFailed { kind, message } => {
            bail!("Failed to fetch {}: {message}", kind.plural())
        }
        RunOutcome::Rejected(message) => bail!("{message}"),
        RunOutcome::Cancelled => {
            println!("Cancelled before deleting anything.");
            Ok(())
        }
    }
}

fn print_report(report: &DeletionReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", report.summary());
    println!(" Took {}", format_elapsed(report.elapsed));
    println!("{}", "─".repeat(60));

    if report.dry_run {
        for id in &report.would_delete {
            println!("   would {} {id}", report.kind.deleted_verb().to_lowercase());
        }
    }
    for failure in &report.failures {
        println!("   {failure}");
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Parse a keep window like "12h", "30d", "2w" or "1y". A bare number is days.
///
/// A zero window turns age-based keeping off.
fn parse_keep_window(s: &str) -> Result<Option<Duration>> {
    let s = s.trim().to_lowercase();
    let (count, unit) = match s.char_indices().last() {
        Some((i, unit @ ('h' | 'd' | 'w' | 'y'))) => (&s[..i], unit),
        _ => (s.as_str(), 'd'),
    };
    let count: u64 = count
        .parse()
        .with_context(|| format!("Invalid keep window: {s}"))?;

    let window = match unit {
        'h' => KeepPolicy::keep_window(count, 0, 0, 0),
        'd' => KeepPolicy::keep_window(0, count, 0, 0),
        'w' => KeepPolicy::keep_window(0, 0, count, 0),
        _ => KeepPolicy::keep_window(0, 0, 0, count),
    };
    window.map_err(|e| eyre!("{e}: {s}"))
}
