use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

mod remote;
mod settings;
mod store;
mod sync;
mod tracker;

use remote::GithubClient;
use settings::{derive_from_pages_url, ConnectionSettings};
use store::LocalStore;
use sync::{PushOutcome, SyncEngine};
use tracker::{round2, Tracker, TrackerState};

/// Brewgoal - savings progress tracker with GitHub-backed sync
#[derive(Parser)]
#[command(name = "brewgoal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory for local state and settings. Defaults to ~/.brewgoal
    #[arg(long, env = "BREWGOAL_DATA_DIR")]
    data_dir: Option<String>,

    /// Hosting address used to derive connection defaults (for setups that
    /// also publish the tracker as a GitHub Pages site)
    #[arg(long, env = "BREWGOAL_PAGES_URL", hide = true)]
    pages_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a contribution
    Add {
        /// Amount to add (positive, 2-decimal currency)
        amount: f64,
    },
    /// Remove the most recent contribution
    Undo,
    /// Clear all progress
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show progress, refreshing from the remote when configured
    Status {
        /// Skip the automatic settings/state pull
        #[arg(long)]
        no_refresh: bool,
    },
    /// Push local progress to the remote repository
    Push,
    /// Pull remote progress, overwriting local state
    Pull,
    /// Inspect or change connection settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show the effective connection settings
    Show,
    /// Change connection settings (persisted immediately)
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Remote path of the progress document
        #[arg(long)]
        path: Option<String>,
        /// Remote path of the shared settings document
        #[arg(long)]
        settings_path: Option<String>,
        /// Access token for writes. Pass an empty string to clear it
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        goal: Option<f64>,
        /// Seed the remote with local state when an automatic pull finds
        /// no remote document
        #[arg(long)]
        seed_on_empty_pull: Option<bool>,
    },
    /// Publish the token-free settings document for other devices
    Share,
    /// Fetch the shared settings document and fill empty local settings
    Fetch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = LocalStore::new(cli.data_dir.clone())?;
    let engine = SyncEngine::new(GithubClient::new());
    let pages_url = cli.pages_url.as_deref();

    match cli.command {
        Commands::Add { amount } => run_add(&store, amount),
        Commands::Undo => run_undo(&store),
        Commands::Reset { yes } => run_reset(&store, yes),
        Commands::Status { no_refresh } => run_status(&store, &engine, pages_url, no_refresh).await,
        Commands::Push => run_push(&store, &engine, pages_url).await,
        Commands::Pull => run_pull(&store, &engine, pages_url).await,
        Commands::Settings { action } => run_settings(&store, &engine, pages_url, action).await,
    }
}

/// Effective settings for this invocation: persisted values, then the
/// hosting-address heuristic, then literal defaults. Heuristic and literal
/// fills stay in memory; only explicit edits and fetched shared values are
/// ever persisted, so a later source with higher precedence can still apply.
fn resolved_settings(store: &LocalStore, pages_url: Option<&str>) -> Result<ConnectionSettings> {
    let mut settings = store.load_settings()?;
    if let Some(derived) = pages_url.and_then(derive_from_pages_url) {
        settings.fill_missing(&derived);
    }
    settings.fill_literal_defaults();
    Ok(settings)
}

/// Pull the shared settings document and fill empty persisted settings from
/// it. Returns the re-resolved effective settings.
async fn refresh_shared_settings(
    store: &LocalStore,
    engine: &SyncEngine<GithubClient>,
    pages_url: Option<&str>,
) -> Result<ConnectionSettings> {
    let located = resolved_settings(store, pages_url)?;
    if !located.is_connected() {
        return Ok(located);
    }

    if let Some(doc) = engine.fetch_shared_settings(&located).await? {
        let mut persisted = store.load_settings()?;
        if persisted.fill_missing(&doc.as_partial()) {
            store
                .save_settings(&persisted)
                .context("Failed to persist fetched settings")?;
        }
    }
    resolved_settings(store, pages_url)
}

fn run_add(store: &LocalStore, amount: f64) -> Result<()> {
    let mut tracker = Tracker::load(store.clone())?;
    let amount = tracker.add(amount)?;
    println!(
        "➕ Added ${:.2} (total ${:.2})",
        amount,
        tracker.state().total()
    );
    Ok(())
}

fn run_undo(store: &LocalStore) -> Result<()> {
    let mut tracker = Tracker::load(store.clone())?;
    match tracker.undo()? {
        Some(amount) => println!(
            "↩️  Removed ${:.2} (total ${:.2})",
            amount,
            tracker.state().total()
        ),
        None => println!("Nothing to undo."),
    }
    Ok(())
}

fn run_reset(store: &LocalStore, yes: bool) -> Result<()> {
    if !yes && !confirm("Reset all progress?")? {
        println!("Reset cancelled.");
        return Ok(());
    }
    let mut tracker = Tracker::load(store.clone())?;
    tracker.reset()?;
    println!("✅ Progress reset.");
    Ok(())
}

async fn run_status(
    store: &LocalStore,
    engine: &SyncEngine<GithubClient>,
    pages_url: Option<&str>,
    no_refresh: bool,
) -> Result<()> {
    let mut tracker = Tracker::load(store.clone())?;

    // The automatic refresh is best-effort: failures are logged and local
    // state renders regardless.
    let settings = if no_refresh {
        resolved_settings(store, pages_url)?
    } else {
        match refresh_shared_settings(store, engine, pages_url).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Settings refresh failed: {e:#}");
                resolved_settings(store, pages_url)?
            }
        }
    };

    if !no_refresh && settings.is_connected() {
        match engine.pull(&settings, tracker.state()).await {
            Ok(Some(state)) => tracker.replace(state)?,
            Ok(None) => {}
            Err(e) => warn!("Automatic pull failed: {e}"),
        }
    }

    render(tracker.state(), settings.goal);
    Ok(())
}

async fn run_push(
    store: &LocalStore,
    engine: &SyncEngine<GithubClient>,
    pages_url: Option<&str>,
) -> Result<()> {
    let settings = resolved_settings(store, pages_url)?;
    ensure_connected(&settings)?;

    let tracker = Tracker::load(store.clone())?;
    match engine.push(&settings, tracker.state()).await? {
        PushOutcome::Created => println!("✅ Created remote progress document."),
        PushOutcome::Updated => println!("✅ Synced progress to remote."),
    }
    Ok(())
}

async fn run_pull(
    store: &LocalStore,
    engine: &SyncEngine<GithubClient>,
    pages_url: Option<&str>,
) -> Result<()> {
    let settings = resolved_settings(store, pages_url)?;
    ensure_connected(&settings)?;

    let mut tracker = Tracker::load(store.clone())?;
    match engine.pull(&settings, tracker.state()).await? {
        Some(state) => {
            tracker.replace(state)?;
            println!("✅ Pulled remote progress.");
            render(tracker.state(), settings.goal);
        }
        None => println!("No remote progress document yet. Use 'brewgoal push' to create it."),
    }
    Ok(())
}

async fn run_settings(
    store: &LocalStore,
    engine: &SyncEngine<GithubClient>,
    pages_url: Option<&str>,
    action: SettingsAction,
) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = resolved_settings(store, pages_url)?;
            println!("owner:              {}", display_or_unset(&settings.owner));
            println!("repo:               {}", display_or_unset(&settings.repo));
            println!("branch:             {}", settings.branch);
            println!("path:               {}", settings.path);
            println!("settings path:      {}", settings.settings_path);
            println!(
                "token:              {}",
                if settings.token.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!("goal:               ${:.2}", settings.goal);
            println!("seed on empty pull: {}", settings.seed_on_empty_pull);
        }
        SettingsAction::Set {
            owner,
            repo,
            branch,
            path,
            settings_path,
            token,
            goal,
            seed_on_empty_pull,
        } => {
            let mut persisted = store.load_settings()?;
            if let Some(owner) = owner {
                persisted.owner = owner;
            }
            if let Some(repo) = repo {
                persisted.repo = repo;
            }
            if let Some(branch) = branch {
                persisted.branch = branch;
            }
            if let Some(path) = path {
                persisted.path = path;
            }
            if let Some(settings_path) = settings_path {
                persisted.settings_path = settings_path;
            }
            if let Some(token) = token {
                persisted.token = if token.is_empty() { None } else { Some(token) };
            }
            if let Some(goal) = goal {
                anyhow::ensure!(goal > 0.0, "goal must be a positive amount");
                persisted.goal = goal;
            }
            if let Some(seed) = seed_on_empty_pull {
                persisted.seed_on_empty_pull = seed;
            }
            store.save_settings(&persisted)?;
            println!("✅ Settings saved.");
        }
        SettingsAction::Share => {
            let settings = resolved_settings(store, pages_url)?;
            ensure_connected(&settings)?;
            match engine.push_shared_settings(&settings).await? {
                PushOutcome::Created => println!("✅ Published shared settings document."),
                PushOutcome::Updated => println!("✅ Updated shared settings document."),
            }
        }
        SettingsAction::Fetch => {
            let located = resolved_settings(store, pages_url)?;
            ensure_connected(&located)?;
            match engine.fetch_shared_settings(&located).await? {
                Some(doc) => {
                    let mut persisted = store.load_settings()?;
                    if persisted.fill_missing(&doc.as_partial()) {
                        store.save_settings(&persisted)?;
                        println!("✅ Filled empty settings from the shared document.");
                    } else {
                        println!("Settings already up to date.");
                    }
                }
                None => println!("No shared settings document found on the remote."),
            }
        }
    }
    Ok(())
}

fn ensure_connected(settings: &ConnectionSettings) -> Result<()> {
    anyhow::ensure!(
        settings.is_connected(),
        "No remote configured. Run 'brewgoal settings set --owner <owner> --repo <repo>' first."
    );
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn render(state: &TrackerState, goal: f64) {
    let pct = if goal > 0.0 {
        (state.total() / goal * 100.0).min(100.0)
    } else {
        0.0
    };
    let filled = (pct / 5.0).round() as usize;
    let bar: String = "█".repeat(filled) + &"░".repeat(20 - filled);
    println!("[{bar}] ${:.2} / ${:.2} ({pct:.1}%)", state.total(), goal);

    if state.is_empty() {
        println!("No contributions yet.");
        return;
    }
    let mut running = 0.0;
    for amount in state.history() {
        running = round2(running + amount);
        println!("  +{amount:.2} → ${running:.2}");
    }
    if goal > 0.0 && state.total() >= goal {
        println!("🎉 Goal reached!");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{self, Write};

    print!("{prompt} [y/N]: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();

    Ok(answer == "y" || answer == "yes")
}
