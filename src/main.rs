//! Playtime Monitor - automatic playtime tracking by watching running executables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use playtime_monitor::config::{AppConfig, ConfigError, ConfigLoader};
use playtime_monitor::display;
use playtime_monitor::monitor::{resolve_watch_set, Monitor, MonitorError, SysinfoSource};
use playtime_monitor::settings::{MonitorSettings, SettingsError, SettingsStore};
use playtime_monitor::storage::{Database, StorageError};

#[derive(Parser)]
#[command(
    name = "playtime-monitor",
    about = "Track playtime automatically by watching running executables",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a config file (overrides the default search paths).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database (overrides the config file).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print events and records as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch running executables and record playtime until Ctrl-C.
    Run,
    /// Show which executables a path list resolves to.
    Resolve {
        /// Semicolon-delimited files and directories (defaults to stored settings).
        #[arg(long)]
        paths: Option<String>,
    },
    /// Show or change monitoring settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// List recorded playtime per executable.
    Totals,
    /// Associate an executable with a game.
    Link {
        /// Executable file name, e.g. `game.bin`.
        executable: String,
        /// Game identifier.
        game_id: i64,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the stored settings.
    Show,
    /// Update the stored settings.
    Set {
        /// Turn monitoring on or off.
        #[arg(long)]
        enabled: Option<bool>,
        /// Semicolon-delimited files and directories to watch.
        #[arg(long)]
        paths: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = loader.load()?;
    if let Some(path) = &cli.database {
        config.database.path = Some(path.clone());
    }
    Ok(config)
}

async fn run_monitor(config: &AppConfig, db: Database, json: bool) -> Result<(), CliError> {
    let settings = SettingsStore::load(db.clone()).await?;
    let source = Arc::new(SysinfoSource::new(config.monitor.enumeration_timeout()));
    let monitor = Monitor::new(
        Arc::new(db),
        source,
        settings.subscribe(),
        config.monitor.clone(),
    );
    let mut events = monitor.subscribe();

    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    let mut handle = tokio::spawn(monitor.run(ready_rx, cancel.clone()));

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if json => display::print_json(&event),
                Ok(event) => display::print_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event display lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // The database is open and migrated; release the monitor.
    let _ = ready_tx.send(());

    let mut reload = tokio::time::interval(config.monitor.settings_reload_interval());
    let result = loop {
        tokio::select! {
            res = &mut handle => break res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                cancel.cancel();
                break handle.await;
            }
            _ = reload.tick() => {
                if let Err(e) = settings.reload().await {
                    tracing::warn!(error = %e, "Failed to reload settings");
                }
            }
        }
    };

    let summary = result.map_err(MonitorError::from)??;
    let _ = printer.await;
    if !json {
        display::print_summary(&summary);
    }
    Ok(())
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    let db = Database::open(config.database.path()).await?;

    match cli.command {
        Commands::Run => {
            tracing::info!(
                database = %config.database.path().display(),
                poll = ?config.monitor.poll_interval(),
                flush = ?config.monitor.flush_interval(),
                "Starting playtime monitor"
            );
            run_monitor(&config, db, cli.json).await?;
        }
        Commands::Resolve { paths } => {
            let spec = match paths {
                Some(p) => p,
                None => db.load_settings().await?.executable_paths,
            };
            let set = resolve_watch_set(&spec)?;
            display::print_watch_set(&set);
        }
        Commands::Settings { action } => {
            let store = SettingsStore::load(db).await?;
            match action {
                SettingsAction::Show => display::print_settings(&store.current()),
                SettingsAction::Set { enabled, paths } => {
                    let current = store.current();
                    let updated = MonitorSettings {
                        enabled: enabled.unwrap_or(current.enabled),
                        executable_paths: paths.unwrap_or(current.executable_paths),
                    };
                    if updated.enabled {
                        // Reject path lists the monitor would refuse at startup.
                        resolve_watch_set(&updated.executable_paths)?;
                    }
                    store.update(updated).await?;
                    display::print_settings(&store.current());
                }
            }
        }
        Commands::Totals => {
            let details = db.list_executable_details().await?;
            if cli.json {
                for d in &details {
                    display::print_json(d);
                }
            } else {
                let total = db.total_minutes_played().await?;
                display::print_totals(&details, total);
            }
        }
        Commands::Link {
            executable,
            game_id,
        } => {
            let details = db.link_executable(&executable, game_id).await?;
            display::print_totals(std::slice::from_ref(&details), details.minutes_played);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
