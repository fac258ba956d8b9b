//! rolesync - keeps Discord roles in step with reactions on menu messages.
//!
//! # Commands
//!
//! ```text
//! rolesync [run]                       consume the NDJSON feed on stdin
//! rolesync list [--guild <id>]         print stored menus
//! rolesync import <menu.toml>          store a menu, binding its posting
//! rolesync delete <guild> <channel> <message>
//! ```
//!
//! `run` reads selection and menu lifecycle envelopes (see [`feed`]) until
//! stdin closes or Ctrl-C arrives, then waits for in-flight selections to
//! settle before exiting. Logs go to `~/.rolesync/logs/rolesync.log`.

mod feed;
mod import;

use std::{
    fs::{self, OpenOptions},
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{BufReader, stdin};
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rolesync_config::RolesyncConfig;
use rolesync_engine::{MenuRegistry, MenuSource, SyncSettings, Synchronizer};
use rolesync_platform::{DiscordClient, Platform};
use rolesync_store::{MenuStore, SharedMenuStore};
use rolesync_types::{ChannelId, GuildId, MenuDefinition, MessageId, PostingRef};

use crate::import::MenuFile;

#[derive(Debug, Parser)]
#[command(name = "rolesync", about = "Reaction role menus for Discord", version)]
struct Cli {
    /// Config file (defaults to ~/.rolesync/config.toml)
    #[arg(short, long, env = "ROLESYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume the event feed on stdin
    Run,
    /// Print stored menus
    List {
        #[arg(long)]
        guild: Option<GuildId>,
    },
    /// Store a menu from a TOML file
    Import { file: PathBuf },
    /// Delete the menu bound to a posting
    Delete {
        guild: GuildId,
        channel: ChannelId,
        message: MessageId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => RolesyncConfig::load_from(path)?,
        None => RolesyncConfig::load()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::List { guild } => {
            let store = open_store(&config)?;
            let menus = match guild {
                Some(guild) => store.list_guild(guild)?,
                None => store.list_published()?,
            };
            for menu in &menus {
                println!("{}", describe(menu));
            }
            Ok(())
        }
        Command::Import { file } => {
            let file = MenuFile::read(&file)?;
            let mut store = open_store(&config)?;
            let menu = import::import(&mut store, &file)?;
            println!("{}", describe(&menu));
            Ok(())
        }
        Command::Delete {
            guild,
            channel,
            message,
        } => {
            let posting = PostingRef::new(guild, channel, message);
            let mut store = open_store(&config)?;
            if !store.delete_by_posting(posting)? {
                bail!("No menu is bound to {posting}");
            }
            println!("Deleted menu at {posting}");
            Ok(())
        }
    }
}

async fn run(config: &RolesyncConfig) -> Result<()> {
    let client_config = config.discord_client().with_context(|| {
        format!(
            "No bot token configured; set {} or [discord].token",
            rolesync_config::TOKEN_ENV
        )
    })?;
    let platform: Arc<dyn Platform> = Arc::new(DiscordClient::new(&client_config)?);

    let self_user = match platform.current_user().await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(error = %e, "Could not resolve own user; self-echo filtering relies on the bot flag");
            None
        }
    };

    let store = SharedMenuStore::new(open_store(config)?);
    let source: Arc<dyn MenuSource> = Arc::new(store);
    let registry = Arc::new(MenuRegistry::new(source));
    if config.engine.warm_cache {
        match registry.warm().await {
            Ok(count) => tracing::info!(count, "Menu cache warmed"),
            Err(e) => tracing::warn!(error = %e, "Menu cache warm-up failed; loading lazily"),
        }
    }

    let settings = SyncSettings {
        membership_retry: config.retry.membership_policy(),
        mark_retry: config.retry.marks_policy(),
        self_user,
    };
    let sync = Arc::new(Synchronizer::new(
        platform,
        Arc::clone(&registry),
        settings,
    ));

    let (tx, rx) = mpsc::channel(config.engine.event_buffer());
    let runner = tokio::spawn(sync.run(rx));

    let input = BufReader::new(stdin());
    tokio::select! {
        result = feed::pump(input, tx, registry) => {
            if let Err(e) = result {
                tracing::error!(error = %format!("{e:#}"), "Feed failed; draining in-flight selections");
            }
        }
        _ = signal::ctrl_c() => tracing::info!("Interrupted; draining in-flight selections"),
    }

    let summary = runner.await.context("Engine task panicked")?;
    eprintln!(
        "processed {} dropped {} ignored {} discarded {} failed {} aborted {}",
        summary.processed,
        summary.dropped,
        summary.ignored,
        summary.discarded,
        summary.failed,
        summary.aborted
    );
    Ok(())
}

fn open_store(config: &RolesyncConfig) -> Result<MenuStore> {
    let path = config
        .store_path()
        .context("No home directory; set [store].path")?;
    MenuStore::open(&path)
}

fn describe(menu: &MenuDefinition) -> String {
    let posting = menu
        .posting()
        .map_or_else(|| "unposted".to_string(), |p| p.to_string());
    let options = menu
        .options()
        .iter()
        .map(|o| format!("{}={}", o.token, o.role))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} [{}] {} at {posting}: {options}",
        menu.id(),
        menu.mode().as_str(),
        menu.title()
    )
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries command output, so fall back to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = rolesync_config::data_dir() {
        candidates.push(dir.join("logs").join("rolesync.log"));
    }
    candidates.push(PathBuf::from(".rolesync").join("logs").join("rolesync.log"));
    candidates
}
