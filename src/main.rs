//! prsync: keep a classified board of a repository's pull requests in sync.
//!
//! ## Subcommands
//!
//! - `show`: print the board of one or more repositories, fetching only what
//!   is not fresh
//! - `refresh`: revalidate a repository regardless of age
//! - `invalidate`: delete a repository's snapshot
//! - `status`: list every snapshot and how old it is
//! - `config`: print the resolved configuration

mod error;
mod github;
mod output;
mod store;

use crate::error::{Error, ErrorKind, Result};
use crate::github::GhCli;
use crate::output::{BoardJson, Freshness};
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use futures::future::join_all;
use prsync_board::CollectionKey;
use prsync_cache::{Clock, Policy, Synchronizer, SystemClock};
use prsync_config::Config;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prsync", version, about = "Keep a classified board of pull requests in sync")]
struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short, global = true, env = "PRSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the board of one or more repositories
    Show {
        /// Repositories as owner/name
        #[arg(required = true, value_name = "OWNER/NAME")]
        repos: Vec<String>,

        /// Fetch even if the cached board is fresh
        #[arg(long)]
        force: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Revalidate a repository, whatever the age of its cached board
    Refresh {
        #[arg(value_name = "OWNER/NAME")]
        repo: String,
    },

    /// Delete the snapshot of a repository
    Invalidate {
        #[arg(value_name = "OWNER/NAME")]
        repo: String,
    },

    /// List stored snapshots and their age
    Status,

    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli).await.map_err(|err| miette::miette!("{err:?}"))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("PRSYNC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Show { repos, force, json } => show(&config, &repos, force, json).await,
        Command::Refresh { repo } => refresh(&config, &parse_key(&repo)?).await,
        Command::Invalidate { repo } => invalidate(&config, &parse_key(&repo)?).await,
        Command::Status => status(&config).await,
        Command::Config => {
            let mut out = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &config).or_raise(|| ErrorKind::Output)?;
            writeln!(out).or_raise(|| ErrorKind::Output)
        },
    }
}

fn parse_key(repo: &str) -> Result<CollectionKey> {
    repo.parse::<CollectionKey>().or_raise(|| ErrorKind::InvalidRepository(repo.to_string()))
}

async fn synchronizer(config: &Config) -> Result<Synchronizer> {
    let store = store::open(config).await?;
    let fetcher = Arc::new(GhCli::locate(&config.github)?);
    let policy = Policy::new(config.freshness(), config.staleness())
        .or_raise(|| ErrorKind::Config)?
        .with_fetch_timeout(config.fetch_timeout());
    Synchronizer::builder(fetcher, store)
        .policy(policy)
        .namespace(config.namespace.clone())
        .build()
        .or_raise(|| ErrorKind::Config)
}

/// The error of the first entry that has one, so the exit status reflects
/// boards that could not be shown.
fn first_failure(sync: &Synchronizer, keys: &[CollectionKey]) -> Result<()> {
    for key in keys {
        if let Some(message) = sync.entry(key).error {
            return Err(Error::from(ErrorKind::Fetch(format!("{key}: {message}"))));
        }
    }
    Ok(())
}

async fn show(config: &Config, repos: &[String], force: bool, json: bool) -> Result<()> {
    let keys = repos.iter().map(|repo| parse_key(repo)).collect::<Result<Vec<_>>>()?;
    let sync = synchronizer(config).await?;
    join_all(keys.iter().map(|key| sync.fetch(key, force))).await;

    let mut out = std::io::stdout().lock();
    if json {
        let entries: Vec<_> = keys.iter().map(|key| (key, sync.entry(key), sync.fetch_state(key))).collect();
        let boards: Vec<_> = entries
            .iter()
            .map(|(key, entry, fetch_state)| BoardJson { repository: key, fetch_state: *fetch_state, entry })
            .collect();
        serde_json::to_writer_pretty(&mut out, &boards).or_raise(|| ErrorKind::Output)?;
        writeln!(out).or_raise(|| ErrorKind::Output)?;
    } else {
        let now = SystemClock.now();
        for (index, key) in keys.iter().enumerate() {
            if index > 0 {
                writeln!(out).or_raise(|| ErrorKind::Output)?;
            }
            output::board(&mut out, key, &sync.entry(key), now).or_raise(|| ErrorKind::Output)?;
        }
    }
    first_failure(&sync, &keys)
}

async fn refresh(config: &Config, key: &CollectionKey) -> Result<()> {
    let sync = synchronizer(config).await?;
    sync.refresh(key).await;
    let entry = sync.entry(key);
    let mut out = std::io::stdout().lock();
    output::board(&mut out, key, &entry, SystemClock.now()).or_raise(|| ErrorKind::Output)?;
    first_failure(&sync, std::slice::from_ref(key))
}

async fn invalidate(config: &Config, key: &CollectionKey) -> Result<()> {
    let store = store::open(config).await?;
    let storage_key = key.storage_key(&config.namespace);
    store.remove(&storage_key).await.or_raise(|| ErrorKind::Store)?;
    tracing::info!(key = %key, store = store.name(), "Removed snapshot");
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let store = store::open(config).await?;
    let now = SystemClock.now();
    let mut out = std::io::stdout().lock();
    for storage_key in store.list_keys().await.or_raise(|| ErrorKind::Store)? {
        let Some(key) = CollectionKey::from_storage_key(&config.namespace, &storage_key) else {
            tracing::debug!(key = %storage_key, "Skipping snapshot from another namespace");
            continue;
        };
        let snapshot = match store.read(&storage_key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(key = %storage_key, error = ?err, "Unreadable snapshot");
                continue;
            },
        };
        let age = now.saturating_sub(snapshot.timestamp);
        let freshness = Freshness::of(age, config.freshness(), config.staleness());
        output::status_line(&mut out, &key, snapshot.items.len(), age, freshness).or_raise(|| ErrorKind::Output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_key() {
        let key = parse_key("acme/widgets").unwrap();
        assert_eq!(key.to_string(), "acme/widgets");
    }

    #[rstest]
    #[case("acme")]
    #[case("acme/widgets/extra")]
    #[case("")]
    fn test_parse_key_rejects_invalid_repository(#[case] repo: &str) {
        let err = parse_key(repo).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRepository(invalid) if invalid == repo));
    }
}
