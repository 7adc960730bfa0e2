mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use promptpad_store::FileCacheStore;
use promptpad_store::HistoryLog;
use promptpad_store::history::HistoryLogOptions;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigStore;

#[derive(Parser, Debug)]
#[command(
    name = "promptpad",
    version,
    about = "Inspect and maintain promptpad's directory caches and prompt history"
)]
struct Cli {
    /// Cache root directory. Defaults to `~/.promptpad/file-cache`.
    #[arg(long, value_name = "DIR", global = true)]
    cache_root: Option<PathBuf>,

    /// History log file. Defaults to `~/.promptpad/history.jsonl`.
    #[arg(long, value_name = "FILE", global = true)]
    history_file: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Directory file cache maintenance.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Prompt history maintenance.
    #[command(subcommand)]
    History(HistoryCommand),
    /// Read or update `config.toml`.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Aggregate counts and sizes over all cache entries.
    Stats,
    /// Show what the cache can currently serve for a directory.
    Show {
        directory: PathBuf,
        /// Validity window override in seconds.
        #[arg(long, value_name = "SECONDS")]
        ttl_seconds: Option<u64>,
    },
    /// Remove the cache entry for one directory.
    Clear { directory: PathBuf },
    /// Remove every cache entry and the global index.
    ClearAll,
    /// Remove entries not updated within the given number of days.
    Cleanup {
        #[arg(long, value_name = "DAYS", default_value = "30")]
        max_age_days: u64,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// Print the most recent prompts.
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Case-insensitive substring search over recent prompts.
    Search {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Prompt counts and sizes.
    Stats,
    /// Write the entire history as a JSON export.
    Export {
        /// Write to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Append records from a JSON export produced by `export`.
    Import {
        file: PathBuf,
        /// Keep existing history instead of replacing it.
        #[arg(long)]
        merge: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the recognized settings.
    Show,
    /// Set `[cache] ttl_seconds`.
    SetCacheTtl {
        #[arg(value_name = "SECONDS")]
        seconds: u64,
    },
    /// Set `[history] max_items`.
    SetHistoryMaxItems {
        #[arg(value_name = "ITEMS")]
        items: usize,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = ConfigStore::new_default()?;

    match cli.command {
        CliCommand::Cache(command) => {
            let cache = match cli.cache_root {
                Some(root) => FileCacheStore::new(root),
                None => FileCacheStore::with_default_root()?,
            };
            run_cache_command(&cache, &config, command)
        }
        CliCommand::History(command) => {
            let path = match cli.history_file {
                Some(path) => path,
                None => promptpad_store::paths::default_history_path()?,
            };
            let options = HistoryLogOptions {
                max_items: config
                    .history_max_items()?
                    .unwrap_or(promptpad_store::history::DEFAULT_MAX_ITEMS),
                ..HistoryLogOptions::default()
            };
            let log = HistoryLog::open(path, options).await?;
            let result = run_history_command(&log, command).await;
            log.shutdown().await?;
            result
        }
        CliCommand::Config(command) => run_config_command(&config, command),
    }
}

fn run_cache_command(
    cache: &FileCacheStore,
    config: &ConfigStore,
    command: CacheCommand,
) -> anyhow::Result<()> {
    match command {
        CacheCommand::Stats => {
            let stats = cache.stats()?;
            println!("cached directories: {}", stats.cache_count);
            println!("cached files:       {}", stats.total_file_count);
            println!("total size:         {} bytes", stats.total_size_bytes);
            if let Some(oldest) = stats.oldest {
                println!(
                    "oldest:             {} ({})",
                    oldest.directory.display(),
                    oldest.updated_at.to_rfc3339()
                );
            }
            if let Some(newest) = stats.newest {
                println!(
                    "newest:             {} ({})",
                    newest.directory.display(),
                    newest.updated_at.to_rfc3339()
                );
            }
            if let Some(last_used) = cache.last_used_directory() {
                println!("last used:          {}", last_used.display());
            }
            Ok(())
        }
        CacheCommand::Show {
            directory,
            ttl_seconds,
        } => {
            let ttl_override = match ttl_seconds {
                Some(seconds) => Some(seconds),
                None => config.cache_ttl_seconds()?,
            };
            let orchestrator = promptpad_store::CacheOrchestrator::new(cache.clone());
            let response = orchestrator.cached_response(&directory, ttl_override);
            let json = serde_json::to_string_pretty(&response).context("serialize response")?;
            println!("{json}");
            Ok(())
        }
        CacheCommand::Clear { directory } => {
            cache.clear(&directory)?;
            println!("cleared cache for {}", directory.display());
            Ok(())
        }
        CacheCommand::ClearAll => {
            cache.clear_all()?;
            println!("cleared all caches");
            Ok(())
        }
        CacheCommand::Cleanup { max_age_days } => {
            let removed = cache.cleanup_older_than(max_age_days)?;
            println!("removed {removed} cache entries older than {max_age_days} days");
            Ok(())
        }
    }
}

async fn run_history_command(log: &HistoryLog, command: HistoryCommand) -> anyhow::Result<()> {
    match command {
        HistoryCommand::Recent { limit } => {
            for item in log.recent_history(limit) {
                println!("{}  {}", item.timestamp.to_rfc3339(), item.text);
            }
            Ok(())
        }
        HistoryCommand::Search { query, limit } => {
            for item in log.search_history(&query, limit) {
                println!("{}  {}", item.timestamp.to_rfc3339(), item.text);
            }
            Ok(())
        }
        HistoryCommand::Stats => {
            let stats = log.stats();
            println!("total items:      {}", stats.total_items);
            println!("total characters: {}", stats.total_characters);
            println!("average length:   {:.1}", stats.average_length);
            if let Some(oldest) = stats.oldest_timestamp {
                println!("oldest:           {}", oldest.to_rfc3339());
            }
            if let Some(newest) = stats.newest_timestamp {
                println!("newest:           {}", newest.to_rfc3339());
            }
            Ok(())
        }
        HistoryCommand::Export { output } => {
            let export = log.export_history().await?;
            let json = serde_json::to_string_pretty(&export).context("serialize export")?;
            match output {
                Some(path) => {
                    promptpad_store::atomic_write::write_atomic_text(&path, &json)?;
                    println!("exported {} items to {}", export.items.len(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
        HistoryCommand::Import { file, merge } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let export = serde_json::from_str(&contents)
                .with_context(|| format!("parse history export {}", file.display()))?;
            let imported = log.import_history(&export, merge).await?;
            println!("imported {imported} items");
            Ok(())
        }
    }
}

fn run_config_command(config: &ConfigStore, command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("config file: {}", config.path().display());
            match config.cache_ttl_seconds()? {
                Some(seconds) => println!("cache.ttl_seconds = {seconds}"),
                None => println!("cache.ttl_seconds = (default)"),
            }
            match config.history_max_items()? {
                Some(items) => println!("history.max_items = {items}"),
                None => println!("history.max_items = (default)"),
            }
            Ok(())
        }
        ConfigCommand::SetCacheTtl { seconds } => {
            config.set_cache_ttl_seconds(seconds)?;
            println!("cache.ttl_seconds = {seconds}");
            Ok(())
        }
        ConfigCommand::SetHistoryMaxItems { items } => {
            config.set_history_max_items(items)?;
            println!("history.max_items = {items}");
            Ok(())
        }
    }
}
