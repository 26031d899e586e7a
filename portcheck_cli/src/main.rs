use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use portcheck_core::{CatalogItem, Dispatcher, LookupKind, Request, Response};
use std::io::Read;
use std::time::Duration;
use portcheck_cli::bootstrap::build_dispatcher;
use portcheck_cli::config::ConfigManager;
use portcheck_cli::output;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portcheck")]
#[command(author, version, about = "Cross-platform availability and review score resolver", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one catalog item
    Resolve {
        /// Store item ID
        item_id: String,

        /// Display name used for fuzzy matching
        name: String,

        /// What to resolve
        #[arg(short, long, value_enum, default_value = "availability")]
        kind: KindArg,

        /// Bypass any cached entry and requery the sources
        #[arg(long)]
        refresh: bool,
    },

    /// Resolve a batch of items from a JSON file
    Batch {
        /// JSON file: an array of {"item_id": "...", "display_name": "..."}
        path: PathBuf,

        /// What to resolve
        #[arg(short, long, value_enum, default_value = "availability")]
        kind: KindArg,
    },

    /// Execute one raw JSON request from stdin through the dispatch layer
    Request {
        /// Answer deadline in milliseconds; the underlying resolution
        /// keeps running past it
        #[arg(long, default_value_t = 30_000)]
        deadline_ms: u64,
    },

    /// Inspect or clear the lookup cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show entry count and age per lookup kind
    Stats {
        #[arg(short, long, value_enum, default_value = "availability")]
        kind: KindArg,
    },

    /// Remove all cached entries of one kind
    Clear {
        #[arg(short, long, value_enum, default_value = "availability")]
        kind: KindArg,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., resolver.ttl_days)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., resolver.ttl_days)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Availability,
    Review,
}

impl From<KindArg> for LookupKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Availability => LookupKind::Availability,
            KindArg::Review => LookupKind::ReviewScore,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("portcheck_core", log::LevelFilter::Debug)
            .filter_module("portcheck_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Resolve {
            item_id,
            name,
            kind,
            refresh,
        } => {
            let item = CatalogItem {
                item_id,
                display_name: name,
            };
            let request = if refresh {
                Request::ForceRefresh {
                    item,
                    kind: kind.into(),
                }
            } else {
                Request::Resolve {
                    item,
                    kind: kind.into(),
                }
            };
            run_request(request, cli.json, None).await?;
        }
        Commands::Request { deadline_ms } => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read request from stdin")?;
            let request = Dispatcher::parse(&raw)?;
            run_request(request, cli.json, Some(Duration::from_millis(deadline_ms))).await?;
        }
        Commands::Batch { path, kind } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read batch file {}", path.display()))?;
            let items: Vec<CatalogItem> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid batch file {}", path.display()))?;
            run_request(
                Request::BatchResolve {
                    items,
                    kind: kind.into(),
                },
                cli.json,
                None,
            )
            .await?;
        }
        Commands::Cache { command } => match command {
            CacheCommand::Stats { kind } => {
                run_request(Request::CacheStats { kind: kind.into() }, cli.json, None).await?;
            }
            CacheCommand::Clear { kind } => {
                run_request(Request::ClearCache { kind: kind.into() }, cli.json, None).await?;
            }
        },
        Commands::Config { command } => {
            config_command(command)?;
        }
    }

    Ok(())
}

async fn run_request(request: Request, json: bool, deadline: Option<Duration>) -> Result<()> {
    let manager = ConfigManager::new();
    let config = manager.load()?;
    let dispatcher = build_dispatcher(&config, &manager.overrides_path()).await?;

    let response = match deadline {
        Some(deadline) => dispatcher.dispatch_with_deadline(request, deadline).await?,
        None => dispatcher.dispatch(request).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response {
        Response::Resolved(resolution) => println!("{}", output::render_resolution(&resolution)),
        Response::Batch(results) => println!("{}", output::render_batch(&results)),
        Response::Stats(stats) => println!("{}", output::render_stats(&stats)),
        Response::Cleared { removed } => {
            println!("{} {removed} entries removed", "Cache cleared:".bold())
        }
    }

    Ok(())
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();
    match command {
        ConfigCommand::Get { key } => {
            println!("{}", manager.get(&key)?);
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value)?;
            println!("{} {key} = {value}", "Set".green());
        }
        ConfigCommand::List => {
            for (key, value) in manager.list()? {
                println!("{key} = {value}");
            }
        }
    }
    Ok(())
}
