// TRIBE Gatekeeper - Main Entry Point
//
// Command-line front end over the gatekeeper library:
// - Query routing (live search vs knowledge base)
// - Service quota and per-user rate limit checks
// - Expiring cache inspection and sweeps
// - Daemon mode serving metrics and sweeping the cache
//
// State lives in a JSON snapshot between invocations when one is configured.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use tribe_gatekeeper::cache::sweep_snapshot;
use tribe_gatekeeper::clock::SystemClock;
use tribe_gatekeeper::config::Config;
use tribe_gatekeeper::gate::Gatekeeper;
use tribe_gatekeeper::metrics_server::start_metrics_server;
use tribe_gatekeeper::rate_limit::ActionType;
use tribe_gatekeeper::store::MemoryStore;

/// TRIBE Gatekeeper: quotas, rate limits and caching for external APIs
#[derive(Parser, Debug)]
#[command(name = "tribe-gatekeeper")]
#[command(author = "TRIBE Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Quota, rate limit and cache gate for costly external API calls", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file (default: XDG config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a chat query and pick a route
    Classify {
        /// Query text
        text: String,

        /// Confidence of the caller's knowledge-base retrieval
        #[arg(long, default_value_t = 1.0)]
        kb_confidence: f64,

        /// Number of knowledge-base results the caller found
        #[arg(long, default_value_t = 2)]
        kb_results: usize,
    },
    /// Check whether a user may perform an action
    Authorize {
        user: String,
        action: ActionType,

        /// Shared service the action spends quota on
        #[arg(long)]
        service: Option<String>,
    },
    /// Record a successful action
    Record {
        user: String,
        action: ActionType,

        /// Shared service the call was made to
        #[arg(long, requires = "endpoint")]
        service: Option<String>,

        /// Endpoint of the service that was called
        #[arg(long, requires = "service")]
        endpoint: Option<String>,
    },
    /// Monthly service quotas
    Quota {
        #[command(subcommand)]
        command: QuotaCommand,
    },
    /// Per-user rate limits
    RateLimit {
        #[command(subcommand)]
        command: RateLimitCommand,
    },
    /// Expiring cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Usage report for a user
    Report { user: String },
    /// Serve metrics and sweep the cache periodically
    Serve,
}

#[derive(Subcommand, Debug)]
enum QuotaCommand {
    /// Show this month's usage for a service
    Check { service: String },
    /// Record one call to a service
    Increment { service: String, endpoint: String },
}

#[derive(Subcommand, Debug)]
enum RateLimitCommand {
    /// Show a user's usage for an action
    Check { user: String, action: ActionType },
    /// Record one call
    Increment { user: String, action: ActionType },
    /// Clear a user's counters for one action, or all of them
    Reset {
        user: String,
        action: Option<ActionType>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Read a cached value
    Get { key: String },
    /// Store a JSON value
    Set {
        key: String,

        /// JSON document to cache
        json: String,

        /// Time-to-live in seconds
        #[arg(long)]
        ttl_secs: u64,
    },
    /// Delete expired entries
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load_from_path(&config_path)?;
    init_tracing(&config, args.verbose)?;
    debug!(
        path = %config_path.display(),
        exists = config_path.exists(),
        "Configuration loaded"
    );

    let store = match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_from_path(path)
            .await
            .with_context(|| format!("Failed to load state from {}", path))?,
        None => MemoryStore::new(),
    };
    let gate = Gatekeeper::new(store.clone(), Arc::new(SystemClock), &config);

    match args.command {
        Commands::Classify {
            text,
            kb_confidence,
            kb_results,
        } => print_json(&gate.route_query(&text, kb_confidence, kb_results))?,
        Commands::Authorize {
            user,
            action,
            service,
        } => print_json(&gate.authorize(&user, action, service.as_deref()).await?)?,
        Commands::Record {
            user,
            action,
            service,
            endpoint,
        } => {
            let call = service.as_deref().zip(endpoint.as_deref());
            gate.record_success(&user, action, call).await?;
            print_json(&gate.rate_limiter().check(&user, action).await?)?;
        }
        Commands::Quota { command } => match command {
            QuotaCommand::Check { service } => print_json(&gate.quota().check(&service).await?)?,
            QuotaCommand::Increment { service, endpoint } => {
                print_json(&gate.quota().increment(&service, &endpoint).await?)?
            }
        },
        Commands::RateLimit { command } => match command {
            RateLimitCommand::Check { user, action } => {
                print_json(&gate.rate_limiter().check(&user, action).await?)?
            }
            RateLimitCommand::Increment { user, action } => {
                print_json(&gate.rate_limiter().increment(&user, action).await?)?
            }
            RateLimitCommand::Reset { user, action } => {
                let removed = gate.rate_limiter().reset_for_user(&user, action).await?;
                print_json(&serde_json::json!({ "user_id": user, "removed": removed }))?
            }
        },
        Commands::Cache { command } => match command {
            CacheCommand::Get { key } => print_json(&gate.cache().get(&key).await?)?,
            CacheCommand::Set {
                key,
                json,
                ttl_secs,
            } => {
                let data: serde_json::Value =
                    serde_json::from_str(&json).context("Cache value must be valid JSON")?;
                gate.cache()
                    .set(&key, data, Duration::from_secs(ttl_secs))
                    .await?;
                print_json(&gate.cache().get(&key).await?)?
            }
            CacheCommand::Sweep => {
                let deleted = gate.cache().sweep_expired().await?;
                print_json(&serde_json::json!({ "deleted": deleted }))?
            }
        },
        Commands::Report { user } => print_json(&gate.usage_report(&user).await?)?,
        Commands::Serve => return serve(&gate, &config).await,
    }

    persist(&store, &config).await
}

/// Initialize tracing from the logging config; `--verbose` forces debug
fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // Logs go to stderr so stdout stays machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", text);
    Ok(())
}

/// Write the store back to its snapshot, if one is configured
async fn persist(store: &MemoryStore, config: &Config) -> Result<()> {
    if let Some(path) = &config.store.snapshot_path {
        store
            .save_to_path(path)
            .await
            .with_context(|| format!("Failed to save state to {}", path))?;
    }
    Ok(())
}

/// Run until Ctrl-C: metrics endpoint plus a periodic cache sweep
///
/// With a snapshot configured, each sweep works on a freshly loaded copy of
/// the file so counters saved by other invocations are never overwritten.
async fn serve(gate: &Gatekeeper<MemoryStore>, config: &Config) -> Result<()> {
    info!("TRIBE Gatekeeper v0.1.0 starting daemon...");

    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let mut interval = tokio::time::interval(config.cache.sweep_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let swept = match &config.store.snapshot_path {
                    Some(path) => {
                        sweep_snapshot(Path::new(path), Arc::new(SystemClock), config.cache.clone())
                            .await
                    }
                    None => gate.cache().sweep_expired().await,
                };
                if let Err(e) = swept {
                    warn!("Cache sweep failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
