use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usage_tracker::api::state::AppState;
use usage_tracker::api::{build_router, PeriodSelector};
use usage_tracker::config::AppConfig;
use usage_tracker::fetch::{HttpSource, LocalSource, SnapshotSource};
use usage_tracker::ingest::{Ingestor, PeriodPlan};
use usage_tracker::models::UsageSummary;
use usage_tracker::query::QueryService;
use usage_tracker::resolve::NameResolver;
use usage_tracker::storage::SnapshotStore;

#[derive(Parser)]
#[command(name = "usage-tracker")]
#[command(about = "Competitive usage-stats tracker: ingest monthly snapshots and query them")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch snapshots and load them into the store
    Ingest {
        /// Single period (YYYY-MM)
        #[arg(long, conflicts_with_all = ["from", "to", "auto"])]
        period: Option<String>,

        /// First period of a range
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Last period of a range
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Ingest every period not yet stored
        #[arg(long, conflicts_with_all = ["from", "to"])]
        auto: bool,

        /// Start of the auto range (default 2025-01)
        #[arg(long, requires = "auto")]
        start: Option<String>,

        /// End of the auto range (default: last full month)
        #[arg(long, requires = "auto")]
        end: Option<String>,

        /// Re-ingest periods that are already stored
        #[arg(long, requires = "auto")]
        force: bool,

        /// Save raw documents without loading them
        #[arg(long)]
        download_only: bool,

        /// Read previously downloaded raw documents instead of fetching
        #[arg(long)]
        offline: bool,

        /// Publish the read-only copy after loading
        #[arg(long)]
        sync_read_copy: bool,

        /// Destination of the read-only copy
        #[arg(long, requires = "sync_read_copy")]
        read_copy_path: Option<PathBuf>,
    },

    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Serve the live table even when a read copy exists
        #[arg(long)]
        live: bool,
    },

    /// List stored periods
    Periods,

    /// List names, optionally for one period
    Names {
        #[arg(long)]
        period: Option<String>,
    },

    /// Top entities by usage for a period, or across all periods
    Top {
        /// Period (YYYY-MM) or "all"
        #[arg(long)]
        period: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Profile of one entity, with fallback to close names and other periods
    Profile {
        name: String,

        /// Period (YYYY-MM) or "all"
        #[arg(long)]
        period: Option<String>,
    },

    /// Ranked name candidates for a free-text query
    Candidates {
        query: String,

        #[arg(long)]
        period: Option<String>,
    },

    /// Most common top item or tera type across records
    Meta {
        /// "items" or "tera-types"
        dimension: String,

        #[arg(long)]
        period: Option<String>,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Publish the read-only copy of the store
    Publish {
        /// Destination path (default: <data_dir>/store/usage_read.parquet)
        #[arg(long)]
        dst: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Loading config from {}", cli.config.display()))?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting usage-tracker v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Ingest {
            period,
            from,
            to,
            auto,
            start,
            end,
            force,
            download_only,
            offline,
            sync_read_copy,
            read_copy_path,
        } => {
            let plan = match (period, from, to, auto) {
                (Some(period), _, _, _) => PeriodPlan::Single(period),
                (None, Some(from), Some(to), _) => PeriodPlan::Range { from, to },
                (None, _, _, true) => PeriodPlan::Auto { start, end, force },
                _ => bail!("Specify --period, --from/--to, or --auto"),
            };

            let storage = config.storage();
            let store = SnapshotStore::from_config(&storage);
            let read_copy = sync_read_copy
                .then(|| read_copy_path.unwrap_or_else(|| storage.read_copy_path()));

            let source: Arc<dyn SnapshotSource> = if offline {
                Arc::new(LocalSource::new(storage.raw_dir()))
            } else {
                Arc::new(HttpSource::new(
                    config.source.fetcher_config(storage.raw_dir()),
                )?)
            };

            let ingestor = Ingestor::new(source, store)
                .download_only(download_only)
                .read_copy(read_copy);
            let report = ingestor
                .run_plan(&plan, Local::now().date_naive())
                .await?;

            if report.outcomes.is_empty() {
                println!("Nothing to do");
            } else {
                for outcome in &report.outcomes {
                    println!("{}", outcome);
                }
                println!("Done. ok={} fail={}", report.ok(), report.failed());
            }
            if let Some(dst) = &report.read_copy {
                println!("Read copy published: {}", dst.display());
            }
        }
        Commands::Serve { host, port, live } => {
            let storage = config.storage();
            let read_copy = storage.read_copy_path();
            let store = if !live && read_copy.exists() {
                tracing::info!("Serving read copy {}", read_copy.display());
                SnapshotStore::new(read_copy)
            } else {
                SnapshotStore::from_config(&storage)
            };

            let queries = QueryService::new(store, NameResolver::new(config.resolver_options()));
            let mut state = AppState::new(Arc::new(queries));
            state.cors_origin = config.server.cors_origin.clone();

            let app = build_router(state);
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Periods => {
            let queries = query_service(&config);
            for period in queries.list_periods()? {
                println!("{}", period);
            }
        }
        Commands::Names { period } => {
            let selector = period_selector(period.as_deref())?;
            let queries = query_service(&config);
            for name in queries.list_names(selector.as_period())? {
                println!("{}", name);
            }
        }
        Commands::Top { period, limit } => {
            let selector = period_selector(period.as_deref())?;
            let queries = query_service(&config);
            match selector {
                PeriodSelector::AllTime => print_json(&queries.top_n_all_time(limit)?)?,
                PeriodSelector::Period(period) => {
                    let rows: Vec<UsageSummary> = queries
                        .top_n(&period, limit)?
                        .iter()
                        .map(UsageSummary::from)
                        .collect();
                    print_json(&rows)?;
                }
            }
        }
        Commands::Profile { name, period } => {
            let selector = period_selector(period.as_deref())?;
            let queries = query_service(&config);
            match selector {
                PeriodSelector::AllTime => match queries.resolve_profile_all_time(&name)? {
                    Some(resolved) => {
                        if resolved.substituted {
                            println!("No all-time data for {}; showing closest match", resolved.requested_name);
                        }
                        print_json(&resolved.profile)?;
                    }
                    None => println!("No profile found for {}", name),
                },
                PeriodSelector::Period(period) => match queries.resolve_profile(&name, &period)? {
                    Some(resolved) => {
                        if resolved.substituted {
                            println!(
                                "Showing {} ({}) instead of {} ({})",
                                resolved.name,
                                resolved.period,
                                resolved.requested_name,
                                resolved.requested_period
                            );
                        }
                        print_json(&UsageSummary::from(&resolved.record))?;
                    }
                    None => println!("No profile found for {} in {}", name, period),
                },
            }
        }
        Commands::Candidates { query, period } => {
            let selector = period_selector(period.as_deref())?;
            let queries = query_service(&config);
            let candidates = queries.candidates(&query, selector.as_period())?;
            if candidates.is_empty() {
                println!("No candidates for {:?}", query);
            }
            for candidate in candidates {
                println!("{:<24} {:.3} {:?}", candidate.name, candidate.score, candidate.kind);
            }
        }
        Commands::Meta {
            dimension,
            period,
            limit,
        } => {
            let dimension = dimension
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let selector = period_selector(period.as_deref())?;
            let queries = query_service(&config);
            for row in queries.top_value_counts(dimension, selector.as_period(), limit)? {
                println!("{:<24} {}", row.label, row.count);
            }
        }
        Commands::Publish { dst } => {
            let storage = config.storage();
            let store = SnapshotStore::from_config(&storage);
            let dst = dst.unwrap_or_else(|| storage.read_copy_path());
            publish(&store, &dst)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn query_service(config: &AppConfig) -> QueryService {
    let store = SnapshotStore::from_config(&config.storage());
    QueryService::new(store, NameResolver::new(config.resolver_options()))
}

fn period_selector(period: Option<&str>) -> Result<PeriodSelector> {
    PeriodSelector::parse(period).map_err(|e| anyhow::anyhow!("{}", e))
}

fn publish(store: &SnapshotStore, dst: &Path) -> Result<()> {
    store
        .publish_read_copy(dst)
        .with_context(|| format!("Publishing read copy to {}", dst.display()))?;
    println!("Read copy published: {}", dst.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
