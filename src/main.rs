//! Quarry main entry point
//!
//! Command-line interface for the repository dataset miner.

use clap::Parser;
use quarry::config::{load_config_with_hash, Config};
use quarry::crawler::run_search;
use quarry::features::run_compute;
use quarry::TargetSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Quarry: a rate-limited, checkpointed repository dataset miner
///
/// Quarry crawls a repository platform for candidate repositories,
/// classifies them as maintained, unmaintained, or not suitable, and
/// computes per-repository feature tables from the classified sets.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version = "1.0.0")]
#[command(about = "A repository dataset miner", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run the crawl phase (default when no mode is given)
    #[arg(long, conflicts_with_all = ["compute", "dry_run"])]
    search: bool,

    /// Run the feature-computation phase over the given classified set
    #[arg(long, value_name = "SET", conflicts_with_all = ["search", "dry_run"])]
    compute: Option<TargetSet>,

    /// Validate config and show what would run without any remote call
    #[arg(long, conflicts_with_all = ["search", "compute"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The run-log path comes from the config, so the config is loaded
    // before the subscriber goes up; load errors surface on stderr.
    let (config, config_hash) = load_config_with_hash(&cli.config).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    setup_logging(cli.verbose, cli.quiet, Path::new(&config.checkpoint.run_log))?;
    tracing::info!(
        "Loaded configuration from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if let Some(source) = cli.compute {
        handle_compute(&config, source).await?;
    } else {
        handle_search(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Events go to the console and, without ANSI escapes, to the run-log file.
/// The file rides along on every checkpoint flush, so a crawl can be
/// audited from the blob store alone.
fn setup_logging(verbose: u8, quiet: bool, log_path: &Path) -> std::io::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quarry=info,warn"),
            1 => EnvFilter::new("quarry=debug,info"),
            2 => EnvFilter::new("quarry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Quarry Dry Run ===\n");

    println!("Search:");
    println!(
        "  Creation years: {}..={}",
        config.search.from_year, config.search.to_year
    );
    println!("  Query template: {}", config.search.query);
    println!(
        "  Target: {} entries in the {} set",
        config.search.target_count, config.search.target_set
    );
    println!("  Sample size: {}", config.search.sample_size);

    println!("\nCompute:");
    println!("  Features ({}):", config.compute.features.len());
    for name in &config.compute.features {
        println!("    - {}", name);
    }
    println!("  Maintained table: {}", config.compute.maintained_csv);
    println!("  Unmaintained table: {}", config.compute.unmaintained_csv);

    println!("\nCheckpoints:");
    println!("  Unmaintained ids: {}", config.checkpoint.unmaintained_ids);
    println!("  Maintained ids: {}", config.checkpoint.maintained_ids);
    println!("  Not-suitable ids: {}", config.checkpoint.not_suitable_ids);
    println!("  Seen names: {}", config.checkpoint.seen_names);
    println!("  Run log: {}", config.checkpoint.run_log);
    println!("  Flush interval: {}", config.checkpoint.flush_interval);

    if config.blob.enabled {
        println!("\nBlob store:");
        println!("  Region: {}", config.blob.region);
        println!("  Bucket: {}", config.blob.bucket);
        println!("  Prefix: {}", config.blob.prefix);
        if let Some(endpoint) = &config.blob.endpoint {
            println!("  Endpoint: {}", endpoint);
        }
    } else {
        println!("\nBlob store: disabled (local checkpoints only)");
    }

    println!("\nProvider:");
    println!("  API base: {}", config.provider.api_base);
    println!("  Identities: {}", config.provider.tokens.len());
    println!("  Max quota wait: {} minutes", config.provider.max_wait_minutes);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the crawl phase
async fn handle_search(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting crawl toward {} entries in the {} set",
        config.search.target_count,
        config.search.target_set
    );

    match run_search(config).await {
        Ok(()) => {
            tracing::info!("Crawl finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the feature-computation phase
async fn handle_compute(
    config: &Config,
    source: TargetSet,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Computing features over the {} set", source);

    match run_compute(config, source).await {
        Ok(()) => {
            tracing::info!("Feature computation finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Feature computation failed: {}", e);
            Err(e.into())
        }
    }
}
