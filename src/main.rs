//! Driftnet main entry point
//!
//! This is the command-line interface for the Driftnet crawl engine.

use clap::Parser;
use driftnet::config::{load_config_with_hash, validate_engine_config, Config};
use driftnet::crawler::crawl;
use driftnet::RunExit;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Driftnet: a patient identifier-space crawler
///
/// Driftnet walks a range of numeric identifiers (or a list of URLs),
/// extracts a record from every page and forwards it to a message sink.
/// Transient failures are retried from escalating tiers.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version = "1.0.0")]
#[command(about = "A patient identifier-space crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Crawl these URLs instead of walking identifiers
    #[arg(long, value_name = "URL", num_args = 1..)]
    targets: Vec<String>,

    /// Override the starting identifier
    #[arg(long, value_name = "ID", allow_negative_numbers = true)]
    start: Option<i64>,

    /// Override the ending identifier
    #[arg(long, value_name = "ID", allow_negative_numbers = true)]
    end: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies command-line overrides and re-validates the engine settings
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(start) = cli.start {
        config.engine.starting_id = start;
    }
    if let Some(end) = cli.end {
        config.engine.ending_id = Some(end);
    }
    if !cli.targets.is_empty() {
        config.engine.targets = cli.targets.clone();
    }

    validate_engine_config(&config.engine)?;
    Ok(())
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Driftnet Dry Run ===\n");

    let engine = &config.engine;
    println!("Engine:");
    println!("  Extractor: {}", config.extract.name);
    println!("  Starting id: {}", engine.starting_id);
    println!("  Step: {:+}", engine.step);
    match engine.ending_id {
        Some(end) => println!("  Ending id: {}", end),
        None => println!("  Ending id: none"),
    }
    println!("  Skip max: {}", engine.skip_max);
    println!("  Retry tiers: {}", engine.tiers);
    println!("  Check every: {}s", engine.check_every);
    println!("  Timeout: {}s", engine.timeout);
    println!("  Idle time: {}s", engine.idle_time);
    println!("  Calm: {}", engine.calm_mode());

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nExtraction ({} fields):", config.extract.fields.len());
    if let Some(template) = &config.extract.url_template {
        println!("  URL template: {}", template);
    }
    for (name, field) in &config.extract.fields {
        let required = if config.extract.required.contains(name) {
            " (required)"
        } else {
            ""
        };
        println!("  - {}: {}{}", name, field.selector, required);
    }

    println!("\nSink:");
    match &config.sink {
        Some(sink) => println!("  {} on {}", sink.subject, sink.url),
        None => println!("  local log"),
    }

    println!("\n✓ Configuration is valid");
    if engine.targets.is_empty() {
        println!("✓ Would start crawling at id {}", engine.starting_id);
    } else {
        println!("✓ Would crawl {} explicit targets", engine.targets.len());
        for target in &engine.targets {
            println!("    * {}", target);
        }
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current target");
            on_signal.cancel();
        }
    });

    // Run the crawler
    match crawl(config, cancel).await {
        Ok(summary) => match summary.exit {
            RunExit::Fatal(fatal) => {
                tracing::error!("Crawl stopped on a fatal failure: {}", fatal);
                Err(fatal.into())
            }
            _ => {
                tracing::info!(
                    "Crawl finished: {} attempts, {} published, {} pending",
                    summary.attempts,
                    summary.published,
                    summary.pending
                );
                Ok(())
            }
        },
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
