//! fanin - fan-out/fan-in sum-of-squares pipeline
//!
//! Spawns N producers, drains their channels concurrently into a single
//! accumulator, and prints the aggregated total once every producer is done.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, overflow, timeout, interrupt, etc.)
//!   2 - `--verify` found the total differs from the sequential reference

mod cli;
mod config;
mod models;
mod numeric;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{NumericKind, RunMetadata, RunReport, Verification};
use numeric::Numeric;
use pipeline::{expected_total, Coordinator, StdoutEmitter};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Where the effective configuration came from.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Defaults,
    /// The default file exists but could not be used.
    DefaultFileInvalid(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config can turn on verbose logging, so it is read before logging starts
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("fanin v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match origin {
        ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
        ConfigOrigin::DefaultFile => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
        ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
        ConfigOrigin::DefaultFileInvalid(e) => warn!("Failed to load config: {}", e),
    }

    // Run the pipeline
    match run(&args, &config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .fanin.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    eprintln!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    eprintln!("   Edit it to change producers, length, transform and numeric type.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout carries only the rendered totals.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((
            Config::default(),
            ConfigOrigin::DefaultFileInvalid(format!("{:#}", e)),
        )),
    }
}

/// Dispatch on the configured numeric type. Returns the exit code.
async fn run(args: &Args, config: &Config) -> Result<i32> {
    match config.pipeline.kind {
        NumericKind::I32 => run_typed::<i32>(args, config).await,
        NumericKind::I64 => run_typed::<i64>(args, config).await,
        NumericKind::U64 => run_typed::<u64>(args, config).await,
        NumericKind::F32 => run_typed::<f32>(args, config).await,
        NumericKind::F64 => run_typed::<f64>(args, config).await,
    }
}

/// Run the pipeline over `N`, render the total, and write the report.
async fn run_typed<N: Numeric>(args: &Args, config: &Config) -> Result<i32> {
    let settings = &config.pipeline;

    let bound = N::from_count(settings.length).with_context(|| {
        format!(
            "Length {} is not representable as {}",
            settings.length, settings.kind
        )
    })?;
    let transform = settings.transform.function::<N>();

    let mut coordinator = Coordinator::new(settings.producers, bound, transform)
        .stagger(Duration::from_millis(settings.stagger_ms));
    if let Some(capacity) = settings.capacity {
        coordinator = coordinator.capacity(capacity);
    }
    if let Some(timeout) = settings.timeout_seconds {
        coordinator = coordinator.deadline(Duration::from_secs(timeout));
    }
    let capacity = coordinator.effective_capacity();

    info!(
        "Pipeline: {} producers x {} values, transform {}, type {}",
        settings.producers, settings.length, settings.transform, settings.kind
    );

    // Ctrl-C cancels every pipeline task
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling pipeline");
                cancel.cancel();
            }
        })
    };

    let started_at = Utc::now();
    let start_time = Instant::now();
    let outcome = coordinator
        .cancel_token(cancel)
        .run(StdoutEmitter)
        .await;
    interrupt.abort();

    let outcome = outcome.context("Pipeline did not complete")?;
    let duration = start_time.elapsed().as_secs_f64();
    info!(
        "Pipeline finished in {:.3}s: total = {}",
        duration, outcome.total
    );

    let (expected, verification) = if args.verify {
        let expected = expected_total(settings.producers, bound, transform);
        let verification = match expected {
            Some(expected) if outcome.total.approx_eq(expected) => Verification::Matched,
            _ => Verification::Mismatched,
        };
        debug!("Sequential reference: {:?}", expected);
        (expected, verification)
    } else {
        (None, Verification::Skipped)
    };

    let report = RunReport {
        metadata: RunMetadata {
            started_at,
            kind: settings.kind,
            transform: settings.transform,
            producers: settings.producers,
            length: settings.length,
            capacity,
            duration_seconds: duration,
        },
        total: outcome.total,
        expected,
        verification,
        emitted: outcome.emitted,
        sources: outcome.sources,
        producers: outcome.producers,
    };

    if !report.all_producers_completed() {
        warn!("Some producers stopped before finishing their sequence");
    }

    if let Some(ref path) = args.output {
        report::write_report(&report, config.general.format, path)?;
        info!("Report saved to: {}", path.display());
    }

    if verification == Verification::Mismatched {
        eprintln!(
            "\n⛔ Total {} does not match the sequential reference {:?}. Failing (exit code 2).",
            report.total, report.expected
        );
        return Ok(2);
    }

    Ok(0)
}
