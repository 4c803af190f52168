//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Pipeline flags are optional so that values
//! from `.fanin.toml` survive unless overridden.

use crate::models::{NumericKind, TransformKind};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// fanin - fan-out/fan-in sum of squares
///
/// Starts N producers that each emit f(0), f(1), ..., f(n-1) on their own
/// channel, drains every channel concurrently into one accumulator that
/// adds the square of each value, and prints the final total.
///
/// Examples:
///   fanin
///   fanin --producers 8 --length 100 --transform identity
///   fanin --kind f64 --length 3 --verify
///   fanin --stagger-ms 5 --timeout 10 --output run.json --format json
///   fanin --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Number of producers (default: from config or 5)
    #[arg(short, long, value_name = "N", env = "FANIN_PRODUCERS")]
    pub producers: Option<usize>,

    /// Sequence bound per producer: each emits f(i) for i in [0, n)
    #[arg(short, long, value_name = "n", env = "FANIN_LENGTH")]
    pub length: Option<u32>,

    /// Capacity of each producer channel (default: the sequence length)
    #[arg(long, value_name = "SLOTS")]
    pub capacity: Option<usize>,

    /// Transform applied to every index
    #[arg(long, value_name = "FN")]
    pub transform: Option<TransformKind>,

    /// Numeric type of the values
    #[arg(long, value_name = "TYPE")]
    pub kind: Option<NumericKind>,

    /// Delay step in milliseconds: producer i sleeps i * step per item
    #[arg(long, value_name = "MS")]
    pub stagger_ms: Option<u64>,

    /// Deadline for the whole run in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Compare the total against a sequential computation
    ///
    /// Exit code 2 when they differ.
    #[arg(long)]
    pub verify: bool,

    /// Write a run report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fanin.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .fanin.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the run report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.capacity == Some(0) {
            return Err("Capacity must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref output) = self.output {
            if output.is_dir() {
                return Err(format!("Output path is a directory: {}", output.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
