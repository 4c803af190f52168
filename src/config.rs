//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fanin.toml` files.

use crate::cli::ReportFormat;
use crate::models::{NumericKind, TransformKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".fanin.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Pipeline shape.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Format of the run report.
    #[serde(default)]
    pub format: ReportFormat,
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of producers.
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Per-producer sequence bound.
    #[serde(default = "default_length")]
    pub length: u32,

    /// Source channel capacity. Defaults to the sequence length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Transform applied by every producer.
    #[serde(default)]
    pub transform: TransformKind,

    /// Numeric type of the values.
    #[serde(default)]
    pub kind: NumericKind,

    /// Producer `i` sleeps `i * stagger_ms` milliseconds per item.
    #[serde(default)]
    pub stagger_ms: u64,

    /// Deadline for the whole run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            length: default_length(),
            capacity: None,
            transform: TransformKind::default(),
            kind: NumericKind::default(),
            stagger_ms: 0,
            timeout_seconds: None,
        }
    }
}

fn default_producers() -> usize {
    5
}

fn default_length() -> u32 {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.fanin.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        let pipeline = &mut self.pipeline;

        if let Some(producers) = args.producers {
            pipeline.producers = producers;
        }
        if let Some(length) = args.length {
            pipeline.length = length;
        }
        if args.capacity.is_some() {
            pipeline.capacity = args.capacity;
        }
        if let Some(transform) = args.transform {
            pipeline.transform = transform;
        }
        if let Some(kind) = args.kind {
            pipeline.kind = kind;
        }
        if let Some(stagger) = args.stagger_ms {
            pipeline.stagger_ms = stagger;
        }
        if args.timeout.is_some() {
            pipeline.timeout_seconds = args.timeout;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
