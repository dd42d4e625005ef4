use anyhow::{Context, Result};
use clap::ValueEnum;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cli::Cli;
use crate::record::Classifier;

/// Marker text counted as an error record unless `--marker` says otherwise
pub const DEFAULT_MARKER: &str = "error";
/// Records per batch handed to a worker
pub const DEFAULT_BATCH_SIZE: usize = 1000;
/// Batches buffered between the reader and the workers, per worker
pub const BATCHES_PER_WORKER: usize = 4;
/// Upper limit for `--concurrency`
pub const MAX_CONCURRENCY: usize = 1024;

/// Main configuration struct, built once and never mutated afterwards
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input: InputConfig,
    pub processing: ProcessingConfig,
    pub performance: PerformanceConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Path of the input, or `-` for stdin
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub marker: String,
    pub require: Option<Regex>,
    pub max_line_length: Option<usize>,
    /// Error threshold: more malformed records than this fails the run
    pub max_errors: Option<u64>,
    /// Stop pulling new records once this much time has passed
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub concurrency: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub emit: bool,
    pub summary_format: SummaryFormat,
    pub verbose: u8,
    pub quiet: bool,
    pub no_emoji: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input: InputConfig {
                source: crate::readers::STDIN_SOURCE.to_string(),
            },
            processing: ProcessingConfig {
                marker: DEFAULT_MARKER.to_string(),
                require: None,
                max_line_length: None,
                max_errors: None,
                deadline: None,
            },
            performance: PerformanceConfig {
                concurrency: 1,
                batch_size: DEFAULT_BATCH_SIZE,
            },
            output: OutputConfig {
                emit: false,
                summary_format: SummaryFormat::Text,
                verbose: 0,
                quiet: false,
                no_emoji: false,
            },
        }
    }
}

impl BatchConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let require = cli
            .require
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("Invalid --require pattern '{}'", pattern))
            })
            .transpose()?;

        let deadline = cli
            .deadline
            .as_deref()
            .map(|text| {
                humantime::parse_duration(text)
                    .with_context(|| format!("Invalid --deadline '{}'", text))
            })
            .transpose()?;

        if cli.batch_size == 0 {
            anyhow::bail!("--batch-size must be at least 1");
        }
        if cli.concurrency > MAX_CONCURRENCY {
            anyhow::bail!(
                "--concurrency {} is too high, the limit is {}",
                cli.concurrency,
                MAX_CONCURRENCY
            );
        }

        Ok(Self {
            input: InputConfig {
                source: cli
                    .input
                    .clone()
                    .unwrap_or_else(|| crate::readers::STDIN_SOURCE.to_string()),
            },
            processing: ProcessingConfig {
                marker: cli.marker.clone(),
                require,
                max_line_length: cli.max_line_length,
                max_errors: cli.max_errors,
                deadline,
            },
            performance: PerformanceConfig {
                concurrency: resolve_concurrency(cli.concurrency),
                batch_size: cli.batch_size,
            },
            output: OutputConfig {
                emit: cli.emit,
                summary_format: cli.summary_format,
                verbose: cli.verbose,
                quiet: cli.quiet,
                no_emoji: cli.no_emoji || std::env::var("NO_EMOJI").is_ok(),
            },
        })
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.processing.marker.clone())
            .with_require(self.processing.require.clone())
            .with_max_line_length(self.processing.max_line_length)
    }

    pub fn is_parallel(&self) -> bool {
        self.performance.concurrency > 1
    }

    /// Bound of the batch channel between the reader and the workers
    pub fn channel_bound(&self) -> usize {
        self.performance
            .concurrency
            .saturating_mul(BATCHES_PER_WORKER)
    }
}

/// `0` means one worker per CPU
pub fn resolve_concurrency(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

static NO_EMOJI: AtomicBool = AtomicBool::new(false);

/// Set once at startup from the resolved configuration
pub fn set_no_emoji(no_emoji: bool) {
    NO_EMOJI.store(no_emoji, Ordering::Relaxed);
}

fn use_emoji() -> bool {
    !NO_EMOJI.load(Ordering::Relaxed) && std::env::var("NO_EMOJI").is_err()
}

pub fn format_error_message(message: &str, emoji: bool) -> String {
    if emoji {
        format!("🔴 {}", message)
    } else {
        format!("linetally: error: {}", message)
    }
}

pub fn format_warning_message(message: &str, emoji: bool) -> String {
    if emoji {
        format!("⚠️  {}", message)
    } else {
        format!("linetally: warning: {}", message)
    }
}

pub fn format_info_message(message: &str, emoji: bool) -> String {
    if emoji {
        format!("🔹 {}", message)
    } else {
        format!("linetally: {}", message)
    }
}

pub fn format_error_message_auto(message: &str) -> String {
    format_error_message(message, use_emoji())
}

pub fn format_warning_message_auto(message: &str) -> String {
    format_warning_message(message, use_emoji())
}

pub fn format_info_message_auto(message: &str) -> String {
    format_info_message(message, use_emoji())
}
