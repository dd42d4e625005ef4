// Command-line interface definitions

use clap::{ArgAction, Parser};

use crate::config::SummaryFormat;

#[derive(Parser, Debug, Clone)]
#[command(name = "linetally")]
#[command(about = "Classify and count the lines of a text source, optionally in parallel")]
#[command(
    long_about = "Classify and count the lines of a text source, optionally in parallel\n\nEvery line is checked against the optional format rules, compared with the\nerror marker and counted. The summary is printed once the input is exhausted.\n\nMODES:\n  --concurrency 1   Sequential processing on the main thread (default)\n  --concurrency N   N workers fed by a single reader\n  --concurrency 0   One worker per CPU"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input file, '-' for stdin (gzip and zstd are detected automatically)
    #[arg(short = 'i', long = "input", help_heading = "Input Options")]
    pub input: Option<String>,

    /// Lines equal to this text are counted as error markers
    #[arg(
        long = "marker",
        default_value = crate::config::DEFAULT_MARKER,
        help_heading = "Processing Options"
    )]
    pub marker: String,

    /// Lines not matching this regex are counted as malformed
    #[arg(long = "require", help_heading = "Processing Options")]
    pub require: Option<String>,

    /// Lines longer than this many bytes are counted as malformed
    #[arg(long = "max-line-length", help_heading = "Processing Options")]
    pub max_line_length: Option<usize>,

    /// Fail the run when more than this many lines are malformed
    #[arg(long = "max-errors", help_heading = "Processing Options")]
    pub max_errors: Option<u64>,

    /// Stop reading new lines after this long (e.g. 30s, 5m)
    #[arg(long = "deadline", help_heading = "Processing Options")]
    pub deadline: Option<String>,

    /// Number of workers (0 = one per CPU)
    #[arg(
        short = 'j',
        long = "concurrency",
        visible_alias = "threads",
        default_value_t = 1,
        help_heading = "Performance Options"
    )]
    pub concurrency: usize,

    /// Lines per batch handed to a worker
    #[arg(
        long = "batch-size",
        default_value_t = crate::config::DEFAULT_BATCH_SIZE,
        help_heading = "Performance Options"
    )]
    pub batch_size: usize,

    /// Print one line per processed record to stdout
    #[arg(long = "emit", help_heading = "Output Options")]
    pub emit: bool,

    /// Summary output format
    #[arg(
        long = "summary-format",
        value_enum,
        default_value = "text",
        help_heading = "Output Options"
    )]
    pub summary_format: SummaryFormat,

    /// Report malformed lines (-v) and worker timings (-vv) on stderr
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, help_heading = "Display Options")]
    pub verbose: u8,

    /// Suppress diagnostics on stderr
    #[arg(short = 'q', long = "quiet", help_heading = "Display Options")]
    pub quiet: bool,

    /// Plain text prefixes instead of emoji in diagnostics
    #[arg(long = "no-emoji", help_heading = "Display Options")]
    pub no_emoji: bool,

    /// Read defaults from this config file instead of searching for one
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore all config files
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show config file locations and active defaults, then exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}
