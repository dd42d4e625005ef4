use anyhow::Result;
use clap::Parser;
use std::io::Write;

use linetally::cli::Cli;
use linetally::config::{
    format_error_message_auto, format_warning_message_auto, set_no_emoji, BatchConfig,
    SummaryFormat,
};
use linetally::config_file::ConfigFile;
use linetally::platform::{ExitCode, SafeStdout, SignalHandler};
use linetally::progress::Progress;
use linetally::{BatchError, BatchProcessor, Outcome, Summary};

/// Flags that have to be known before the config file is read
#[derive(Debug, Default, PartialEq, Eq)]
struct ConfigFlags {
    config_file: Option<String>,
    ignore_config: bool,
}

fn extract_config_flags(raw_args: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut iter = raw_args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--ignore-config" {
            flags.ignore_config = true;
        } else if arg == "--config-file" {
            flags.config_file = iter.next().cloned();
        } else if let Some(path) = arg.strip_prefix("--config-file=") {
            flags.config_file = Some(path.to_string());
        }
    }
    flags
}

/// Apply config file defaults to the raw command line
fn process_args(raw_args: Vec<String>) -> Result<Vec<String>> {
    let flags = extract_config_flags(&raw_args);
    if flags.ignore_config {
        return Ok(raw_args);
    }
    let config_file = ConfigFile::load_with_custom_path(flags.config_file.as_deref())?;
    config_file.process_args(raw_args)
}

fn print_summary(view: SummaryView<'_>, config: &BatchConfig) -> Result<()> {
    let text = match config.output.summary_format {
        SummaryFormat::Text => view.text(),
        SummaryFormat::Json => serde_json::to_string_pretty(&view.json())?,
    };

    // With --emit, stdout carries the records, so the summary goes to stderr
    if config.output.emit {
        eprintln!("{}", text);
    } else {
        SafeStdout::new().writeln(&text)?;
    }
    Ok(())
}

enum SummaryView<'a> {
    Complete(&'a Outcome),
    Failed(&'a Summary),
}

impl SummaryView<'_> {
    fn text(&self) -> String {
        match self {
            SummaryView::Complete(outcome) => outcome.format_text(),
            SummaryView::Failed(summary) => summary.format_text(None),
        }
    }

    fn json(&self) -> serde_json::Value {
        match self {
            SummaryView::Complete(outcome) => outcome.to_json(),
            SummaryView::Failed(summary) => serde_json::json!({ "summary": summary }),
        }
    }
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    let processed_args = match process_args(raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", format_error_message_auto(&format!("Config file error: {:#}", e)));
            ExitCode::GeneralError.exit();
        }
    };

    let cli = Cli::parse_from(processed_args);

    if cli.show_config {
        ConfigFile::show_config();
        ExitCode::Success.exit();
    }

    let config = match BatchConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_message_auto(&format!("{:#}", e)));
            ExitCode::InvalidUsage.exit();
        }
    };
    set_no_emoji(config.output.no_emoji);
    let quiet = config.output.quiet;

    let progress = Progress::new();
    let (ctrl_tx, ctrl_rx) = crossbeam_channel::unbounded();
    let _signal_handler = match SignalHandler::new(ctrl_tx, progress.clone()) {
        Ok(handler) => Some(handler),
        Err(e) => {
            if !quiet {
                eprintln!(
                    "{}",
                    format_warning_message_auto(&format!("Signal handling unavailable: {}", e))
                );
            }
            None
        }
    };

    let processor = BatchProcessor::new(config.clone())
        .with_ctrl(ctrl_rx)
        .with_progress(progress);

    match linetally::run(&processor, SafeStdout::new()) {
        Ok((outcome, mut stdout)) => {
            let _ = stdout.flush();
            if let Err(e) = print_summary(SummaryView::Complete(&outcome), &config) {
                eprintln!("{}", format_error_message_auto(&format!("{:#}", e)));
                ExitCode::GeneralError.exit();
            }
            if outcome.stopped_early && !quiet {
                eprintln!(
                    "{}",
                    format_warning_message_auto("Stopped before the end of the input")
                );
            }
            if let Some(code) = SignalHandler::shutdown_exit_code() {
                code.exit();
            }
            ExitCode::Success.exit();
        }
        Err(err) => {
            if let BatchError::Validation { summary, .. } = &err {
                let _ = print_summary(SummaryView::Failed(summary), &config);
            }
            eprintln!("{}", format_error_message_auto(&err.to_string()));
            ExitCode::GeneralError.exit();
        }
    }
}
