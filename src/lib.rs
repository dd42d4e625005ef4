// Core library for the linetally batch processor

pub mod cli;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod error;
pub mod parallel;
pub mod platform;
pub mod processor;
pub mod progress;
pub mod readers;
pub mod record;
pub mod render;
pub mod summary;

pub use cli::Cli;
pub use config::BatchConfig;
pub use error::{BatchError, RecordError};
pub use processor::{BatchProcessor, Outcome, StopSignal};
pub use readers::{load, RecordSource};
pub use record::{Classification, Classifier, Record};
pub use summary::Summary;

use std::io::Write;

/// Load the configured source and process it with `processor`.
///
/// The source is opened once here and closed when processing returns, on
/// success and on every error path.
pub fn run<W: Write + Send + 'static>(
    processor: &BatchProcessor,
    output: W,
) -> Result<(Outcome, W), BatchError> {
    let config = processor.config();
    let records =
        load(&config.input.source)?.with_max_line_length(config.processing.max_line_length);
    processor.process_with_output(records, output)
}
