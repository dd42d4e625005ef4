//! Batch processing entry point.
//!
//! [`BatchProcessor`] runs on the calling thread when the configured
//! concurrency is 1 and hands off to the parallel pipeline otherwise. Both
//! paths classify records the same way and produce the same summary.

use crossbeam_channel::Receiver;
use serde_json::json;
use std::io::Write;
use std::time::{Duration, Instant};

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::parallel::{ParallelConfig, ParallelProcessor};
use crate::platform::Ctrl;
use crate::progress::Progress;
use crate::record::{Classification, Classifier, Record};
use crate::render::BatchRenderer;
use crate::summary::Summary;

/// Tells the reader when to stop pulling new records.
///
/// Fires on a shutdown control message or once the deadline has passed and
/// stays fired afterwards.
#[derive(Debug, Clone)]
pub struct StopSignal {
    ctrl_rx: Receiver<Ctrl>,
    deadline: Option<Instant>,
    fired: bool,
}

impl StopSignal {
    pub fn new(ctrl_rx: Receiver<Ctrl>, deadline: Option<Instant>) -> Self {
        Self {
            ctrl_rx,
            deadline,
            fired: false,
        }
    }

    pub fn never() -> Self {
        Self::new(crossbeam_channel::never(), None)
    }

    pub fn should_stop(&mut self) -> bool {
        if self.fired {
            return true;
        }
        if let Ok(Ctrl::Shutdown { .. }) = self.ctrl_rx.try_recv() {
            self.fired = true;
        } else if let Some(deadline) = self.deadline {
            self.fired = Instant::now() >= deadline;
        }
        self.fired
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub summary: Summary,
    pub workers: usize,
    pub elapsed: Duration,
    /// The run stopped pulling records because of a signal or the deadline
    pub stopped_early: bool,
}

impl Outcome {
    pub fn format_text(&self) -> String {
        let mut output = self.summary.format_text(Some(self.elapsed));
        if self.workers > 1 {
            output.push_str(&format!("\nWorkers: {}", self.workers));
        }
        if self.stopped_early {
            output.push_str("\nStopped early: input was not read to the end");
        }
        output
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "summary": self.summary,
            "workers": self.workers,
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "stopped_early": self.stopped_early,
        })
    }
}

/// Classify one record and account for it. Shared by the sequential loop
/// and the parallel workers so both count identically.
pub(crate) fn process_record(
    record: &Record,
    classifier: &Classifier,
    summary: &mut Summary,
    renderer: Option<&mut BatchRenderer>,
    report_malformed: bool,
) {
    let classification = classifier.classify(record);

    if report_malformed {
        if let Classification::Malformed(reason) = &classification {
            eprintln!(
                "{}",
                crate::config::format_warning_message_auto(&format!(
                    "line {}: {}",
                    record.ordinal, reason
                ))
            );
        }
    }

    summary.record(record, &classification);
    if let Some(renderer) = renderer {
        renderer.push(record, &classification);
    }
}

pub struct BatchProcessor {
    config: BatchConfig,
    ctrl_rx: Receiver<Ctrl>,
    progress: Progress,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            ctrl_rx: crossbeam_channel::never(),
            progress: Progress::new(),
        }
    }

    /// Receive shutdown requests (from the signal handler) on this channel
    pub fn with_ctrl(mut self, ctrl_rx: Receiver<Ctrl>) -> Self {
        self.ctrl_rx = ctrl_rx;
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every record, discarding `--emit` output
    pub fn process<I>(&self, records: I) -> Result<Outcome, BatchError>
    where
        I: Iterator<Item = Result<Record, BatchError>> + Send + 'static,
    {
        self.process_with_output(records, std::io::sink())
            .map(|(outcome, _)| outcome)
    }

    /// Process every record, writing `--emit` output to `output`.
    ///
    /// Malformed records are counted and never abort the run. A read error
    /// does. Once the pass is complete the error threshold is checked.
    pub fn process_with_output<I, W>(
        &self,
        records: I,
        output: W,
    ) -> Result<(Outcome, W), BatchError>
    where
        I: Iterator<Item = Result<Record, BatchError>> + Send + 'static,
        W: Write + Send + 'static,
    {
        let started = Instant::now();
        let stop = StopSignal::new(
            self.ctrl_rx.clone(),
            self.config.processing.deadline.map(|d| started + d),
        );
        let workers = self.config.performance.concurrency.max(1);

        let (summary, stopped_early, output) = if self.config.is_parallel() {
            let parallel = ParallelProcessor::new(ParallelConfig {
                num_workers: workers,
                batch_size: self.config.performance.batch_size,
                channel_bound: self.config.channel_bound(),
                verbose: self.reported_verbosity(),
            });
            let run = parallel.process(
                records,
                crate::parallel::WorkerConfig {
                    classifier: self.config.classifier(),
                    emit: self.config.output.emit,
                    report_malformed: self.reported_verbosity() >= 1,
                },
                output,
                stop,
                self.progress.clone(),
            )?;
            (run.summary, run.stopped_early, run.output)
        } else {
            self.process_sequential(records, output, stop)?
        };

        let outcome = Outcome {
            summary,
            workers,
            elapsed: started.elapsed(),
            stopped_early,
        };

        if let Some(threshold) = self.config.processing.max_errors {
            if outcome.summary.malformed > threshold {
                return Err(BatchError::Validation {
                    malformed: outcome.summary.malformed,
                    threshold,
                    summary: Box::new(outcome.summary),
                });
            }
        }

        Ok((outcome, output))
    }

    fn reported_verbosity(&self) -> u8 {
        if self.config.output.quiet {
            0
        } else {
            self.config.output.verbose
        }
    }

    fn process_sequential<I, W>(
        &self,
        mut records: I,
        mut output: W,
        mut stop: StopSignal,
    ) -> Result<(Summary, bool, W), BatchError>
    where
        I: Iterator<Item = Result<Record, BatchError>>,
        W: Write,
    {
        let classifier = self.config.classifier();
        let batch_size = self.config.performance.batch_size;
        let emit = self.config.output.emit;
        let report_malformed = self.reported_verbosity() >= 1;

        let mut summary = Summary::new();
        let fresh_renderer = || BatchRenderer::with_capacity(batch_size, 0);
        let mut renderer = if emit {
            fresh_renderer()
        } else {
            BatchRenderer::default()
        };
        let mut pending = 0usize;
        let mut stopped_early = false;

        loop {
            if stop.should_stop() {
                stopped_early = true;
                break;
            }
            let record = match records.next() {
                Some(record) => record?,
                None => break,
            };
            self.progress.add_read(1);

            process_record(
                &record,
                &classifier,
                &mut summary,
                emit.then_some(&mut renderer),
                report_malformed,
            );
            self.progress.add_processed(1);

            if emit {
                pending += 1;
                if pending == batch_size {
                    write_rendered(&mut output, std::mem::replace(&mut renderer, fresh_renderer()))?;
                    pending = 0;
                }
            }
        }

        if !renderer.is_empty() {
            write_rendered(&mut output, renderer)?;
        }
        output.flush().map_err(|e| BatchError::io("<output>", e))?;

        Ok((summary, stopped_early, output))
    }
}

fn write_rendered<W: Write>(output: &mut W, renderer: BatchRenderer) -> Result<(), BatchError> {
    output
        .write_all(renderer.finish().as_bytes())
        .map_err(|e| BatchError::io("<output>", e))
}
