//! Main parallel processor
//!
//! Wires one reader, a fixed pool of workers and an optional output sink,
//! then combines the workers' partial summaries once they have all finished.

use crossbeam_channel::bounded;
use std::io::Write;
use std::thread;

use crate::error::BatchError;
use crate::processor::StopSignal;
use crate::progress::Progress;
use crate::record::Record;
use crate::summary::Summary;

use super::batching::reader_thread;
use super::sink::ordered_sink_thread;
use super::types::{WorkerConfig, WorkerReport};
use super::worker::worker_thread;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub batch_size: usize,
    /// Batches buffered between the reader and the workers
    pub channel_bound: usize,
    pub verbose: u8,
}

/// Result of a parallel run before the error threshold is applied
#[derive(Debug)]
pub(crate) struct ParallelRun<W> {
    pub summary: Summary,
    pub stopped_early: bool,
    pub output: W,
}

/// Main parallel processor
pub struct ParallelProcessor {
    config: ParallelConfig,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    pub(crate) fn process<I, W>(
        &self,
        records: I,
        worker_config: WorkerConfig,
        output: W,
        stop: StopSignal,
        progress: Progress,
    ) -> Result<ParallelRun<W>, BatchError>
    where
        I: Iterator<Item = Result<Record, BatchError>> + Send + 'static,
        W: Write + Send + 'static,
    {
        let (batch_sender, batch_receiver) = bounded(self.config.channel_bound.max(1));

        // The sink frees one in-flight slot per written batch; the window
        // covers the queued batches plus one being worked on per worker.
        let (output_sender, inflight_sender, sink) = if worker_config.emit {
            let (sender, receiver) = bounded(self.config.num_workers.saturating_mul(2));
            let window = self
                .config
                .channel_bound
                .saturating_add(self.config.num_workers)
                .max(1);
            let (inflight_sender, inflight_receiver) = bounded(window);
            let handle = spawn_thread("output".to_string(), move || {
                ordered_sink_thread(receiver, inflight_receiver, output)
            })?;
            (Some(sender), Some(inflight_sender), SinkState::Running(handle))
        } else {
            (None, None, SinkState::Idle(output))
        };

        let mut worker_handles = Vec::with_capacity(self.config.num_workers);
        for worker_id in 0..self.config.num_workers {
            let work_receiver = batch_receiver.clone();
            let worker_output = output_sender.clone();
            let worker_config = worker_config.clone();
            let progress = progress.clone();
            let spawned = spawn_thread(format!("worker {}", worker_id), move || {
                worker_thread(
                    worker_id,
                    work_receiver,
                    worker_output,
                    worker_config,
                    progress,
                )
            });
            match spawned {
                Ok(handle) => worker_handles.push(handle),
                Err(e) => {
                    // Closing the batch channel lets the started workers finish
                    drop(batch_sender);
                    drop(batch_receiver);
                    drop(output_sender);
                    for handle in worker_handles {
                        join_thread(handle);
                    }
                    let _ = sink.finish();
                    return Err(e);
                }
            }
        }

        // Workers and the sink own the remaining ends; drop ours so the
        // channels close when the reader and the workers finish.
        drop(batch_receiver);
        drop(output_sender);

        let reader_handle = {
            let batch_size = self.config.batch_size;
            let progress = progress.clone();
            spawn_thread("reader".to_string(), move || {
                reader_thread(
                    records,
                    batch_sender,
                    inflight_sender,
                    batch_size,
                    stop,
                    progress,
                )
            })
        };
        let reader_handle = match reader_handle {
            Ok(handle) => handle,
            Err(e) => {
                // The failed spawn dropped the batch sender, so workers drain out
                for handle in worker_handles {
                    join_thread(handle);
                }
                let _ = sink.finish();
                return Err(e);
            }
        };

        let reports: Vec<WorkerReport> = worker_handles.into_iter().map(join_thread).collect();
        let output = sink.finish()?;
        let reader_report = join_thread(reader_handle)?;

        if self.config.verbose >= 2 {
            for report in &reports {
                eprintln!(
                    "{}",
                    crate::config::format_info_message_auto(&format!(
                        "worker {}: {} batches, {} records, busy {}ms",
                        report.worker_id,
                        report.batches,
                        report.summary.records,
                        report.busy.as_millis()
                    ))
                );
            }
        }

        let summary = Summary::combine_all(reports.into_iter().map(|r| r.summary));
        debug_assert_eq!(summary.records, reader_report.records_read);

        Ok(ParallelRun {
            summary,
            stopped_early: reader_report.stopped_early,
            output,
        })
    }
}

enum SinkState<W> {
    Idle(W),
    Running(thread::JoinHandle<std::io::Result<W>>),
}

impl<W> SinkState<W> {
    fn finish(self) -> Result<W, BatchError> {
        match self {
            SinkState::Idle(output) => Ok(output),
            SinkState::Running(handle) => {
                join_thread(handle).map_err(|e| BatchError::io("<output>", e))
            }
        }
    }
}

fn spawn_thread<F, T>(name: String, f: F) -> Result<thread::JoinHandle<T>, BatchError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(format!("linetally {}", name))
        .spawn(f)
        .map_err(|source| BatchError::Spawn {
            thread: name,
            source,
        })
}

/// Join a thread, re-raising its panic on the calling thread
fn join_thread<T>(handle: thread::JoinHandle<T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
