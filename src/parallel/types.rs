//! Type definitions for parallel processing
//!
//! Contains the messages passed between the reader, the workers and the sink.

use std::time::Duration;

use crate::record::{Classifier, Record};
use crate::summary::Summary;

/// A group of consecutive records handed to exactly one worker
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub records: Vec<Record>,
}

/// Rendered `--emit` output of one batch
#[derive(Debug)]
pub(crate) struct RenderedBatch {
    pub batch_id: u64,
    pub text: String,
}

/// What the reader thread reports once the source is exhausted or it was stopped
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReaderReport {
    pub records_read: u64,
    pub batches_sent: u64,
    pub stopped_early: bool,
}

/// Per-worker partial result, combined once all workers have finished
#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub worker_id: usize,
    pub summary: Summary,
    pub batches: u64,
    pub busy: Duration,
}

/// Immutable settings every worker gets a copy of
#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub classifier: Classifier,
    pub emit: bool,
    pub report_malformed: bool,
}
