//! Parallel processing module
//!
//! A single reader owns the record source and hands batches to a fixed pool
//! of workers. Each worker keeps a private summary; the partial summaries
//! are combined once, after every worker has finished.
//!
//! # Module Structure
//!
//! - `types`: Batches, worker settings and reports
//! - `batching`: Reader thread that turns records into batches
//! - `worker`: Worker thread that classifies and counts batches
//! - `sink`: Output thread that writes `--emit` text in input order
//! - `processor`: `ParallelProcessor` orchestration

mod batching;
mod processor;
mod sink;
mod types;
mod worker;

pub use processor::{ParallelConfig, ParallelProcessor};
pub use types::Batch;
pub(crate) use types::WorkerConfig;
