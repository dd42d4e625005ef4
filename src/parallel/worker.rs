//! Worker thread for parallel processing
//!
//! Each worker accumulates into its own summary. Nothing is shared between
//! workers until the orchestrator combines the reports.

use crossbeam_channel::{Receiver, Sender};
use std::time::{Duration, Instant};

use crate::processor::process_record;
use crate::progress::Progress;
use crate::render::BatchRenderer;
use crate::summary::Summary;

use super::types::{Batch, RenderedBatch, WorkerConfig, WorkerReport};

/// Worker thread: processes batches until the reader closes the channel
pub(crate) fn worker_thread(
    worker_id: usize,
    work_receiver: Receiver<Batch>,
    output_sender: Option<Sender<RenderedBatch>>,
    config: WorkerConfig,
    progress: Progress,
) -> WorkerReport {
    let mut summary = Summary::new();
    let mut batches = 0u64;
    let mut busy = Duration::ZERO;

    for batch in work_receiver.iter() {
        let started = Instant::now();
        let rendered = worker_process_batch(&batch, &config, &mut summary);
        progress.add_processed(batch.records.len() as u64);
        batches += 1;
        busy += started.elapsed();

        if let (Some(sender), Some(text)) = (&output_sender, rendered) {
            // A dead sink is reported by the orchestrator; keep counting
            let _ = sender.send(RenderedBatch {
                batch_id: batch.id,
                text,
            });
        }
    }

    WorkerReport {
        worker_id,
        summary,
        batches,
        busy,
    }
}

/// Classify and count every record of a batch, rendering it when `--emit` is on
fn worker_process_batch(
    batch: &Batch,
    config: &WorkerConfig,
    summary: &mut Summary,
) -> Option<String> {
    let mut renderer = config.emit.then(|| {
        let payload = batch.records.iter().map(|r| r.raw_len).sum();
        BatchRenderer::with_capacity(batch.records.len(), payload)
    });

    for record in &batch.records {
        process_record(
            record,
            &config.classifier,
            summary,
            renderer.as_mut(),
            config.report_malformed,
        );
    }

    renderer.map(BatchRenderer::finish)
}
