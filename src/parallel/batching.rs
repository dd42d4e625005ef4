//! Reader thread for parallel processing
//!
//! The reader is the only owner of the record source, so each record is
//! pulled once and lands in exactly one batch.

use crossbeam_channel::Sender;

use crate::error::BatchError;
use crate::processor::StopSignal;
use crate::progress::Progress;
use crate::record::Record;

use super::types::{Batch, ReaderReport};

/// Group records into batches of `batch_size` and hand them to the workers.
///
/// Stops pulling when the stop signal fires; the partial batch collected so
/// far is still sent so nothing that was read goes unprocessed. A read error
/// ends the run and is returned to the orchestrator.
///
/// With `inflight`, a slot in that bounded channel is taken before each batch
/// is sent and the output sink frees it once the batch is written. This caps
/// how many batches can wait in the sink's reorder buffer.
pub(crate) fn reader_thread<I>(
    records: I,
    batch_sender: Sender<Batch>,
    inflight: Option<Sender<()>>,
    batch_size: usize,
    mut stop: StopSignal,
    progress: Progress,
) -> Result<ReaderReport, BatchError>
where
    I: Iterator<Item = Result<Record, BatchError>>,
{
    let mut records = records;
    let mut report = ReaderReport::default();
    let mut current = Vec::with_capacity(batch_size);
    let dispatch = Dispatch {
        batches: &batch_sender,
        inflight: inflight.as_ref(),
    };

    loop {
        if stop.should_stop() {
            report.stopped_early = true;
            break;
        }

        let record = match records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => return Err(e),
            None => break,
        };

        report.records_read += 1;
        progress.add_read(1);
        current.push(record);

        if current.len() == batch_size {
            let full = std::mem::replace(&mut current, Vec::with_capacity(batch_size));
            if !dispatch.send(&mut report, full) {
                // Every worker (or the sink) is gone, nobody can take more work
                return Ok(report);
            }
        }
    }

    if !current.is_empty() {
        dispatch.send(&mut report, current);
    }

    Ok(report)
}

struct Dispatch<'a> {
    batches: &'a Sender<Batch>,
    inflight: Option<&'a Sender<()>>,
}

impl Dispatch<'_> {
    fn send(&self, report: &mut ReaderReport, records: Vec<Record>) -> bool {
        if let Some(inflight) = self.inflight {
            // Blocks while the window is full
            if inflight.send(()).is_err() {
                return false;
            }
        }
        let batch = Batch {
            id: report.batches_sent,
            records,
        };
        report.batches_sent += 1;
        self.batches.send(batch).is_ok()
    }
}
