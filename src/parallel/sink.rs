//! Output sink thread for parallel processing
//!
//! Writes rendered batches in batch order so `--emit` output matches a
//! sequential run regardless of which worker finished first.

use crossbeam_channel::Receiver;
use std::collections::BTreeMap;
use std::io::Write;

use super::types::RenderedBatch;

/// Write batches in id order, holding back any that arrive early.
///
/// Every written batch frees one slot of the reader's in-flight window, so
/// `pending` never holds more batches than the window allows.
///
/// Returns the writer so the caller can reuse or inspect it.
pub(crate) fn ordered_sink_thread<W: Write>(
    receiver: Receiver<RenderedBatch>,
    inflight: Receiver<()>,
    mut output: W,
) -> std::io::Result<W> {
    let mut pending: BTreeMap<u64, String> = BTreeMap::new();
    let mut next_id = 0u64;

    for rendered in receiver.iter() {
        pending.insert(rendered.batch_id, rendered.text);

        while let Some(text) = pending.remove(&next_id) {
            output.write_all(text.as_bytes())?;
            // The reader took this slot before sending the batch
            let _ = inflight.try_recv();
            next_id += 1;
        }
    }

    // Gaps only appear when a worker died; write what is left in order
    for (_, text) in pending {
        output.write_all(text.as_bytes())?;
        let _ = inflight.try_recv();
    }

    output.flush()?;
    Ok(output)
}
