//! Text rendering of processed records for `--emit`.

use std::fmt::Write as _;

use crate::record::{Classification, Record};

/// Rough per-line overhead of the rendered prefixes
const LINE_OVERHEAD: usize = 32;

/// Accumulates the rendered output of one batch into a single buffer.
///
/// The buffer is sized once from the batch and handed out whole by
/// [`BatchRenderer::finish`], so writing a batch costs one allocation and one
/// write call.
#[derive(Debug, Default)]
pub struct BatchRenderer {
    buf: String,
}

impl BatchRenderer {
    pub fn with_capacity(records: usize, payload_bytes: usize) -> Self {
        Self {
            buf: String::with_capacity(payload_bytes + records * LINE_OVERHEAD),
        }
    }

    pub fn push(&mut self, record: &Record, classification: &Classification) {
        // Writing into a String cannot fail
        let _ = match classification {
            Classification::Normal => writeln!(self.buf, "processing {}", record.text),
            Classification::Marker => {
                writeln!(self.buf, "error detected at line {}", record.ordinal)
            }
            Classification::Malformed(reason) => {
                writeln!(self.buf, "malformed line {}: {}", record.ordinal, reason)
            }
        };
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;
    use std::time::Instant;

    #[test]
    fn test_render_each_classification() {
        let mut renderer = BatchRenderer::with_capacity(3, 8);
        renderer.push(&Record::new(1, "a"), &Classification::Normal);
        renderer.push(&Record::new(2, "error"), &Classification::Marker);
        renderer.push(
            &Record::from_bytes(3, vec![0xff]),
            &Classification::Malformed(RecordError::InvalidUtf8),
        );
        assert_eq!(
            renderer.finish(),
            "processing a\nerror detected at line 2\nmalformed line 3: line is not valid UTF-8\n"
        );
    }

    #[test]
    fn test_empty_renderer() {
        let renderer = BatchRenderer::default();
        assert!(renderer.is_empty());
        assert_eq!(renderer.finish(), "");
    }

    #[test]
    fn test_buffer_beats_repeated_concatenation() {
        const ITERATIONS: u64 = 5000;
        let records: Vec<Record> = (0..ITERATIONS)
            .map(|i| Record::new(i + 1, format!("{}-{}", 42, i)))
            .collect();

        let start = Instant::now();
        let mut naive = String::new();
        for record in &records {
            // Copies the whole accumulated string every iteration
            naive = format!("{}processing {}\n", naive, record.text);
        }
        let naive_elapsed = start.elapsed();

        let start = Instant::now();
        let payload: usize = records.iter().map(|r| r.raw_len).sum();
        let mut renderer = BatchRenderer::with_capacity(records.len(), payload);
        for record in &records {
            renderer.push(record, &Classification::Normal);
        }
        let rendered = renderer.finish();
        let buffered_elapsed = start.elapsed();

        assert_eq!(rendered, naive);
        assert_eq!(rendered.lines().count(), ITERATIONS as usize);
        assert!(
            buffered_elapsed < naive_elapsed,
            "buffered {:?} should beat naive {:?}",
            buffered_elapsed,
            naive_elapsed
        );
    }
}
