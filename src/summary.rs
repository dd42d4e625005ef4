use serde::Serialize;
use std::time::Duration;

use crate::error::RecordError;
use crate::record::{Classification, Record};

/// Maximum number of malformed examples kept in a summary
pub const MAX_SAMPLES: usize = 5;

/// Per-kind malformed counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MalformedCounts {
    pub invalid_utf8: u64,
    pub too_long: u64,
    pub pattern_mismatch: u64,
}

impl MalformedCounts {
    fn add(&mut self, error: &RecordError) {
        match error {
            RecordError::InvalidUtf8 => self.invalid_utf8 += 1,
            RecordError::TooLong { .. } => self.too_long += 1,
            RecordError::PatternMismatch => self.pattern_mismatch += 1,
        }
    }

    fn merge(&mut self, other: &MalformedCounts) {
        self.invalid_utf8 += other.invalid_utf8;
        self.too_long += other.too_long;
        self.pattern_mismatch += other.pattern_mismatch;
    }
}

/// A malformed record kept as an example in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedSample {
    pub ordinal: u64,
    pub reason: String,
}

/// Counts gathered while processing records.
///
/// Every worker owns one of these and nothing else writes to it. Partial
/// summaries are folded together with [`Summary::combine`] once the workers
/// are done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub records: u64,
    pub normal: u64,
    pub markers: u64,
    pub malformed: u64,
    pub bytes: u64,
    pub longest: u64,
    pub malformed_by_kind: MalformedCounts,
    pub samples: Vec<MalformedSample>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one classified record.
    pub fn record(&mut self, record: &Record, classification: &Classification) {
        let len = record.raw_len as u64;
        self.records += 1;
        self.bytes += len;
        self.longest = self.longest.max(len);

        match classification {
            Classification::Normal => self.normal += 1,
            Classification::Marker => self.markers += 1,
            Classification::Malformed(error) => {
                self.malformed += 1;
                self.malformed_by_kind.add(error);
                self.push_sample(MalformedSample {
                    ordinal: record.ordinal,
                    reason: error.to_string(),
                });
            }
        }
    }

    /// Merge another partial summary into this one.
    ///
    /// Sums and maxima are associative and commutative. Samples keep the
    /// smallest `(ordinal, reason)` pairs, which is too.
    pub fn merge(&mut self, other: &Summary) {
        self.records += other.records;
        self.normal += other.normal;
        self.markers += other.markers;
        self.malformed += other.malformed;
        self.bytes += other.bytes;
        self.longest = self.longest.max(other.longest);
        self.malformed_by_kind.merge(&other.malformed_by_kind);
        for sample in &other.samples {
            self.push_sample(sample.clone());
        }
    }

    pub fn combine(mut self, other: Summary) -> Summary {
        self.merge(&other);
        self
    }

    /// Fold any number of partial summaries, starting from the empty summary.
    pub fn combine_all<I>(partials: I) -> Summary
    where
        I: IntoIterator<Item = Summary>,
    {
        partials.into_iter().fold(Summary::default(), Summary::combine)
    }

    fn push_sample(&mut self, sample: MalformedSample) {
        let key = (sample.ordinal, sample.reason.as_str());
        let pos = self
            .samples
            .partition_point(|s| (s.ordinal, s.reason.as_str()) <= key);
        if pos >= MAX_SAMPLES {
            return;
        }
        self.samples.insert(pos, sample);
        self.samples.truncate(MAX_SAMPLES);
    }

    pub fn format_text(&self, elapsed: Option<Duration>) -> String {
        let mut output = format!(
            "Records processed: {} total, {} normal, {} markers, {} malformed",
            self.records, self.normal, self.markers, self.malformed
        );

        output.push_str(&format!(
            "; {} bytes, longest line {} bytes",
            self.bytes, self.longest
        ));

        if let Some(elapsed) = elapsed {
            let ms = elapsed.as_millis();
            output.push_str(&format!(" in {}ms", ms));
            if ms > 0 && self.records > 0 {
                let per_sec = (self.records as f64 * 1000.0) / ms as f64;
                output.push_str(&format!(" ({:.0} lines/s)", per_sec));
            }
        }

        if self.malformed > 0 {
            let kinds = &self.malformed_by_kind;
            output.push_str(&format!(
                "\nMalformed by kind: {} invalid_utf8, {} too_long, {} pattern_mismatch",
                kinds.invalid_utf8, kinds.too_long, kinds.pattern_mismatch
            ));
            for sample in &self.samples {
                output.push_str(&format!("\n  line {}: {}", sample.ordinal, sample.reason));
            }
        }

        output
    }
}
