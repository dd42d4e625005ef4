//! Records and the per-record transformation.
//!
//! A record is one input line. Classification is the transformation every
//! worker applies: validate the line, then compare it against the marker.

use regex::Regex;

use crate::error::RecordError;

/// One line of input. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based position in the source
    pub ordinal: u64,
    /// Line text without its terminator (lossy if the bytes were not UTF-8)
    pub text: String,
    /// Byte length of the raw line without its terminator
    pub raw_len: usize,
    pub valid_utf8: bool,
}

impl Record {
    pub fn new(ordinal: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            ordinal,
            raw_len: text.len(),
            text,
            valid_utf8: true,
        }
    }

    /// Build a record from raw line bytes with the terminator already removed.
    pub fn from_bytes(ordinal: u64, bytes: Vec<u8>) -> Self {
        let raw_len = bytes.len();
        match String::from_utf8(bytes) {
            Ok(text) => Self {
                ordinal,
                text,
                raw_len,
                valid_utf8: true,
            },
            Err(e) => Self {
                ordinal,
                text: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                raw_len,
                valid_utf8: false,
            },
        }
    }

    /// Build a record from the kept prefix of a line that was cut short.
    ///
    /// `raw_len` is the length of the whole line. A multi-byte character
    /// split by the cut is dropped rather than reported as invalid UTF-8.
    pub fn truncated(ordinal: u64, mut prefix: Vec<u8>, raw_len: usize) -> Self {
        let valid_utf8 = match std::str::from_utf8(&prefix) {
            Ok(_) => true,
            Err(e) if e.error_len().is_none() => {
                prefix.truncate(e.valid_up_to());
                true
            }
            Err(_) => false,
        };
        Self {
            ordinal,
            text: String::from_utf8_lossy(&prefix).into_owned(),
            raw_len,
            valid_utf8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Normal,
    Marker,
    Malformed(RecordError),
}

/// Validates records and detects the error marker.
#[derive(Debug, Clone)]
pub struct Classifier {
    marker: String,
    require: Option<Regex>,
    max_line_length: Option<usize>,
}

impl Classifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            require: None,
            max_line_length: None,
        }
    }

    pub fn with_require(mut self, require: Option<Regex>) -> Self {
        self.require = require;
        self
    }

    pub fn with_max_line_length(mut self, max: Option<usize>) -> Self {
        self.max_line_length = max;
        self
    }

    pub fn validate(&self, record: &Record) -> Result<(), RecordError> {
        if !record.valid_utf8 {
            return Err(RecordError::InvalidUtf8);
        }
        if let Some(max) = self.max_line_length {
            if record.raw_len > max {
                return Err(RecordError::TooLong {
                    len: record.raw_len,
                    max,
                });
            }
        }
        if let Some(require) = &self.require {
            if !require.is_match(&record.text) {
                return Err(RecordError::PatternMismatch);
            }
        }
        Ok(())
    }

    pub fn classify(&self, record: &Record) -> Classification {
        if let Err(e) = self.validate(record) {
            return Classification::Malformed(e);
        }
        // Value comparison of the contents, never of the allocations
        if record.text.as_str() == self.marker.as_str() {
            Classification::Marker
        } else {
            Classification::Normal
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_compared_by_value() {
        let mut built = String::from("err");
        built.push_str("or");
        let classifier = Classifier::new(String::from("error"));

        let a = Record::new(1, built);
        let b = Record::new(2, "error".to_string());
        assert_ne!(a.text.as_ptr(), b.text.as_ptr());
        assert_eq!(classifier.classify(&a), Classification::Marker);
        assert_eq!(classifier.classify(&b), Classification::Marker);
    }

    #[test]
    fn test_marker_requires_exact_match() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(&Record::new(1, "errors")),
            Classification::Normal
        );
        assert_eq!(
            classifier.classify(&Record::new(2, " error")),
            Classification::Normal
        );
        assert_eq!(
            classifier.classify(&Record::new(3, "ERROR")),
            Classification::Normal
        );
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let record = Record::from_bytes(7, vec![b'a', 0xff, b'b']);
        assert!(!record.valid_utf8);
        assert_eq!(record.raw_len, 3);
        assert_eq!(
            Classifier::default().classify(&record),
            Classification::Malformed(RecordError::InvalidUtf8)
        );
    }

    #[test]
    fn test_too_long_uses_raw_length() {
        let classifier = Classifier::default().with_max_line_length(Some(4));
        assert_eq!(
            classifier.classify(&Record::new(1, "abcd")),
            Classification::Normal
        );
        assert_eq!(
            classifier.classify(&Record::new(2, "abcde")),
            Classification::Malformed(RecordError::TooLong { len: 5, max: 4 })
        );
    }

    #[test]
    fn test_truncated_record_keeps_full_length() {
        let record = Record::truncated(3, b"abcd".to_vec(), 4096);
        assert_eq!(record.text, "abcd");
        assert_eq!(record.raw_len, 4096);
        assert_eq!(
            Classifier::default()
                .with_max_line_length(Some(4))
                .classify(&record),
            Classification::Malformed(RecordError::TooLong { len: 4096, max: 4 })
        );
    }

    #[test]
    fn test_truncated_record_drops_split_character() {
        // "é" is two bytes; the cut leaves half of the second one
        let record = Record::truncated(1, "éé".as_bytes()[..3].to_vec(), 10);
        assert!(record.valid_utf8);
        assert_eq!(record.text, "é");

        let record = Record::truncated(2, vec![0xff, b'a'], 10);
        assert!(!record.valid_utf8);
    }

    #[test]
    fn test_validation_runs_before_marker_check() {
        let classifier = Classifier::default().with_require(Some(Regex::new(r"^\w+=").unwrap()));
        assert_eq!(
            classifier.classify(&Record::new(1, "error")),
            Classification::Malformed(RecordError::PatternMismatch)
        );
        assert_eq!(
            classifier.classify(&Record::new(2, "k=v")),
            Classification::Normal
        );
    }

    #[test]
    fn test_classify_does_not_mutate_record() {
        let classifier = Classifier::default();
        let record = Record::new(1, "error");
        let before = record.clone();
        let _ = classifier.classify(&record);
        let _ = classifier.classify(&record);
        assert_eq!(record, before);
    }
}
