use std::io::{self, BufRead, Read};

use crate::decompression::DecompressionReader;
use crate::error::BatchError;
use crate::record::Record;

/// Source identifier for standard input
pub const STDIN_SOURCE: &str = "-";

/// A lazy, single-pass sequence of records read from one source.
///
/// The underlying reader is opened once and dropped with the sequence, so
/// the handle is released on every exit path. Only one line is buffered at
/// a time. A read error is yielded once and ends the sequence.
pub struct RecordSource {
    reader: Box<dyn BufRead + Send>,
    source_id: String,
    next_ordinal: u64,
    buffer: Vec<u8>,
    /// Lines longer than this are cut after `max + 1` bytes
    max_line_length: Option<usize>,
    finished: bool,
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("source_id", &self.source_id)
            .field("next_ordinal", &self.next_ordinal)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Open `source` (a path, or `-` for stdin) and return its records lazily.
pub fn load(source: &str) -> Result<RecordSource, BatchError> {
    let reader = if source == STDIN_SOURCE {
        DecompressionReader::from_reader(io::stdin())
    } else {
        DecompressionReader::open(source)
    }
    .map_err(|e| BatchError::io(display_source(source), e))?;

    Ok(RecordSource::new(display_source(source), reader))
}

/// Human-readable name of a source identifier
pub fn display_source(source: &str) -> String {
    if source == STDIN_SOURCE {
        "<stdin>".to_string()
    } else {
        source.to_string()
    }
}

impl RecordSource {
    pub fn new<R: BufRead + Send + 'static>(source_id: impl Into<String>, reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            source_id: source_id.into(),
            next_ordinal: 1,
            buffer: Vec::new(),
            max_line_length: None,
            finished: false,
        }
    }

    /// Keep at most `max + 1` bytes of any line in memory. Longer lines are
    /// still delivered, with their full length in `raw_len`.
    pub fn with_max_line_length(mut self, max: Option<usize>) -> Self {
        self.max_line_length = max;
        self
    }

    /// Number of records yielded so far
    pub fn records_read(&self) -> u64 {
        self.next_ordinal - 1
    }
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

/// What was left of a line after its kept prefix
struct LineTail {
    skipped: usize,
    /// A `\n` ended the line (as opposed to end of input)
    terminated: bool,
    /// Last skipped byte before the terminator
    last: Option<u8>,
}

impl RecordSource {
    fn read_line(&mut self) -> io::Result<usize> {
        self.buffer.clear();
        match self.max_line_length {
            Some(max) => self
                .reader
                .by_ref()
                .take(max as u64 + 1)
                .read_until(b'\n', &mut self.buffer),
            None => self.reader.read_until(b'\n', &mut self.buffer),
        }
    }

    /// Discard the rest of the current line without buffering it.
    fn skip_rest_of_line(&mut self) -> io::Result<LineTail> {
        let mut tail = LineTail {
            skipped: 0,
            terminated: false,
            last: None,
        };
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(tail);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    if end > 0 {
                        tail.last = Some(available[end - 1]);
                    }
                    tail.skipped += end;
                    tail.terminated = true;
                    self.reader.consume(end + 1);
                    return Ok(tail);
                }
                None => {
                    let len = available.len();
                    tail.last = available.last().copied();
                    tail.skipped += len;
                    self.reader.consume(len);
                }
            }
        }
    }

    /// Turn the buffered prefix of an over-long line into a record.
    fn cut_record(&mut self, max: usize) -> io::Result<Record> {
        let tail = self.skip_rest_of_line()?;
        let mut raw_len = self.buffer.len() + tail.skipped;
        let last = tail.last.or_else(|| self.buffer.last().copied());
        if tail.terminated && last == Some(b'\r') {
            raw_len -= 1;
            if tail.skipped == 0 {
                self.buffer.pop();
            }
        }

        let mut bytes = std::mem::take(&mut self.buffer);
        if raw_len <= max {
            // Only the `\r` of a `\r\n` went past the limit
            return Ok(Record::from_bytes(self.next_ordinal, bytes));
        }
        bytes.truncate(max);
        Ok(Record::truncated(self.next_ordinal, bytes, raw_len))
    }

    fn next_record(&mut self) -> io::Result<Option<Record>> {
        if self.read_line()? == 0 {
            return Ok(None);
        }

        let record = match self.max_line_length {
            Some(max) if self.buffer.len() > max && self.buffer.last() != Some(&b'\n') => {
                self.cut_record(max)?
            }
            _ => {
                strip_line_ending(&mut self.buffer);
                Record::from_bytes(self.next_ordinal, std::mem::take(&mut self.buffer))
            }
        };
        self.next_ordinal += 1;
        Ok(Some(record))
    }
}

impl Iterator for RecordSource {
    type Item = Result<Record, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(BatchError::io(self.source_id.clone(), e)))
            }
        }
    }
}

impl std::iter::FusedIterator for RecordSource {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordError;
    use crate::record::{Classification, Classifier};
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn texts(source: RecordSource) -> Vec<String> {
        source.map(|r| r.unwrap().text).collect()
    }

    #[test]
    fn test_exact_record_count_for_any_size() {
        for n in [0usize, 1, 2, 17, 1000] {
            let input: String = (0..n).map(|i| format!("line {}\n", i)).collect();
            let source = RecordSource::new("test", Cursor::new(input.into_bytes()));
            assert_eq!(source.count(), n, "expected exactly {} records", n);
        }
    }

    #[test]
    fn test_final_line_without_newline() {
        let source = RecordSource::new("test", Cursor::new(b"a\nb".to_vec()));
        assert_eq!(texts(source), vec!["a", "b"]);
    }

    #[test]
    fn test_crlf_and_empty_lines() {
        let source = RecordSource::new("test", Cursor::new(b"a\r\n\r\n\nb\n".to_vec()));
        assert_eq!(texts(source), vec!["a", "", "", "b"]);
    }

    #[test]
    fn test_ordinals_start_at_one() {
        let mut source = RecordSource::new("test", Cursor::new(b"x\ny\n".to_vec()));
        assert_eq!(source.next().unwrap().unwrap().ordinal, 1);
        assert_eq!(source.next().unwrap().unwrap().ordinal, 2);
        assert!(source.next().is_none());
        assert!(source.next().is_none());
        assert_eq!(source.records_read(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_still_a_record() {
        let source = RecordSource::new("test", Cursor::new(vec![b'a', b'\n', 0xff, b'\n']));
        let records: Vec<Record> = source.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(records[0].valid_utf8);
        assert!(!records[1].valid_utf8);
    }

    #[test]
    fn test_long_line_is_cut_at_the_limit() {
        let mut input = vec![b'x'; 4 * 1024 * 1024];
        input.extend_from_slice(b"\nerror\n");
        let mut source =
            RecordSource::new("test", Cursor::new(input)).with_max_line_length(Some(16));

        let long = source.next().unwrap().unwrap();
        assert_eq!(long.ordinal, 1);
        assert_eq!(long.raw_len, 4 * 1024 * 1024);
        assert!(long.text.len() <= 16);
        assert!(long.text.capacity() <= 64);
        assert_eq!(
            Classifier::default()
                .with_max_line_length(Some(16))
                .classify(&long),
            Classification::Malformed(RecordError::TooLong {
                len: 4 * 1024 * 1024,
                max: 16
            })
        );

        let next = source.next().unwrap().unwrap();
        assert_eq!((next.ordinal, next.text.as_str()), (2, "error"));
        assert!(source.next().is_none());
    }

    #[test]
    fn test_limit_keeps_lines_that_fit() {
        let source = RecordSource::new("test", Cursor::new(b"abcd\r\nabc\nabcde\nab".to_vec()))
            .with_max_line_length(Some(4));
        let records: Vec<Record> = source.map(|r| r.unwrap()).collect();
        let seen: Vec<(&str, usize)> = records
            .iter()
            .map(|r| (r.text.as_str(), r.raw_len))
            .collect();
        assert_eq!(
            seen,
            vec![("abcd", 4), ("abc", 3), ("abcd", 5), ("ab", 2)]
        );
    }

    #[test]
    fn test_cut_line_with_crlf_and_no_final_newline() {
        let source = RecordSource::new("test", Cursor::new(b"abcdefgh\r\nabcdefgh".to_vec()))
            .with_max_line_length(Some(2));
        let records: Vec<Record> = source.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].text.as_str(), records[0].raw_len), ("ab", 8));
        assert_eq!((records[1].text.as_str(), records[1].raw_len), ("ab", 8));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_read_error_is_yielded_once() {
        let mut source = RecordSource::new("broken.txt", io::BufReader::new(FailingReader));
        match source.next() {
            Some(Err(BatchError::Io { source_id, .. })) => assert_eq!(source_id, "broken.txt"),
            other => panic!("expected Io error, got {:?}", other),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn test_load_missing_file_names_source() {
        let err = load("/definitely/not/here.txt").unwrap_err();
        match err {
            BatchError::Io { source_id, source } => {
                assert_eq!(source_id, "/definitely/not/here.txt");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_gzip_file() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"a\nerror\nb\n").unwrap();
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&encoder.finish().unwrap()).unwrap();
        temp_file.flush().unwrap();

        let source = load(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(texts(source), vec!["a", "error", "b"]);
    }

    #[test]
    fn test_display_source() {
        assert_eq!(display_source("-"), "<stdin>");
        assert_eq!(display_source("in.txt"), "in.txt");
    }
}
