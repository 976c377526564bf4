//! Incremental record framing for newline-delimited responses.
//!
//! Bytes arrive in arbitrary chunks. [`RecordParser`] accumulates them and
//! hands back one record per delimiter, with line-scanning semantics: the
//! `\n` is removed, as is a single `\r` before it. Whatever follows the last
//! delimiter is held back until the body ends, because the final record of a
//! stream need not be terminated.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::response::RecordParser;
//!
//! let mut parser = RecordParser::new(1024);
//! parser.push(b"{\"row\":1}\r\n{\"ro");
//! assert_eq!(parser.next_record().unwrap().unwrap(), &b"{\"row\":1}"[..]);
//! assert_eq!(parser.next_record().unwrap(), None);
//!
//! parser.push(b"w\":2}");
//! assert_eq!(parser.finish(), &b"{\"row\":2}"[..]);
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{KsqlError, Result};
use crate::protocol::RECORD_DELIMITER;

/// Whether a scanned unit carries data worth publishing.
///
/// Empty units and a bare delimiter are keep-alive noise, never records.
pub fn is_record(unit: &[u8]) -> bool {
    !unit.is_empty() && unit != [RECORD_DELIMITER].as_slice()
}

/// Splits a byte stream into delimiter-separated records.
#[derive(Debug)]
pub struct RecordParser {
    /// Bytes received but not yet returned as a record
    buffer: BytesMut,
    /// Prefix of `buffer` already searched for a delimiter
    scanned: usize,
    /// Longest record accepted
    max_record_len: usize,
}

impl RecordParser {
    /// Create a parser that rejects records longer than `max_record_len`.
    pub fn new(max_record_len: usize) -> Self {
        RecordParser {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            max_record_len,
        }
    }

    /// Append a chunk of body bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete record, if one is buffered.
    ///
    /// # Errors
    ///
    /// [`KsqlError::RecordTooLong`] once the pending record outgrows the
    /// limit; the parser should not be used afterwards.
    pub fn next_record(&mut self) -> Result<Option<Bytes>> {
        let found = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == RECORD_DELIMITER)
            .map(|offset| self.scanned + offset);

        match found {
            Some(pos) => {
                let line = self.buffer.split_to(pos + 1).freeze();
                self.scanned = 0;
                let record = strip_line_ending(line.slice(..pos));
                if record.len() > self.max_record_len {
                    return Err(self.too_long());
                }
                Ok(Some(record))
            }
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_record_len {
                    return Err(self.too_long());
                }
                Ok(None)
            }
        }
    }

    /// Take the unterminated remainder once the body has ended.
    pub fn finish(&mut self) -> Bytes {
        self.scanned = 0;
        strip_line_ending(self.buffer.split().freeze())
    }

    /// The configured record limit.
    pub fn max_record_len(&self) -> usize {
        self.max_record_len
    }

    fn too_long(&self) -> KsqlError {
        KsqlError::RecordTooLong {
            limit: self.max_record_len,
        }
    }
}

fn strip_line_ending(line: Bytes) -> Bytes {
    match line.last() {
        Some(b'\r') => line.slice(..line.len() - 1),
        _ => line,
    }
}

#[cfg(test)]
impl RecordParser {
    fn feed(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.push(data);
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut parser = RecordParser::new(64);
        assert!(parser.feed(b"{\"a\":").unwrap().is_empty());
        let records = parser.feed(b"1}\n{\"b\":2}\n{\"c\"").unwrap();
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(parser.buffered(), 4);
        assert_eq!(parser.finish(), Bytes::from_static(b"{\"c\""));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_carriage_return_stripped() {
        let mut parser = RecordParser::new(64);
        let records = parser.feed(b"a\r\n\r\nb\n").unwrap();
        assert_eq!(records, vec![Bytes::from_static(b"a"), Bytes::new(), Bytes::from_static(b"b")]);
    }

    #[test]
    fn test_empty_lines_are_units_not_records() {
        let mut parser = RecordParser::new(64);
        let records = parser.feed(b"\n\nx\n").unwrap();
        let kept: Vec<_> = records.into_iter().filter(|r| is_record(r)).collect();
        assert_eq!(kept, vec![Bytes::from_static(b"x")]);
    }

    #[test]
    fn test_is_record() {
        assert!(!is_record(b""));
        assert!(!is_record(b"\n"));
        assert!(is_record(b"\n\n"));
        assert!(is_record(b"{}"));
    }

    #[test]
    fn test_record_too_long() {
        let mut parser = RecordParser::new(4);
        assert!(matches!(
            parser.feed(b"abcdef"),
            Err(KsqlError::RecordTooLong { limit: 4 })
        ));

        let mut parser = RecordParser::new(4);
        assert!(matches!(
            parser.feed(b"abcde\n"),
            Err(KsqlError::RecordTooLong { limit: 4 })
        ));

        let mut parser = RecordParser::new(4);
        assert_eq!(parser.feed(b"abcd\r\n").unwrap(), vec![Bytes::from_static(b"abcd")]);
    }
}
