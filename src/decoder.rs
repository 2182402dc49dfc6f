//! Incremental NDJSON decoding over a blocking byte stream.
//!
//! Chunks arrive in transport order with no alignment to record boundaries.
//! A record is only yielded once its terminating `\n` has been seen; an
//! unterminated tail at end of stream is discarded.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::MolgenError;

const READ_BUFFER_BYTES: usize = 8 * 1024;

#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line completed by `chunk`, without separators.
    /// Blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|byte| *byte == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
        lines
    }

    /// Ends the stream. Returns the size of a non-blank unterminated tail,
    /// which is dropped rather than parsed.
    pub fn finish(&mut self) -> Option<usize> {
        let tail = std::mem::take(&mut self.pending);
        if tail.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(tail.len())
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub lines: usize,
    pub malformed: usize,
    pub discarded_tail_bytes: usize,
}

/// Lazily yields one JSON value per complete line read from `reader`.
///
/// Malformed lines are logged and skipped. A read error is yielded once and
/// ends the iteration.
pub struct RecordDecoder<R> {
    reader: R,
    splitter: LineSplitter,
    ready: VecDeque<Vec<u8>>,
    buffer: Box<[u8]>,
    stats: DecodeStats,
    done: bool,
}

impl<R: Read> RecordDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            splitter: LineSplitter::new(),
            ready: VecDeque::new(),
            buffer: vec![0u8; READ_BUFFER_BYTES].into_boxed_slice(),
            stats: DecodeStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn fill(&mut self) -> Result<bool, MolgenError> {
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(0) => {
                    if let Some(bytes) = self.splitter.finish() {
                        warn!(bytes, "discarding unterminated record at end of stream");
                        self.stats.discarded_tail_bytes = bytes;
                    }
                    return Ok(false);
                }
                Ok(read) => {
                    let lines = self.splitter.push(&self.buffer[..read]);
                    if !lines.is_empty() {
                        self.ready.extend(lines);
                        return Ok(true);
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MolgenError::ServiceHttp(err.to_string())),
            }
        }
    }
}

impl<R: Read> Iterator for RecordDecoder<R> {
    type Item = Result<Value, MolgenError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                self.stats.lines += 1;
                match parse_line(&line) {
                    Ok(value) => return Some(Ok(value)),
                    Err(reason) => {
                        self.stats.malformed += 1;
                        warn!(line = self.stats.lines, %reason, "skipping malformed record");
                        continue;
                    }
                }
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                }
                Err(err) => {
                    self.done = true;
                    self.ready.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RecordDecoder<R> {}

fn parse_line(line: &[u8]) -> Result<Value, String> {
    let text = std::str::from_utf8(line).map_err(|err| err.to_string())?;
    serde_json::from_str(text).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    struct Chunked {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Chunked {
        fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(chunk)) => {
                    let len = chunk.len().min(buf.len());
                    buf[..len].copy_from_slice(&chunk[..len]);
                    if len < chunk.len() {
                        self.chunks.push_front(Ok(chunk[len..].to_vec()));
                    }
                    Ok(len)
                }
            }
        }
    }

    const BODY: &str = concat!(
        "{\"status\":\"success\",\"smiles\":\"CCO\",\"molecule_number\":1}\n",
        "\n",
        "{\"status\":\"failed\"}\r\n",
        "{\"status\":\"success\",\"smiles\":\"c1ccccc1\",\"note\":\"é\",\"molecule_number\":2}\n",
    );

    fn decode_all<R: Read>(reader: R) -> Vec<Value> {
        RecordDecoder::new(reader).map(|item| item.unwrap()).collect()
    }

    #[test]
    fn splitter_holds_partial_lines() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"{\"a\":").is_empty());
        assert_eq!(splitter.pending_len(), 5);
        let lines = splitter.push(b"1}\n{\"b\"");
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec()]);
        assert_eq!(splitter.finish(), Some(4));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn chunking_does_not_change_records() {
        let expected = decode_all(Cursor::new(BODY.as_bytes().to_vec()));
        assert_eq!(expected.len(), 3);

        let bytes = BODY.as_bytes();
        for size in 1..=bytes.len() {
            let chunks = bytes
                .chunks(size)
                .map(|chunk| Ok(chunk.to_vec()))
                .collect::<Vec<_>>();
            assert_eq!(decode_all(Chunked::new(chunks)), expected, "chunk size {size}");
        }
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let bytes = "{\"name\":\"é\"}\n".as_bytes();
        let split = bytes.iter().position(|byte| *byte == 0xC3).unwrap() + 1;
        let reader = Chunked::new(vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())]);
        assert_eq!(decode_all(reader), vec![json!({"name": "é"})]);
    }

    #[test]
    fn malformed_line_does_not_stop_stream() {
        let body = "{\"n\":1}\n{not json}\n{\"n\":2}\n";
        let mut decoder = RecordDecoder::new(Cursor::new(body));
        let values = decoder.by_ref().map(|item| item.unwrap()).collect::<Vec<_>>();
        assert_eq!(values, vec![json!({"n": 1}), json!({"n": 2})]);
        assert_eq!(decoder.stats().malformed, 1);
        assert_eq!(decoder.stats().lines, 3);
    }

    #[test]
    fn unterminated_tail_is_discarded() {
        let mut decoder = RecordDecoder::new(Cursor::new("{\"n\":1}\n{\"n\":2}"));
        let values = decoder.by_ref().map(|item| item.unwrap()).collect::<Vec<_>>();
        assert_eq!(values, vec![json!({"n": 1})]);
        assert_eq!(decoder.stats().discarded_tail_bytes, 7);
    }

    #[test]
    fn read_error_is_reported_once() {
        let reader = Chunked::new(vec![
            Ok(b"{\"n\":1}\n".to_vec()),
            Err(io::Error::new(ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let mut decoder = RecordDecoder::new(reader);
        assert_eq!(decoder.next().unwrap().unwrap(), json!({"n": 1}));
        assert_matches!(decoder.next(), Some(Err(MolgenError::ServiceHttp(_))));
        assert!(decoder.next().is_none());
    }
}
