//! `Read` implementations that hand out input in planned pieces.

use crate::chunking::ChunkPlan;
use std::collections::VecDeque;
use std::io::{self, Read};

/// Yields at most one planned chunk per `read` call.
#[derive(Debug)]
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
    reads: usize,
}

impl ChunkedReader {
    pub fn new(input: &str, plan: &ChunkPlan) -> Self {
        Self::from_chunks(plan.byte_chunks(input))
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            current: Vec::new(),
            offset: 0,
            reads: 0,
        }
    }

    /// Number of `read` calls that returned data.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.offset >= self.current.len() {
            match self.chunks.pop_front() {
                Some(next) => {
                    self.current = next;
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }
        let rest = &self.current[self.offset..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.offset += n;
        self.reads += 1;
        Ok(n)
    }
}

/// Serves `prefix`, then fails every later read with `kind`.
#[derive(Debug)]
pub struct FailingReader {
    inner: ChunkedReader,
    kind: io::ErrorKind,
    message: &'static str,
}

impl FailingReader {
    pub fn new(prefix: &str, plan: &ChunkPlan, kind: io::ErrorKind, message: &'static str) -> Self {
        Self {
            inner: ChunkedReader::new(prefix, plan),
            kind,
            message,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 if !buf.is_empty() => Err(io::Error::new(self.kind, self.message)),
            n => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_reader_never_merges_chunks() {
        let mut reader = ChunkedReader::new("abcdef", &ChunkPlan::sizes(vec![2, 3]));
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.reads(), 3);
    }

    #[test]
    fn small_buffers_drain_a_chunk_over_several_reads() {
        let mut reader = ChunkedReader::new("abcd", &ChunkPlan::fixed(4));
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn failing_reader_errors_after_the_prefix() {
        let mut reader = FailingReader::new(
            "<p>",
            &ChunkPlan::fixed(8),
            io::ErrorKind::ConnectionReset,
            "peer went away",
        );
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
