//! Line-oriented reading over chunked byte streams.

use std::collections::VecDeque;
use std::io::{self, Read};

use crate::constants::DEFAULT_READ_CHUNK_SIZE;

/// A line source that distinguishes lines already buffered from lines that
/// need another read from the underlying stream.
///
/// Parsers use [`has_buffered_line`](Self::has_buffered_line) to decide when
/// to yield before pulling the next chunk.
pub trait BufferedLineReader {
    /// Whether a complete line is available without reading.
    fn has_buffered_line(&self) -> bool;

    /// Pop a line from the buffer without reading.
    fn next_buffered_line(&mut self) -> Option<String>;

    /// Read the next chunk. Returns false once the stream is exhausted.
    fn fill(&mut self) -> io::Result<bool>;

    /// The next line, reading as many chunks as needed. `None` at end of stream.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.next_buffered_line() {
                return Ok(Some(line));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }
}

/// [`BufferedLineReader`] over any [`Read`], pulling fixed-size chunks.
///
/// Lines are split on `\n` and decoded as UTF-8. A final line without a
/// terminating newline is still returned.
pub struct ChunkedLineReader<R> {
    inner: R,
    chunk: Vec<u8>,
    /// Bytes of a line that is not complete yet
    partial: Vec<u8>,
    lines: VecDeque<String>,
    done: bool,
}

impl<R: Read> ChunkedLineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_READ_CHUNK_SIZE)
    }

    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk: vec![0; chunk_size.max(1)],
            partial: Vec::new(),
            lines: VecDeque::new(),
            done: false,
        }
    }

    fn push_line(&mut self, bytes: Vec<u8>) -> io::Result<()> {
        let line = String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.lines.push_back(line);
        Ok(())
    }
}

impl<R: Read> BufferedLineReader for ChunkedLineReader<R> {
    fn has_buffered_line(&self) -> bool {
        !self.lines.is_empty()
    }

    fn next_buffered_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    fn fill(&mut self) -> io::Result<bool> {
        if self.done {
            return Ok(false);
        }
        let read = loop {
            match self.inner.read(&mut self.chunk) {
                Ok(read) => break read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if read == 0 {
            self.done = true;
            if self.partial.is_empty() {
                return Ok(false);
            }
            let last = std::mem::take(&mut self.partial);
            self.push_line(last)?;
            return Ok(true);
        }

        let mut start = 0;
        for position in 0..read {
            if self.chunk[position] == b'\n' {
                let mut line = std::mem::take(&mut self.partial);
                line.extend_from_slice(&self.chunk[start..position]);
                self.push_line(line)?;
                start = position + 1;
            }
        }
        self.partial.extend_from_slice(&self.chunk[start..read]);
        Ok(true)
    }
}
