//! Buffered line writing.

use std::io::{self, Write};

use crate::constants::DEFAULT_WRITE_BUFFER_SIZE;

/// Collects small writes and passes them on in buffer-sized blocks.
///
/// The buffer is flushed when full, on [`close`](Self::close), and on drop.
pub struct BufferedWriter<W: Write> {
    inner: Option<W>,
    buffer: Vec<u8>,
    capacity: usize,
    bytes_written: usize,
}

impl<W: Write> BufferedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_WRITE_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Some(inner),
            buffer: Vec::with_capacity(capacity),
            capacity,
            bytes_written: 0,
        }
    }

    /// Append `line` and a newline.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Pass the buffered bytes on to the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(io::Error::other("writer already closed"));
        };
        if !self.buffer.is_empty() {
            inner.write_all(&self.buffer)?;
            self.bytes_written += self.buffer.len();
            self.buffer.clear();
        }
        inner.flush()
    }

    /// Flush and hand back the underlying writer.
    pub fn close(mut self) -> io::Result<W> {
        self.flush()?;
        self.inner
            .take()
            .ok_or_else(|| io::Error::other("writer already closed"))
    }

    /// Bytes passed on to the underlying writer so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

impl<W: Write> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && !self.buffer.is_empty() {
            if let Err(e) = self.flush() {
                log::warn!("Failed to flush {} buffered bytes on drop: {}", self.buffer.len(), e);
            }
        }
    }
}
