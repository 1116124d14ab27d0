//! Byte limited line buffer.

use std::cmp::Ordering;
use std::io::{self, prelude::*};

use log;
use rayon::prelude::*;

use crate::chunk::ChunkStore;
use crate::error::{ErrorKind, Result, SortError};
use crate::line::{trim_line_ending, LineEnding};

/// In-memory line accumulator.
///
/// Lines are stored without their terminator. The buffer size accounts every line as if it was
/// already written with the configured terminator, so it is exactly the number of bytes
/// [`LineBuffer::flush`] produces.
pub struct LineBuffer {
    line_ending: LineEnding,
    current_size: u64,
    inner: Vec<Vec<u8>>,
}

impl LineBuffer {
    pub fn new(line_ending: LineEnding) -> Self {
        LineBuffer {
            line_ending,
            current_size: 0,
            inner: Vec::new(),
        }
    }

    /// Normalizes the line ending and appends the line to the buffer.
    pub fn append_line(&mut self, line: &[u8]) {
        let line = trim_line_ending(line);
        self.current_size += self.normalized_len(line);
        self.inner.push(line.to_vec());
    }

    /// Checks whether appending the line would make the buffer size exceed `max_size`.
    pub fn will_overflow(&self, line: &[u8], max_size: u64) -> bool {
        self.current_size + self.normalized_len(trim_line_ending(line)) > max_size
    }

    /// Returns the cached buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.current_size
    }

    /// Computes the buffer size from scratch and refreshes the cached value.
    /// Always equals [`LineBuffer::size`]; kept for verification.
    pub fn recompute_size(&mut self) -> u64 {
        let size: u64 = self.inner.iter().map(|line| self.normalized_len(line)).sum();
        self.current_size = size;

        return size;
    }

    /// Returns buffer length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the buffered lines in their current order.
    pub fn lines(&self) -> &[Vec<u8>] {
        &self.inner
    }

    /// Sorts the buffered lines and writes them to the sink, each followed by the line terminator.
    ///
    /// Sorting is stable and runs on the current rayon thread pool.
    pub fn flush<W, F>(&mut self, sink: &mut W, compare: F) -> Result<()>
    where
        W: Write,
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send,
    {
        log::debug!("sorting {} lines ({} bytes) ...", self.inner.len(), self.current_size);
        self.inner.par_sort_by(|a, b| compare(a, b));

        let line_ending = self.line_ending.as_bytes();
        for line in &self.inner {
            sink.write_all(line)
                .and_then(|_| sink.write_all(line_ending))
                .map_err(|err| SortError::with_source(ErrorKind::Write, "failed to write sorted lines", err))?;
        }

        return Ok(());
    }

    /// Allocates a new chunk in the store, flushes the sorted lines into it and returns its handle.
    pub fn persist<S, F>(&mut self, store: &mut S, compare: F) -> Result<S::Handle>
    where
        S: ChunkStore,
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send,
    {
        let (handle, chunk_writer) = store
            .create()
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to create a chunk", err))?;

        let mut chunk_writer = io::BufWriter::new(chunk_writer);
        self.flush(&mut chunk_writer, compare)
            .map_err(|err| err.wrap("failed to dump the chunk"))?;

        chunk_writer.flush().map_err(|err| {
            SortError::with_source(ErrorKind::Write, "failed to dump the chunk", err)
        })?;

        log::debug!("chunk saved ({} lines, {} bytes)", self.inner.len(), self.current_size);

        return Ok(handle);
    }

    fn normalized_len(&self, line: &[u8]) -> u64 {
        (line.len() + self.line_ending.len()) as u64
    }
}
