//! Buffered line writer.

use std::io::prelude::*;

use crate::error::{ErrorKind, Result, SortError};
use crate::line::{trim_line_ending, LineEnding};

/// Append-only line sink with an explicit buffer.
///
/// Lines are accumulated up to `max_buf_size` bytes before being written to the sink. The
/// buffer must be drained with [`LineWriter::finalize`] before [`LineWriter::close`] is called,
/// closing a writer holding unflushed bytes fails.
pub struct LineWriter<W: Write> {
    sink: Option<W>,
    line_ending: LineEnding,
    buf: Vec<u8>,
    max_buf_size: usize,
}

// the buffer grows up to `max_buf_size` on demand
const INITIAL_BUF_CAPACITY: usize = 8 * 1024;

impl<W: Write> LineWriter<W> {
    pub fn new(sink: W, max_buf_size: usize, line_ending: LineEnding) -> Self {
        LineWriter {
            sink: Some(sink),
            line_ending,
            buf: Vec::with_capacity(max_buf_size.min(INITIAL_BUF_CAPACITY)),
            max_buf_size,
        }
    }

    /// Buffers the line followed by the line terminator.
    ///
    /// If the line does not fit into the buffer the buffer is flushed to the sink first.
    /// Returns the number of bytes written to the sink, zero if the line was only buffered.
    /// Fails with [`ErrorKind::Resource`] once the writer is closed.
    pub fn write(&mut self, line: &[u8]) -> Result<usize> {
        if self.sink.is_none() {
            return Err(closed_error());
        }

        let line = trim_line_ending(line);
        let line_size = line.len() + self.line_ending.len();

        let mut written = 0;
        if self.buf.len() + line_size > self.max_buf_size {
            written = self
                .flush_buffer()
                .map_err(|err| err.wrap("buffer exceeded the max size but failed to flush"))?;
        }

        self.buf.extend_from_slice(line);
        self.buf.extend_from_slice(self.line_ending.as_bytes());

        return Ok(written);
    }

    /// Writes the remaining buffered bytes to the sink and flushes it.
    pub fn finalize(&mut self) -> Result<()> {
        self.flush_buffer()
            .map_err(|err| err.wrap("failed to flush the remaining buffer"))?;

        let sink = self.sink_mut()?;
        sink.flush()
            .map_err(|err| SortError::with_source(ErrorKind::Write, "failed to flush the sink", err))
    }

    /// Releases the sink. Fails if the buffer still holds bytes not passed to the sink.
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(SortError::new(
                ErrorKind::Write,
                format!("buffer is not empty ({} bytes), finalize before close", self.buf.len()),
            ));
        }

        if let Some(sink) = self.sink.take() {
            drop(sink);
        }

        return Ok(());
    }

    /// Returns the number of buffered bytes not yet written to the sink.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    fn flush_buffer(&mut self) -> Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }

        let size = self.buf.len();
        let sink = self.sink.as_mut().ok_or_else(closed_error)?;
        sink.write_all(&self.buf)
            .map_err(|err| SortError::with_source(ErrorKind::Write, "failed to flush the buffer", err))?;
        self.buf.clear();

        return Ok(size);
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or_else(closed_error)
    }
}

fn closed_error() -> SortError {
    SortError::new(ErrorKind::Resource, "line writer is closed")
}

#[cfg(test)]
mod test {
    use std::io::{self, Write};

    use rstest::*;

    use super::LineWriter;
    use crate::error::ErrorKind;
    use crate::line::LineEnding;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_line_writer_buffers_until_full() {
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, 10, LineEnding::Lf);

        assert_eq!(writer.write(b"abc").unwrap(), 0);
        assert_eq!(writer.write(b"def\r\n").unwrap(), 0);
        assert_eq!(writer.buffered(), 8);
        // "ghi\n" does not fit, the 8 buffered bytes go to the sink first
        assert_eq!(writer.write(b"ghi").unwrap(), 8);
        assert_eq!(writer.buffered(), 4);

        writer.finalize().unwrap();
        assert_eq!(writer.buffered(), 0);
        writer.close().unwrap();

        assert_eq!(output, b"abc\ndef\nghi\n");
    }

    #[test]
    fn test_line_writer_oversized_line() {
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, 4, LineEnding::CrLf);

        assert_eq!(writer.write(b"a").unwrap(), 0);
        assert_eq!(writer.write(b"longer line").unwrap(), 3);
        assert_eq!(writer.buffered(), 13);

        writer.finalize().unwrap();
        writer.close().unwrap();

        assert_eq!(output, b"a\r\nlonger line\r\n");
    }

    #[rstest]
    #[case(1)]
    #[case(64 * 1024)]
    fn test_line_writer_close_requires_finalize(#[case] max_buf_size: usize) {
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, max_buf_size, LineEnding::Lf);
        writer.write(b"pending").unwrap();

        let err = writer.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);

        writer.finalize().unwrap();
        writer.finalize().unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        assert_eq!(output, b"pending\n");
    }

    #[test]
    fn test_line_writer_write_error() {
        let mut writer = LineWriter::new(FailingWriter, 4, LineEnding::Lf);
        writer.write(b"abc").unwrap();

        let err = writer.write(b"def").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);

        let err = writer.finalize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
    }

    #[test]
    fn test_line_writer_closed() {
        let mut writer = LineWriter::new(Vec::new(), 4, LineEnding::Lf);
        writer.close().unwrap();

        let err = writer.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(writer.buffered(), 0);

        let err = writer.finalize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_line_writer_large_buffer_is_allocated_lazily() {
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, usize::MAX, LineEnding::Lf);
        assert!(writer.buf.capacity() <= 8 * 1024);

        writer.write(b"apple").unwrap();
        writer.finalize().unwrap();
        writer.close().unwrap();

        assert_eq!(output, b"apple\n");
    }
}
