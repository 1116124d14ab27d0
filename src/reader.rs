//! Sequential line cursor.

use std::io::{self, prelude::*};

use crate::error::{ErrorKind, Result, SortError};

/// Single-pass line cursor over a readable resource.
///
/// Lines are split on LF, CRLF and lone CR; terminators are never part of a returned line.
/// The cursor does not read anything on construction, call [`LineReader::advance`] first.
pub struct LineReader<R> {
    reader: io::BufReader<R>,
    line: Vec<u8>,
    // previous line ended with CR, a directly following LF belongs to it
    skip_lf: bool,
    lines_read: u64,
    is_eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader::from_buf_reader(io::BufReader::new(reader))
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        LineReader::from_buf_reader(io::BufReader::with_capacity(capacity, reader))
    }

    fn from_buf_reader(reader: io::BufReader<R>) -> Self {
        LineReader {
            reader,
            line: Vec::new(),
            skip_lf: false,
            lines_read: 0,
            is_eof: false,
        }
    }

    /// Reads the next line and makes it the current one.
    ///
    /// Fails with [`ErrorKind::EndOfInput`] once the resource is exhausted, and keeps failing the
    /// same way on every following call. Read failures are reported as [`ErrorKind::Scan`].
    pub fn advance(&mut self) -> Result<()> {
        if self.is_eof {
            return Err(SortError::end_of_input());
        }

        self.line.clear();
        let mut has_bytes = false;

        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(SortError::with_source(ErrorKind::Scan, "failed to scan the next line", err));
                }
            };
            if available.is_empty() {
                break;
            }

            let mut start = 0;
            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }

            match available[start..].iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    let end = start + pos;
                    self.skip_lf = available[end] == b'\r';
                    self.line.extend_from_slice(&available[start..end]);
                    self.reader.consume(end + 1);
                    self.lines_read += 1;

                    return Ok(());
                }
                None => {
                    let consumed = available.len();
                    has_bytes |= consumed > start;
                    self.line.extend_from_slice(&available[start..]);
                    self.reader.consume(consumed);
                }
            }
        }

        if !has_bytes {
            self.is_eof = true;
            return Err(SortError::end_of_input());
        }

        // last line without a terminator
        self.lines_read += 1;

        return Ok(());
    }

    /// Returns the most recently read line.
    pub fn current_line(&self) -> &[u8] {
        &self.line
    }

    pub fn is_at_end(&self) -> bool {
        self.is_eof
    }

    /// Returns the number of lines read so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Releases the underlying resource.
    pub fn close(self) {
        log::trace!("closing line reader after {} lines", self.lines_read);
        drop(self.reader);
    }
}
