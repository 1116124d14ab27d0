//! Sorted chunks: storage and input splitting.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log;
use tempfile;

use crate::buffer::LineBuffer;
use crate::error::{Result, SortError};
use crate::line::LineEnding;
use crate::reader::LineReader;

/// Chunk storage interface. Creates intermediate resources chunks are persisted to and opens them
/// back for reading.
pub trait ChunkStore {
    /// Opaque chunk identifier.
    type Handle;
    /// Chunk writer type.
    type Writer: Write;
    /// Chunk reader type.
    type Reader: Read;

    /// Allocates a new empty chunk.
    fn create(&mut self) -> io::Result<(Self::Handle, Self::Writer)>;

    /// Opens an existing chunk for reading from its beginning.
    fn open(&self, handle: &Self::Handle) -> io::Result<Self::Reader>;
}

/// Chunk store keeping every chunk in its own file inside a temporary directory.
/// Chunk files are removed when the store is dropped or closed.
pub struct TempDirChunkStore {
    dir: tempfile::TempDir,
    chunks_created: usize,
}

impl TempDirChunkStore {
    /// Creates a store in a new temporary directory.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory the temporary directory is created in. If the parameter is [`None`]
    ///   default OS temporary directory will be used.
    pub fn new(tmp_path: Option<&Path>) -> io::Result<Self> {
        let dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }?;

        log::info!("using {} as a temporary directory", dir.path().display());

        return Ok(TempDirChunkStore { dir, chunks_created: 0 });
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the number of chunks created so far.
    pub fn len(&self) -> usize {
        self.chunks_created
    }

    pub fn is_empty(&self) -> bool {
        self.chunks_created == 0
    }

    /// Removes the temporary directory with all chunk files.
    pub fn close(self) -> io::Result<()> {
        log::debug!("removing temporary directory {}", self.dir.path().display());
        self.dir.close()
    }
}

impl ChunkStore for TempDirChunkStore {
    type Handle = PathBuf;
    type Writer = fs::File;
    type Reader = fs::File;

    fn create(&mut self) -> io::Result<(PathBuf, fs::File)> {
        let (file, path) = tempfile::Builder::new()
            .prefix("chunk-")
            .tempfile_in(self.dir.path())?
            .keep()
            .map_err(|err| err.error)?;

        self.chunks_created += 1;

        return Ok((path, file));
    }

    fn open(&self, handle: &PathBuf) -> io::Result<fs::File> {
        fs::File::open(handle)
    }
}

/// Chunk store keeping chunks in memory. Suitable for tests and small inputs.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: Vec<Arc<Mutex<Vec<u8>>>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        MemoryChunkStore::default()
    }

    /// Returns a copy of the chunk content.
    pub fn contents(&self, handle: &usize) -> Option<Vec<u8>> {
        let chunk = self.chunks.get(*handle)?;
        let data = chunk.lock().ok()?;

        Some(data.clone())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    type Handle = usize;
    type Writer = MemoryChunkWriter;
    type Reader = io::Cursor<Vec<u8>>;

    fn create(&mut self) -> io::Result<(usize, MemoryChunkWriter)> {
        let data = Arc::new(Mutex::new(Vec::new()));
        self.chunks.push(data.clone());

        return Ok((self.chunks.len() - 1, MemoryChunkWriter { data }));
    }

    fn open(&self, handle: &usize) -> io::Result<io::Cursor<Vec<u8>>> {
        let chunk = self
            .chunks
            .get(*handle)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("chunk {} not found", handle)))?;
        let data = chunk.lock().map_err(|_| poisoned())?;

        return Ok(io::Cursor::new(data.clone()));
    }
}

/// Writer appending to a [`MemoryChunkStore`] chunk.
pub struct MemoryChunkWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().map_err(|_| poisoned())?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "chunk lock poisoned")
}

/// Input splitter. Reads the input line by line and persists it as a list of individually sorted
/// chunks, each at most `chunk_size` bytes unless a single line is larger than that.
pub struct Chunker<'a, S, F>
where
    S: ChunkStore,
    F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
{
    /// Store chunks are persisted to.
    store: &'a mut S,
    /// Chunk byte budget.
    chunk_size: u64,
    /// Line comparator. Must be the one used later to merge the chunks.
    compare: F,
    /// Terminator chunk lines are written with.
    line_ending: LineEnding,
}

impl<'a, S, F> Chunker<'a, S, F>
where
    S: ChunkStore,
    F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
{
    pub fn new(store: &'a mut S, chunk_size: u64, compare: F) -> Self {
        Chunker {
            store,
            chunk_size,
            compare,
            line_ending: LineEnding::default(),
        }
    }

    /// Sets the terminator chunk lines are written with.
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        return self;
    }

    /// Splits the input into sorted chunks and returns their handles in creation order.
    ///
    /// A line that would overflow the current chunk starts the next one. The first line of a
    /// chunk is always accepted, so every chunk holds at least one line. Any failure aborts the
    /// whole split; chunks created before the failure stay in the store.
    ///
    /// # Arguments
    /// * `input` - Input stream lines are read from
    /// * `input_size` - Total input size in bytes, used for progress reporting only
    pub fn split<R: Read>(&mut self, input: R, input_size: u64) -> Result<Vec<S::Handle>> {
        if self.chunk_size == 0 {
            return Err(SortError::invalid_argument("chunk size must be positive"));
        }

        log::debug!(
            "splitting {} bytes of input into chunks of at most {} bytes",
            input_size,
            self.chunk_size
        );

        let mut reader = LineReader::new(input);
        let mut handles = Vec::new();

        let mut has_line = next_line(&mut reader)?;
        while has_line {
            let mut buffer = LineBuffer::new(self.line_ending);

            while has_line {
                let line = reader.current_line();
                if !buffer.is_empty() && buffer.will_overflow(line, self.chunk_size) {
                    // the line stays current and opens the next chunk
                    break;
                }
                buffer.append_line(line);
                has_line = next_line(&mut reader)?;
            }

            let handle = buffer
                .persist(&mut *self.store, self.compare)
                .map_err(|err| err.wrap(format!("failed to dump chunk {}", handles.len())))?;
            handles.push(handle);
        }

        log::debug!("input split into {} chunks ({} lines)", handles.len(), reader.lines_read());
        reader.close();

        return Ok(handles);
    }
}

fn next_line<R: Read>(reader: &mut LineReader<R>) -> Result<bool> {
    match reader.advance() {
        Ok(()) => Ok(true),
        Err(err) if err.is_end_of_input() => Ok(false),
        Err(err) => Err(err.wrap("failed to split the input into chunks")),
    }
}
