//! Line sorter.

use log;
use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use crate::buffer::LineBuffer;
use crate::chunk::{ChunkStore, Chunker, TempDirChunkStore};
use crate::error::{ErrorKind, Result, SortError};
use crate::line::{ascending, LineEnding};
use crate::merger::{MergeSorter, MergeStrategy};
use crate::reader::LineReader;
use crate::writer::LineWriter;

/// Available memory assumed if none is configured (512 MiB).
pub const DEFAULT_AVAILABLE_MEMORY: u64 = 512 * 1024 * 1024;

/// Default read/write buffer size (64 KiB).
pub const DEFAULT_RW_BUF_SIZE: usize = 64 * 1024;

/// Sorting path taken for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStrategy {
    /// All lines are loaded, sorted and written at once.
    InMemory,
    /// Input is split into sorted chunks which are merged afterwards.
    External,
}

/// Line sorter builder. Provides methods for [`LineSorter`] initialization.
#[derive(Clone)]
pub struct LineSorterBuilder {
    /// Number of threads to be used to sort chunk data.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Memory available for sorting, in bytes.
    available_memory: u64,
    /// Use external sort even if the input fits in memory.
    force_external: bool,
    /// Read/write buffer size.
    rw_buf_size: usize,
    /// Output line terminator.
    line_ending: LineEnding,
}

impl LineSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        LineSorterBuilder::default()
    }

    /// Builds a [`LineSorter`] instance using provided configuration.
    pub fn build(self) -> Result<LineSorter> {
        if self.rw_buf_size == 0 {
            return Err(SortError::invalid_argument("read/write buffer size must be positive"));
        }

        return Ok(LineSorter {
            thread_pool: LineSorter::init_thread_pool(self.threads_number)?,
            tmp_dir: self.tmp_dir,
            available_memory: self.available_memory,
            force_external: self.force_external,
            rw_buf_size: self.rw_buf_size,
            line_ending: self.line_ending,
        });
    }

    /// Sets number of threads to be used to sort chunk data.
    pub fn with_threads_number(mut self, threads_number: usize) -> LineSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> LineSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets the amount of memory available for sorting. It decides whether the input is sorted
    /// in memory and is used as the chunk size otherwise.
    pub fn with_available_memory(mut self, available_memory: u64) -> LineSorterBuilder {
        self.available_memory = available_memory;
        return self;
    }

    /// Forces external sorting regardless of the input size.
    pub fn with_force_external(mut self, force_external: bool) -> LineSorterBuilder {
        self.force_external = force_external;
        return self;
    }

    /// Sets read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> LineSorterBuilder {
        self.rw_buf_size = buf_size;
        return self;
    }

    /// Sets output line terminator.
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> LineSorterBuilder {
        self.line_ending = line_ending;
        return self;
    }
}

impl Default for LineSorterBuilder {
    fn default() -> Self {
        LineSorterBuilder {
            threads_number: None,
            tmp_dir: None,
            available_memory: DEFAULT_AVAILABLE_MEMORY,
            force_external: false,
            rw_buf_size: DEFAULT_RW_BUF_SIZE,
            line_ending: LineEnding::default(),
        }
    }
}

/// Line sorter. Sorts the input in memory if it fits into the available memory, otherwise
/// splits it into sorted chunks and merges them.
pub struct LineSorter {
    /// Chunk sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Memory available for sorting, in bytes.
    available_memory: u64,
    /// Use external sort even if the input fits in memory.
    force_external: bool,
    /// Read/write buffer size.
    rw_buf_size: usize,
    /// Output line terminator.
    line_ending: LineEnding,
}

impl LineSorter {
    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "thread pool initialization failed", err))?;

        return Ok(thread_pool);
    }

    /// Returns the sorting path that would be taken for an input of the given size.
    pub fn strategy(&self, input_size: u64) -> SortStrategy {
        if input_size <= self.available_memory && !self.force_external {
            SortStrategy::InMemory
        } else {
            SortStrategy::External
        }
    }

    /// Sorts input lines in byte-wise ascending order and writes them to the output.
    /// Returns the sorting path taken.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `input_size` - Input size in bytes
    /// * `output` - Output stream sorted lines are written to
    pub fn sort<R, W>(&self, input: R, input_size: u64, output: W) -> Result<SortStrategy>
    where
        R: Read + Send,
        W: Write + Send,
    {
        self.sort_by(input, input_size, output, ascending)
    }

    /// Sorts input lines using a custom compare function and writes them to the output.
    /// Returns the sorting path taken.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `input_size` - Input size in bytes
    /// * `output` - Output stream sorted lines are written to
    /// * `compare` - Function to be used to compare lines
    pub fn sort_by<R, W, F>(&self, input: R, input_size: u64, output: W, compare: F) -> Result<SortStrategy>
    where
        R: Read + Send,
        W: Write + Send,
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
    {
        let strategy = self.strategy(input_size);
        log::info!(
            "sorting {} bytes of input (available memory: {} bytes, strategy: {:?})",
            input_size,
            self.available_memory,
            strategy
        );

        self.thread_pool.install(|| match strategy {
            SortStrategy::InMemory => self
                .sort_in_memory(input, output, compare)
                .map_err(|err| err.wrap("failed to sort in memory")),
            SortStrategy::External => self
                .sort_external(input, input_size, output, compare)
                .map_err(|err| err.wrap("failed to sort by external merge sort")),
        })?;

        return Ok(strategy);
    }

    /// Sorts lines of the input file in byte-wise ascending order and stores the result in the
    /// output file.
    pub fn sort_file(&self, input_path: &Path, output_path: &Path) -> Result<SortStrategy> {
        self.sort_file_by(input_path, output_path, ascending)
    }

    /// Sorts lines of the input file using a custom compare function and stores the result in
    /// the output file.
    pub fn sort_file_by<F>(&self, input_path: &Path, output_path: &Path, compare: F) -> Result<SortStrategy>
    where
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
    {
        if !input_path.is_file() {
            return Err(SortError::invalid_argument(format!(
                "input file {} does not exist",
                input_path.display()
            )));
        }

        let canonical_input = input_path
            .canonicalize()
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to resolve the input path", err))?;
        if output_path.canonicalize().map_or(false, |path| path == canonical_input) {
            return Err(SortError::invalid_argument(format!(
                "output file {} is the input file",
                output_path.display()
            )));
        }

        let input = fs::File::open(input_path)
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to open the input file", err))?;
        let input_size = input
            .metadata()
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to get the input file size", err))?
            .len();
        let output = fs::File::create(output_path)
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to create the output file", err))?;

        return self.sort_by(input, input_size, output, compare);
    }

    fn sort_in_memory<R, W, F>(&self, input: R, output: W, compare: F) -> Result<()>
    where
        R: Read,
        W: Write,
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
    {
        let mut reader = LineReader::with_capacity(self.rw_buf_size, input);
        let mut buffer = LineBuffer::new(self.line_ending);

        loop {
            match reader.advance() {
                Ok(()) => buffer.append_line(reader.current_line()),
                Err(err) if err.is_end_of_input() => break,
                Err(err) => return Err(err.wrap("failed to read the input")),
            }
        }
        reader.close();

        let mut output = io::BufWriter::with_capacity(self.rw_buf_size, output);
        buffer
            .flush(&mut output, compare)
            .map_err(|err| err.wrap("failed to write the output"))?;
        output
            .flush()
            .map_err(|err| SortError::with_source(ErrorKind::Write, "failed to flush the output", err))?;

        log::debug!("in-memory sort done ({} lines)", buffer.len());

        return Ok(());
    }

    fn sort_external<R, W, F>(&self, input: R, input_size: u64, output: W, compare: F) -> Result<()>
    where
        R: Read,
        W: Write,
        F: Fn(&[u8], &[u8]) -> Ordering + Sync + Send + Copy,
    {
        let chunk_size = self.available_memory.min(input_size).max(1);

        let mut store = TempDirChunkStore::new(self.tmp_dir.as_deref())
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "temporary directory not created", err))?;

        let handles = Chunker::new(&mut store, chunk_size, compare)
            .with_line_ending(self.line_ending)
            .split(input, input_size)
            .map_err(|err| err.wrap("failed to split the input into chunks"))?;

        log::debug!("external sort preparation done ({} chunks)", handles.len());

        if handles.is_empty() {
            log::debug!("input is empty, nothing to merge");
        } else {
            let mut cursors = Vec::with_capacity(handles.len());
            for handle in &handles {
                let chunk = store.open(handle).map_err(|err| {
                    SortError::with_source(
                        ErrorKind::Resource,
                        format!("failed to open the chunk {}", handle.display()),
                        err,
                    )
                })?;
                cursors.push(LineReader::with_capacity(self.rw_buf_size, chunk));
            }

            let strategy = MergeStrategy::for_chunks(cursors.len());
            let mut writer = LineWriter::new(output, self.rw_buf_size, self.line_ending);

            MergeSorter::new(&mut cursors, &mut writer, compare)
                .with_strategy(strategy)
                .sort()
                .map_err(|err| err.wrap("failed to merge sort the chunks"))?;

            for cursor in cursors {
                cursor.close();
            }
            writer.close().map_err(|err| err.wrap("failed to close the output"))?;
        }

        store
            .close()
            .map_err(|err| SortError::with_source(ErrorKind::Resource, "failed to remove temporary directory", err))?;

        return Ok(());
    }
}
