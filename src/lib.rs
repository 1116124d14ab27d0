//! `ext-line-sort` sorts lines of arbitrarily large text streams.
//!
//! Input that fits into the available memory is sorted in memory. Larger input is sorted with an
//! external K-way merge sort: the first pass splits the input into chunks that each fit in memory,
//! sorts them and stores them as intermediate resources, the second pass merges the sorted chunks
//! into a single sorted output. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Lossless:**
//!   every input line, empty ones and duplicates included, appears exactly once in the output.
//! * **Line ending normalization:**
//!   LF, CR and CRLF terminated input lines are written with one configured terminator.
//! * **Custom ordering:**
//!   any comparator over raw line bytes can be used; byte-wise ascending order is the default.
//! * **Composable primitives:**
//!   [`Chunker`] and [`MergeSorter`] can be used independently of [`LineSorter`], with chunk
//!   storage supplied through the [`ChunkStore`] trait.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_line_sort::{descending, LineSorter, LineSorterBuilder};
//!
//! fn main() {
//!     let sorter: LineSorter = LineSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .with_available_memory(50 * 1024 * 1024)
//!         .build()
//!         .unwrap();
//!
//!     sorter
//!         .sort_file_by(Path::new("input.txt"), Path::new("output.txt"), descending)
//!         .unwrap();
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod error;
pub mod line;
pub mod merger;
pub mod reader;
pub mod sort;
pub mod writer;

pub use buffer::LineBuffer;
pub use chunk::{ChunkStore, Chunker, MemoryChunkStore, TempDirChunkStore};
pub use error::{ErrorKind, Result, SortError};
pub use line::{ascending, descending, LineEnding};
pub use merger::{MergeSorter, MergeState, MergeStrategy};
pub use reader::LineReader;
pub use sort::{LineSorter, LineSorterBuilder, SortStrategy};
pub use writer::LineWriter;
