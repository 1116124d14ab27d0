//! K-way merge of sorted chunks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::prelude::*;

use log;

use crate::error::{Result, SortError};
use crate::reader::LineReader;
use crate::writer::LineWriter;

/// Number of chunks above which [`MergeStrategy::for_chunks`] selects the binary heap.
pub const HEAP_MERGE_THRESHOLD: usize = 16;

/// Merge sorter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Cursors are not primed yet.
    Initializing,
    /// Lines are being merged.
    Running,
    /// Every cursor is exhausted and the output is finalized.
    Done,
}

/// Least line selection strategy. Both strategies produce identical output: among equal lines
/// the one from the cursor with the lowest index is taken first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Linear scan over all cursors, *m* \* *n* comparisons in total.
    #[default]
    Linear,
    /// Binary heap, *m* \* log(*n*) comparisons in total.
    Heap,
}

impl MergeStrategy {
    /// Selects a strategy suitable for the given number of chunks.
    pub fn for_chunks(chunks_number: usize) -> Self {
        if chunks_number > HEAP_MERGE_THRESHOLD {
            MergeStrategy::Heap
        } else {
            MergeStrategy::Linear
        }
    }
}

/// Merge sorter implementation.
/// Merges lines of multiple sorted chunk cursors into a single sorted output.
/// Time complexity is *m* \* *n* with the linear strategy and *m* \* log(*n*) with the heap
/// strategy, where *m* is the number of lines and *n* is the number of chunks (cursors).
pub struct MergeSorter<'a, R, W, F>
where
    R: Read,
    W: Write,
    F: Fn(&[u8], &[u8]) -> Ordering + Copy,
{
    cursors: &'a mut [LineReader<R>],
    writer: &'a mut LineWriter<W>,
    compare: F,
    strategy: MergeStrategy,
    state: MergeState,
    exhausted: Vec<bool>,
    remaining: usize,
    lines_written: u64,
}

impl<'a, R, W, F> MergeSorter<'a, R, W, F>
where
    R: Read,
    W: Write,
    F: Fn(&[u8], &[u8]) -> Ordering + Copy,
{
    /// Creates a merge sorter over fresh (not yet advanced) cursors.
    /// Chunk lines should be sorted with `compare` otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `cursors` - Chunk cursors to be merged in a single sorted output
    /// * `writer` - Writer the merged lines are written to
    /// * `compare` - Function used to compare lines
    pub fn new(cursors: &'a mut [LineReader<R>], writer: &'a mut LineWriter<W>, compare: F) -> Self {
        let chunks_number = cursors.len();

        return MergeSorter {
            cursors,
            writer,
            compare,
            strategy: MergeStrategy::default(),
            state: MergeState::Initializing,
            exhausted: vec![false; chunks_number],
            remaining: chunks_number,
            lines_written: 0,
        };
    }

    /// Sets least line selection strategy.
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        return self;
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Returns the number of lines passed to the writer so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Merges all cursors into the writer and finalizes it.
    ///
    /// Fails without writing anything if there are no cursors. Any read or write failure
    /// aborts the merge; lines already passed to the writer are left there.
    pub fn sort(&mut self) -> Result<()> {
        if self.state != MergeState::Initializing {
            return Err(SortError::invalid_argument("merge has already been run"));
        }
        if self.cursors.is_empty() {
            return Err(SortError::no_input_chunks());
        }

        log::debug!("merging {} chunks ({:?} strategy) ...", self.cursors.len(), self.strategy);

        self.prime()?;
        self.state = MergeState::Running;

        match self.strategy {
            MergeStrategy::Linear => self.merge_linear()?,
            MergeStrategy::Heap => self.merge_heap()?,
        }

        self.writer
            .finalize()
            .map_err(|err| err.wrap("failed to dump the remaining buffer"))?;
        self.state = MergeState::Done;

        log::debug!("merge done ({} lines)", self.lines_written);

        return Ok(());
    }

    fn prime(&mut self) -> Result<()> {
        for idx in 0..self.cursors.len() {
            match self.cursors[idx].advance() {
                Ok(()) => {}
                Err(err) if err.is_end_of_input() => self.mark_exhausted(idx),
                Err(err) => {
                    return Err(err.wrap(format!("failed to read the first line of chunk {}", idx)));
                }
            }
        }

        return Ok(());
    }

    fn merge_linear(&mut self) -> Result<()> {
        while self.remaining > 0 {
            let mut least: Option<usize> = None;

            for idx in 0..self.cursors.len() {
                if self.exhausted[idx] {
                    continue;
                }
                // strictly less only, the lowest index wins among equal lines
                let is_least = match least {
                    None => true,
                    Some(least_idx) => {
                        let line = self.cursors[idx].current_line();
                        (self.compare)(line, self.cursors[least_idx].current_line()) == Ordering::Less
                    }
                };
                if is_least {
                    least = Some(idx);
                }
            }

            let idx = match least {
                Some(idx) => idx,
                None => break,
            };

            self.writer
                .write(self.cursors[idx].current_line())
                .map_err(|err| err.wrap("failed to write the line"))?;
            self.lines_written += 1;

            self.forward(idx)?;
        }

        return Ok(());
    }

    fn merge_heap(&mut self) -> Result<()> {
        let compare = self.compare;
        let mut items = BinaryHeap::with_capacity(self.remaining);

        for idx in 0..self.cursors.len() {
            if !self.exhausted[idx] {
                items.push(HeapItem {
                    line: self.cursors[idx].current_line().to_vec(),
                    idx,
                    compare,
                });
            }
        }

        while let Some(mut item) = items.pop() {
            self.writer
                .write(&item.line)
                .map_err(|err| err.wrap("failed to write the line"))?;
            self.lines_written += 1;

            if self.forward(item.idx)? {
                item.line.clear();
                item.line.extend_from_slice(self.cursors[item.idx].current_line());
                items.push(item);
            }
        }

        return Ok(());
    }

    /// Advances the cursor. Returns `false` if the cursor got exhausted.
    fn forward(&mut self, idx: usize) -> Result<bool> {
        match self.cursors[idx].advance() {
            Ok(()) => Ok(true),
            Err(err) if err.is_end_of_input() => {
                self.mark_exhausted(idx);
                Ok(false)
            }
            Err(err) => Err(err.wrap(format!("failed to read the next line of chunk {}", idx))),
        }
    }

    fn mark_exhausted(&mut self, idx: usize) {
        if !self.exhausted[idx] {
            self.exhausted[idx] = true;
            self.remaining -= 1;
        }
    }
}

/// Heap item ordered so that the max-heap pops the least line first, and among equal lines the
/// one with the lowest chunk index.
struct HeapItem<F> {
    line: Vec<u8>,
    idx: usize,
    compare: F,
}

impl<F: Fn(&[u8], &[u8]) -> Ordering> Ord for HeapItem<F> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&other.line, &self.line).then_with(|| other.idx.cmp(&self.idx))
    }
}

impl<F: Fn(&[u8], &[u8]) -> Ordering> PartialOrd for HeapItem<F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<F: Fn(&[u8], &[u8]) -> Ordering> PartialEq for HeapItem<F> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<F: Fn(&[u8], &[u8]) -> Ordering> Eq for HeapItem<F> {}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use std::io::{self, Read, Write};

    use rstest::*;

    use super::{MergeSorter, MergeState, MergeStrategy};
    use crate::error::ErrorKind;
    use crate::line::{ascending, descending, LineEnding};
    use crate::reader::LineReader;
    use crate::writer::LineWriter;

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "input/output error"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "broken pipe"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn cursors(chunks: &[&'static str]) -> Vec<LineReader<Box<dyn Read>>> {
        chunks
            .iter()
            .map(|chunk| LineReader::new(Box::new(chunk.as_bytes()) as Box<dyn Read>))
            .collect()
    }

    fn merge<F>(chunks: &[&'static str], strategy: MergeStrategy, compare: F) -> String
    where
        F: Fn(&[u8], &[u8]) -> Ordering + Copy,
    {
        let mut cursors = cursors(chunks);
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, 8, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, compare).with_strategy(strategy);
        assert_eq!(merger.state(), MergeState::Initializing);
        merger.sort().unwrap();
        assert_eq!(merger.state(), MergeState::Done);
        writer.close().unwrap();

        String::from_utf8(output).unwrap()
    }

    fn first_byte(a: &[u8], b: &[u8]) -> Ordering {
        a[..1].cmp(&b[..1])
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter(#[case] strategy: MergeStrategy) {
        let chunks = ["Alice\nCarol\n", "Bob\n", "Dave\n"];
        assert_eq!(merge(&chunks, strategy, ascending), "Alice\nBob\nCarol\nDave\n");
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_descending(#[case] strategy: MergeStrategy) {
        let chunks = ["c\na\n", "b\n"];
        assert_eq!(merge(&chunks, strategy, descending), "c\nb\na\n");
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_exhausted_chunks(#[case] strategy: MergeStrategy) {
        let chunks = ["", "4\n5\n7\n", "", "1\n6\n", "3", ""];
        assert_eq!(merge(&chunks, strategy, ascending), "1\n3\n4\n5\n6\n7\n");
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_all_chunks_empty(#[case] strategy: MergeStrategy) {
        assert_eq!(merge(&["", ""], strategy, ascending), "");
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_tie_break(#[case] strategy: MergeStrategy) {
        let chunks = ["b2\n", "a1\nb0\n", "a2\nb1\n", "a0\n"];
        assert_eq!(merge(&chunks, strategy, first_byte), "a1\na2\na0\nb2\nb0\nb1\n");
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_keeps_duplicates(#[case] strategy: MergeStrategy) {
        let chunks = ["a\na\nb\n", "a\nb\n"];
        assert_eq!(merge(&chunks, strategy, ascending), "a\na\na\nb\nb\n");
    }

    #[test]
    fn test_merge_sorter_no_chunks() {
        let mut cursors: Vec<LineReader<&[u8]>> = Vec::new();
        let mut output = Vec::new();
        let mut writer = LineWriter::new(&mut output, 8, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, ascending);
        let err = merger.sort().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoInputChunks);
        assert_eq!(merger.lines_written(), 0);
        assert_eq!(writer.buffered(), 0);
        writer.close().unwrap();

        assert!(output.is_empty());
    }

    #[test]
    fn test_merge_sorter_runs_once() {
        let mut cursors = cursors(&["a\n"]);
        let mut writer = LineWriter::new(Vec::new(), 8, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, ascending);
        merger.sort().unwrap();
        assert_eq!(merger.lines_written(), 1);

        let err = merger.sort().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_priming_error(#[case] strategy: MergeStrategy) {
        let mut cursors = cursors(&["a\n"]);
        cursors.push(LineReader::new(Box::new(BrokenReader) as Box<dyn Read>));
        let mut writer = LineWriter::new(Vec::new(), 8, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, ascending).with_strategy(strategy);
        let err = merger.sort().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Scan);
        assert_eq!(err.stage(), "failed to read the first line of chunk 1");
        assert_eq!(merger.state(), MergeState::Initializing);
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_read_error(#[case] strategy: MergeStrategy) {
        let broken = "a\n".as_bytes().chain(BrokenReader);
        let mut cursors = cursors(&["b\n"]);
        cursors.insert(0, LineReader::with_capacity(2, Box::new(broken) as Box<dyn Read>));
        let mut writer = LineWriter::new(Vec::new(), 8, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, ascending).with_strategy(strategy);
        let err = merger.sort().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Scan);
        assert_eq!(err.stage(), "failed to read the next line of chunk 0");
        assert_eq!(merger.state(), MergeState::Running);
        assert_eq!(merger.lines_written(), 1);
    }

    #[rstest]
    #[case(MergeStrategy::Linear)]
    #[case(MergeStrategy::Heap)]
    fn test_merge_sorter_write_error(#[case] strategy: MergeStrategy) {
        let mut cursors = cursors(&["a\nc\n", "b\n"]);
        let mut writer = LineWriter::new(FailingWriter, 4, LineEnding::Lf);

        let mut merger = MergeSorter::new(&mut cursors, &mut writer, ascending).with_strategy(strategy);
        let err = merger.sort().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(err.stage(), "failed to write the line");
    }

    #[test]
    fn test_merge_strategy_for_chunks() {
        assert_eq!(MergeStrategy::for_chunks(1), MergeStrategy::Linear);
        assert_eq!(MergeStrategy::for_chunks(16), MergeStrategy::Linear);
        assert_eq!(MergeStrategy::for_chunks(17), MergeStrategy::Heap);
    }
}
