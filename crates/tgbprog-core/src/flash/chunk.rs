//! Splitting payloads into page-sized commands

use core::ops::Range;

use crate::chip::PAGE_SIZE;

/// How a buffer is split into PAGE_PROGRAM / READ_DATA commands
///
/// Chunk `i` always starts at `i * 256` relative to the job offset; the
/// plans only differ in how many chunks a length produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChunkPlan {
    /// `ceil(len / 256)` chunks. An empty buffer issues no command.
    #[default]
    Exact,
    /// `floor(len / 256) + 1` chunks, as older tools did. When the length is
    /// a multiple of 256 the last chunk is empty: a PAGE_PROGRAM without
    /// payload, or a READ_DATA whose bytes are discarded.
    Legacy,
}

impl ChunkPlan {
    /// Number of commands issued for `len` bytes
    pub fn count(self, len: usize) -> usize {
        match self {
            Self::Exact => len.div_ceil(PAGE_SIZE),
            Self::Legacy => len / PAGE_SIZE + 1,
        }
    }

    /// Byte range of chunk `index` within a buffer of `len` bytes
    pub fn range(self, index: usize, len: usize) -> Range<usize> {
        let start = (index * PAGE_SIZE).min(len);
        let end = (start + PAGE_SIZE).min(len);
        start..end
    }

    /// Iterate over `(relative offset, byte range)` of every chunk
    pub fn chunks(self, len: usize) -> impl Iterator<Item = (usize, Range<usize>)> {
        (0..self.count(len)).map(move |i| (i * PAGE_SIZE, self.range(i, len)))
    }
}
