use std::ops::Range;

/// Fixed-size chunking of a processed batch for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    size: usize,
}

impl ChunkPlan {
    /// A zero chunk size is treated as one item per chunk.
    pub fn new(total: usize, size: usize) -> Self {
        Self {
            total,
            size: size.max(1),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.size)
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.chunk_count()).map(move |index| {
            let start = index * self.size;
            start..(start + self.size).min(self.total)
        })
    }
}
