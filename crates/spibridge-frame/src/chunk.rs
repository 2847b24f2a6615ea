//! Burst chunk planning.
//!
//! A burst is a logical byte stream `[header][payload]` cut into pieces of at
//! most `chunk_size` bytes. The header only ever lives in chunk 0; every
//! later chunk is straight payload starting at `index * chunk_size - header_len`.

use std::ops::Range;

use crate::codec::BurstHeader;
use crate::error::{FrameError, Result};

/// Default chunk limit shared by client and serving side.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// One piece of a burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the sequence, starting at 0.
    pub index: usize,
    /// Bytes on the wire for this chunk.
    pub size: usize,
    /// Header bytes at the front of this chunk (non-zero for chunk 0 only).
    pub header_len: usize,
    /// The slice of the payload carried after any header bytes.
    pub payload: Range<usize>,
}

/// The chunk layout of one burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    header_len: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Plan `total` bytes, the first `header_len` of which are header.
    pub fn new(total: usize, header_len: usize, chunk_size: usize) -> Result<Self> {
        if chunk_size <= header_len {
            return Err(FrameError::InvalidChunkSize {
                chunk_size,
                min: header_len + 1,
            });
        }
        if total <= header_len {
            return Err(FrameError::EmptyBurst);
        }
        Ok(Self {
            total,
            header_len,
            chunk_size,
        })
    }

    /// Plan for a burst write: header and payload share the chunk stream.
    pub fn for_write(header: &BurstHeader, chunk_size: usize) -> Result<Self> {
        Self::new(header.total_len(), header.len(), chunk_size)
    }

    /// Plan for the data phase of a burst read, after the header exchange.
    pub fn for_read(payload_len: usize, chunk_size: usize) -> Result<Self> {
        Self::new(payload_len, 0, chunk_size)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn payload_len(&self) -> usize {
        self.total - self.header_len
    }

    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }

    pub fn chunks(&self) -> Chunks {
        Chunks {
            plan: *self,
            index: 0,
            remaining: self.total,
        }
    }
}

/// Iterator over the chunks of a [`ChunkPlan`], in wire order.
#[derive(Debug, Clone)]
pub struct Chunks {
    plan: ChunkPlan,
    index: usize,
    remaining: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }

        let size = self.remaining.min(self.plan.chunk_size);
        let (header_len, start) = if self.index == 0 {
            (self.plan.header_len, 0)
        } else {
            (0, self.index * self.plan.chunk_size - self.plan.header_len)
        };
        let chunk = Chunk {
            index: self.index,
            size,
            header_len,
            payload: start..start + size - header_len,
        };

        self.remaining -= size;
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining.div_ceil(self.plan.chunk_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{build_burst_header, AddressingMode};

    fn sizes(plan: &ChunkPlan) -> Vec<usize> {
        plan.chunks().map(|c| c.size).collect()
    }

    #[test]
    fn splits_2500_bytes_with_three_byte_header() {
        let plan = ChunkPlan::new(2500 + 3, 3, 1024).unwrap();
        assert_eq!(plan.chunk_count(), 3);
        assert_eq!(sizes(&plan), vec![1024, 1024, 455]);
    }

    #[test]
    fn splits_direct_burst_write() {
        let header = build_burst_header(AddressingMode::Direct, 0, 0x20, true, 2500).unwrap();
        let plan = ChunkPlan::for_write(&header, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(sizes(&plan), vec![1024, 1024, 456]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let plan = ChunkPlan::new(2048, 4, 1024).unwrap();
        assert_eq!(plan.chunk_count(), 2);
        assert_eq!(sizes(&plan), vec![1024, 1024]);

        let plan = ChunkPlan::for_read(3072, 1024).unwrap();
        assert_eq!(sizes(&plan), vec![1024, 1024, 1024]);
    }

    #[test]
    fn small_burst_fits_in_one_chunk() {
        let plan = ChunkPlan::new(4 + 10, 4, 1024).unwrap();
        let chunks: Vec<_> = plan.chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].header_len, 4);
        assert_eq!(chunks[0].payload, 0..10);
    }

    #[test]
    fn payload_ranges_tile_the_payload() {
        for (payload_len, header_len, chunk_size) in
            [(1, 4, 8), (4, 4, 8), (5, 5, 8), (100, 4, 7), (2500, 3, 1024), (2044, 4, 1024)]
        {
            let plan = ChunkPlan::new(payload_len + header_len, header_len, chunk_size).unwrap();
            let mut next = 0usize;
            for (i, chunk) in plan.chunks().enumerate() {
                assert_eq!(chunk.index, i);
                assert_eq!(chunk.payload.start, next);
                assert_eq!(chunk.header_len + chunk.payload.len(), chunk.size);
                next = chunk.payload.end;
            }
            assert_eq!(next, payload_len);

            let expected_last = match (payload_len + header_len) % chunk_size {
                0 => chunk_size,
                rem => rem,
            };
            assert_eq!(plan.chunks().last().map(|c| c.size), Some(expected_last));
            assert_eq!(
                plan.chunk_count(),
                (payload_len + header_len).div_ceil(chunk_size)
            );
        }
    }

    #[test]
    fn rejects_degenerate_plans() {
        assert_eq!(
            ChunkPlan::new(10, 4, 4),
            Err(FrameError::InvalidChunkSize {
                chunk_size: 4,
                min: 5
            })
        );
        assert_eq!(ChunkPlan::new(4, 4, 1024), Err(FrameError::EmptyBurst));
        assert_eq!(ChunkPlan::for_read(0, 1024), Err(FrameError::EmptyBurst));
    }

    #[test]
    fn iterator_reports_exact_length() {
        let plan = ChunkPlan::new(2503, 3, 1024).unwrap();
        let mut chunks = plan.chunks();
        assert_eq!(chunks.len(), 3);
        chunks.next();
        assert_eq!(chunks.len(), 2);
    }
}
