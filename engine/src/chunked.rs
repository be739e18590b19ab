//! Work buffer split into device-sized chunks.
//!
//! A grid of `R³` cells at 36 bytes each quickly outgrows the largest single allocation a
//! device accepts. The buffer is partitioned into `count` chunks of `capacity` cells; the last
//! chunk holds the remainder. Kernels locate a cell with one division and one remainder.

use tracing::{debug, warn};

use crate::device::{ChunkId, ComputeDevice, TableId};
use crate::error::AllocError;
use crate::layout::WORK_CELL_SIZE;

/// Partition of `items` cells into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
    /// Cells in the buffer
    pub items: usize,
    /// Cells per chunk (all but the last chunk are full)
    pub capacity: usize,
    /// Chunks
    pub count: usize,
}

impl ChunkLayout {
    /// Partition `items` cells of `item_size` bytes under a per-allocation limit.
    pub fn new(items: usize, max_bytes: u64, item_size: usize) -> Result<Self, AllocError> {
        let capacity = usize::try_from(max_bytes / item_size.max(1) as u64).unwrap_or(usize::MAX);
        if capacity == 0 {
            return Err(AllocError::ZeroCapacity { max_bytes, item_size });
        }
        let capacity = capacity.min(items.max(1));
        Ok(Self { items, capacity, count: items.div_ceil(capacity) })
    }

    /// Cells in chunk `index`; never zero for a non-empty buffer.
    pub fn chunk_len(&self, index: usize) -> usize {
        if index + 1 < self.count {
            self.capacity
        } else {
            self.items - self.capacity * (self.count - 1)
        }
    }

    /// `(chunk, offset)` of cell `flat`.
    #[inline]
    pub fn index_of(&self, flat: usize) -> (usize, usize) {
        (flat / self.capacity, flat % self.capacity)
    }
}

/// Device-resident chunked work buffer plus its chunk table.
#[derive(Debug, Default)]
pub struct ChunkedBuffer {
    layout: Option<ChunkLayout>,
    chunks: Vec<ChunkId>,
    table: Option<TableId>,
}

impl ChunkedBuffer {
    /// A buffer holding nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Allocate `items` zeroed cells on `device`. Nothing stays allocated on failure.
    pub fn allocate<D: ComputeDevice>(device: &mut D, items: usize) -> Result<Self, AllocError> {
        let layout = ChunkLayout::new(items, device.max_allocation_bytes(), WORK_CELL_SIZE)?;
        if layout.count > device.max_chunks() {
            return Err(AllocError::TooManyChunks { needed: layout.count, max: device.max_chunks() });
        }
        let mut chunks = Vec::with_capacity(layout.count);
        for index in 0..layout.count {
            let len = layout.chunk_len(index);
            match device.allocate_chunk(len) {
                Ok(chunk) => chunks.push(chunk),
                Err(source) => {
                    warn!(index, count = layout.count, %source, "work buffer allocation failed");
                    for chunk in chunks {
                        device.free_chunk(chunk);
                    }
                    return Err(AllocError::Chunk {
                        index,
                        count: layout.count,
                        bytes: (len * WORK_CELL_SIZE) as u64,
                        source,
                    });
                }
            }
        }
        let table = match device.create_chunk_table(&chunks, layout.capacity, items) {
            Ok(table) => table,
            Err(source) => {
                for chunk in chunks {
                    device.free_chunk(chunk);
                }
                return Err(AllocError::Table(source));
            }
        };
        debug!(items, capacity = layout.capacity, count = layout.count, "allocated work buffer");
        Ok(Self { layout: Some(layout), chunks, table: Some(table) })
    }

    /// Replace the contents with a fresh zeroed buffer of `items` cells. On failure the
    /// buffer is left empty.
    pub fn resize<D: ComputeDevice>(&mut self, device: &mut D, items: usize) -> Result<(), AllocError> {
        self.free(device);
        *self = Self::allocate(device, items)?;
        Ok(())
    }

    /// Release every device resource.
    pub fn free<D: ComputeDevice>(&mut self, device: &mut D) {
        if let Some(table) = self.table.take() {
            device.free_chunk_table(table);
        }
        for chunk in self.chunks.drain(..) {
            device.free_chunk(chunk);
        }
        self.layout = None;
    }

    /// Partition, if allocated.
    pub fn layout(&self) -> Option<ChunkLayout> {
        self.layout
    }

    /// Chunk handles in order.
    pub fn chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    /// Chunk table, if allocated.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    /// Cells held.
    pub fn items(&self) -> usize {
        self.layout.map_or(0, |l| l.items)
    }

    /// True when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_lands_in_the_last_chunk() {
        let layout = ChunkLayout::new(2_500, 1_000 * 36, 36).unwrap();
        assert_eq!((layout.capacity, layout.count), (1_000, 3));
        assert_eq!(
            (0..3).map(|i| layout.chunk_len(i)).collect::<Vec<_>>(),
            [1_000, 1_000, 500]
        );
        assert_eq!(layout.index_of(2_499), (2, 499));
    }

    #[test]
    fn exact_fit_has_no_empty_chunk() {
        let layout = ChunkLayout::new(2_000, 1_000 * 36, 36).unwrap();
        assert_eq!(layout.count, 2);
        assert_eq!(layout.chunk_len(1), 1_000);
    }

    #[test]
    fn small_buffers_use_one_chunk() {
        let layout = ChunkLayout::new(10, 1 << 30, 36).unwrap();
        assert_eq!((layout.capacity, layout.count, layout.chunk_len(0)), (10, 1, 10));
    }

    #[test]
    fn zero_capacity_is_an_error() {
        assert!(matches!(
            ChunkLayout::new(10, 35, 36),
            Err(AllocError::ZeroCapacity { max_bytes: 35, item_size: 36 })
        ));
    }
}
