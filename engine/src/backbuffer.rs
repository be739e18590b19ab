//! Per-window work buffer contents behind one device buffer.
//!
//! Only one window's cells live on the device at a time. The others wait in host slots;
//! switching exchanges the device contents with the target slot chunk by chunk, so after
//! the swap the previously active window's cells sit in the host slot the target vacated.

use tracing::trace;

use crate::chunked::ChunkedBuffer;
use crate::device::{ComputeDevice, Fence};
use crate::error::{AllocError, DeviceOp, DispatchError, EngineError};
use crate::layout::WorkCell;

/// Device buffer plus host-resident slots, one per window.
#[derive(Debug, Default)]
pub struct BackBuffer {
    buffer: ChunkedBuffer,
    // slot `active` is a placeholder; its data is on the device
    slots: Vec<Vec<Vec<WorkCell>>>,
    active: usize,
}

impl BackBuffer {
    /// Allocate `items` cells on the device and `slots` host slots (at least one).
    pub fn new<D: ComputeDevice>(
        device: &mut D,
        items: usize,
        slots: usize,
    ) -> Result<Self, AllocError> {
        let buffer = ChunkedBuffer::allocate(device, items)?;
        let mut back = Self { buffer, slots: Vec::new(), active: 0 };
        for _ in 0..slots.max(1) {
            back.slots.push(back.zeroed_slot());
        }
        Ok(back)
    }

    fn zeroed_slot(&self) -> Vec<Vec<WorkCell>> {
        match self.buffer.layout() {
            Some(layout) => {
                (0..layout.count).map(|i| vec![WorkCell::default(); layout.chunk_len(i)]).collect()
            }
            None => Vec::new(),
        }
    }

    /// Device buffer.
    pub fn buffer(&self) -> &ChunkedBuffer {
        &self.buffer
    }

    /// Slots, including the active one.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot whose data is on the device.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Make slot `index` device-resident. Switching to the active slot copies nothing.
    pub fn use_slot<D: ComputeDevice>(
        &mut self,
        device: &mut D,
        index: usize,
        wait: bool,
    ) -> Result<Fence, EngineError> {
        if index >= self.slots.len() {
            return Err(EngineError::UnknownSlot { index, count: self.slots.len() });
        }
        if index == self.active {
            return Ok(Fence::SIGNALED);
        }
        let mut fences = Vec::with_capacity(self.buffer.chunks().len());
        for (chunk, host) in self.buffer.chunks().iter().zip(self.slots[index].iter_mut()) {
            let fence = device
                .swap_chunk(*chunk, host, wait)
                .map_err(|e| DispatchError::new(DeviceOp::Swap, chunk.to_string(), e))?;
            fences.push(fence);
        }
        if !wait {
            device
                .wait(&fences)
                .map_err(|e| DispatchError::new(DeviceOp::Wait, "work buffer", e))?;
        }
        self.slots.swap(index, self.active);
        trace!(from = self.active, to = index, "switched buffer slot");
        self.active = index;
        Ok(Fence::SIGNALED)
    }

    /// Append a zeroed slot.
    pub fn add_slot(&mut self) {
        self.slots.push(self.zeroed_slot());
    }

    /// Drop the last slot. Its contents are discarded; if it was active, slot 0 becomes
    /// active first.
    pub fn remove_slot<D: ComputeDevice>(&mut self, device: &mut D) -> Result<(), EngineError> {
        if self.slots.len() <= 1 {
            return Ok(());
        }
        let last = self.slots.len() - 1;
        if self.active == last {
            self.use_slot(device, 0, true)?;
        }
        self.slots.pop();
        Ok(())
    }

    /// Reallocate for `items` cells; every slot is reset to zero and slot 0 becomes active.
    /// The slot count survives a failed allocation.
    pub fn resize<D: ComputeDevice>(&mut self, device: &mut D, items: usize) -> Result<(), AllocError> {
        let count = self.slots.len().max(1);
        self.slots.clear();
        self.active = 0;
        let result = self.buffer.resize(device, items);
        for _ in 0..count {
            self.slots.push(self.zeroed_slot());
        }
        result
    }

    /// Release the device buffer and every slot.
    pub fn free<D: ComputeDevice>(&mut self, device: &mut D) {
        self.buffer.free(device);
        self.slots.clear();
        self.active = 0;
    }
}
