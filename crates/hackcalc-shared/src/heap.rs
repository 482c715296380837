use std::collections::BTreeMap;

use crate::layout::HEAP_ALIGN;
use crate::memory::{EngineMemory, EnginePtr, MemoryError, Result};

/// In-memory engine heap used for host-side tests and scripted engines.
///
/// The wasm engine backend uses the module's own `malloc`/`free` instead; the bookkeeping
/// contract is the same. Allocation is a simple bump pointer over a fixed capacity, which keeps
/// pointers stable and makes leaks and double frees easy to observe.
#[derive(Debug)]
pub struct VecHeap {
    bytes: Vec<u8>,
    next: usize,
    live: BTreeMap<u32, usize>,
    allocations: u64,
    releases: u64,
}

impl VecHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            // Address 0 stays unused so a null pointer is never a valid allocation.
            next: HEAP_ALIGN,
            live: BTreeMap::new(),
            allocations: 0,
            releases: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Total successful allocations since creation.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Total successful frees since creation.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Allocations that have not been freed yet.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Length of a live allocation, if `ptr` names one.
    pub fn allocation_len(&self, ptr: EnginePtr) -> Option<usize> {
        self.live.get(&ptr.get()).copied()
    }

    fn range(&self, ptr: EnginePtr, len: usize) -> Result<core::ops::Range<usize>> {
        let start = ptr.get() as usize;
        let end = start.checked_add(len).ok_or(MemoryError::OutOfBounds {
            ptr: ptr.get(),
            len,
            capacity: self.bytes.len(),
        })?;
        if end > self.bytes.len() {
            return Err(MemoryError::OutOfBounds {
                ptr: ptr.get(),
                len,
                capacity: self.bytes.len(),
            });
        }
        Ok(start..end)
    }
}

impl EngineMemory for VecHeap {
    fn alloc(&mut self, len: usize) -> Result<EnginePtr> {
        // Zero-length requests still get a distinct address, like `malloc(0)` in the engine.
        let reserve = len.max(1).div_ceil(HEAP_ALIGN) * HEAP_ALIGN;
        let start = self.next;
        let end = start
            .checked_add(reserve)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(MemoryError::OutOfMemory { len })?;
        let addr = u32::try_from(start).map_err(|_| MemoryError::OutOfMemory { len })?;

        self.next = end;
        self.live.insert(addr, len);
        self.allocations += 1;
        Ok(EnginePtr::new(addr))
    }

    fn free(&mut self, ptr: EnginePtr) -> Result<()> {
        if self.live.remove(&ptr.get()).is_none() {
            return Err(MemoryError::InvalidFree { ptr: ptr.get() });
        }
        self.releases += 1;
        Ok(())
    }

    fn read(&self, ptr: EnginePtr, dst: &mut [u8]) -> Result<()> {
        let range = self.range(ptr, dst.len())?;
        dst.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, ptr: EnginePtr, src: &[u8]) -> Result<()> {
        let range = self.range(ptr, src.len())?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }
}
