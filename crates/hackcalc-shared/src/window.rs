use crate::memory::{EngineMemory, EnginePtr, MemoryError, Result};
use crate::word::{word_from_le_bytes, word_to_le_bytes, ShortWord, WORD_BYTES};

/// Fixed span of engine RAM shared between host and engine.
///
/// The window is allocated once at startup, handed to the engine as its RAM base, and never
/// freed. The host uses it for exactly two things: publishing the current key code and reading
/// the display cells back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    base: EnginePtr,
    cells: usize,
}

impl MemoryWindow {
    /// Allocate a zero-filled window of `cells` cells in engine memory.
    pub fn allocate<M: EngineMemory + ?Sized>(mem: &mut M, cells: usize) -> Result<Self> {
        let len = cells
            .checked_mul(WORD_BYTES)
            .ok_or(MemoryError::OutOfMemory { len: usize::MAX })?;
        let base = mem.alloc(len)?;
        let window = Self { base, cells };
        window.clear(mem)?;
        tracing::debug!(base = base.get(), cells, "memory window allocated");
        Ok(window)
    }

    /// Address of cell 0, as passed to the engine's `setMemoryBase`.
    pub fn base(&self) -> EnginePtr {
        self.base
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn read_cell<M: EngineMemory + ?Sized>(&self, mem: &M, index: usize) -> Result<ShortWord> {
        let ptr = self.cell_ptr(index, 1)?;
        let mut bytes = [0u8; WORD_BYTES];
        mem.read(ptr, &mut bytes)?;
        Ok(word_from_le_bytes(bytes))
    }

    pub fn write_cell<M: EngineMemory + ?Sized>(
        &self,
        mem: &mut M,
        index: usize,
        value: ShortWord,
    ) -> Result<()> {
        let ptr = self.cell_ptr(index, 1)?;
        mem.write(ptr, &word_to_le_bytes(value))
    }

    /// Read `count` consecutive cells starting at `start` with a single copy, so the result is a
    /// consistent snapshot of the span.
    pub fn read_span<M: EngineMemory + ?Sized>(
        &self,
        mem: &M,
        start: usize,
        count: usize,
    ) -> Result<Vec<ShortWord>> {
        let ptr = self.cell_ptr(start, count)?;
        let mut bytes = vec![0u8; count * WORD_BYTES];
        mem.read(ptr, &mut bytes)?;
        Ok(bytes
            .chunks_exact(WORD_BYTES)
            .map(|chunk| {
                let mut word = [0u8; WORD_BYTES];
                word.copy_from_slice(chunk);
                word_from_le_bytes(word)
            })
            .collect())
    }

    /// Zero every cell.
    pub fn clear<M: EngineMemory + ?Sized>(&self, mem: &mut M) -> Result<()> {
        mem.write(self.base, &vec![0u8; self.cells * WORD_BYTES])
    }

    fn cell_ptr(&self, start: usize, count: usize) -> Result<EnginePtr> {
        let end = start.checked_add(count);
        if end.map_or(true, |end| end > self.cells) {
            return Err(MemoryError::CellOutOfRange {
                index: start.saturating_add(count.saturating_sub(1)),
                cells: self.cells,
            });
        }
        self.base
            .offset(start * WORD_BYTES)
            .ok_or(MemoryError::CellOutOfRange {
                index: start,
                cells: self.cells,
            })
    }
}
