use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised while moving bytes across the host/engine memory boundary.
///
/// `OutOfMemory` is fatal for the current session: there is no buffer-level recovery once the
/// engine heap refuses an allocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("engine heap exhausted allocating {len} bytes")]
    OutOfMemory { len: usize },

    #[error("out of bounds: ptr=0x{ptr:x} len={len} capacity={capacity}")]
    OutOfBounds { ptr: u32, len: usize, capacity: usize },

    #[error("cell index {index} outside memory window of {cells} cells")]
    CellOutOfRange { index: usize, cells: usize },

    #[error("free of unknown engine pointer 0x{ptr:x}")]
    InvalidFree { ptr: u32 },

    /// The backing engine failed while servicing a memory request (e.g. a wasm trap inside
    /// `malloc`).
    #[error("engine memory backend error: {0}")]
    Backend(String),
}

/// Address inside the engine's linear memory.
///
/// Engine pointers are 32-bit (wasm32). They are opaque to the host except for offset
/// arithmetic within an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EnginePtr(u32);

impl EnginePtr {
    pub const NULL: Self = Self(0);

    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset from this pointer, or `None` if it leaves the 32-bit address space.
    pub fn offset(self, bytes: usize) -> Option<Self> {
        let bytes = u32::try_from(bytes).ok()?;
        self.0.checked_add(bytes).map(Self)
    }
}

impl core::fmt::LowerHex for EnginePtr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Allocation and copy primitives of an engine heap.
///
/// Implementations are expected to be cheap to call; every [`crate::SharedBuffer`] and every
/// [`crate::MemoryWindow`] access is routed through here.
pub trait EngineMemory {
    /// Reserve `len` addressable bytes. Contents are unspecified.
    fn alloc(&mut self, len: usize) -> Result<EnginePtr>;

    /// Return an allocation obtained from [`EngineMemory::alloc`].
    fn free(&mut self, ptr: EnginePtr) -> Result<()>;

    /// Copy `dst.len()` bytes out of engine memory starting at `ptr`.
    fn read(&self, ptr: EnginePtr, dst: &mut [u8]) -> Result<()>;

    /// Copy `src` into engine memory starting at `ptr`.
    fn write(&mut self, ptr: EnginePtr, src: &[u8]) -> Result<()>;
}

impl<M: EngineMemory + ?Sized> EngineMemory for &mut M {
    fn alloc(&mut self, len: usize) -> Result<EnginePtr> {
        (**self).alloc(len)
    }

    fn free(&mut self, ptr: EnginePtr) -> Result<()> {
        (**self).free(ptr)
    }

    fn read(&self, ptr: EnginePtr, dst: &mut [u8]) -> Result<()> {
        (**self).read(ptr, dst)
    }

    fn write(&mut self, ptr: EnginePtr, src: &[u8]) -> Result<()> {
        (**self).write(ptr, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_rejects_address_space_overflow() {
        let ptr = EnginePtr::new(u32::MAX - 1);
        assert_eq!(ptr.offset(1), Some(EnginePtr::new(u32::MAX)));
        assert_eq!(ptr.offset(2), None);
        assert_eq!(EnginePtr::NULL.offset(usize::MAX), None);
    }
}
