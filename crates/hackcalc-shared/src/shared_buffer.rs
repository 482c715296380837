//! One-shot byte transfer regions in engine memory.
//!
//! The host and the engine do not share an allocator. Every string or binary payload that
//! crosses the boundary is copied into an explicitly sized engine allocation and freed again
//! afterwards. [`SharedBuffer`] is the only type that performs those allocations, and
//! [`with_shared_buffer`] / [`with_zeroed_buffer`] are the preferred way to obtain one: the
//! buffer is released on every exit path of the closure, including early `?` returns.

use crate::memory::{EngineMemory, EnginePtr, Result};

/// A byte region allocated in engine memory.
///
/// The pointer is valid from [`SharedBuffer::create`] until [`SharedBuffer::release`], which
/// consumes the buffer; a released buffer can therefore be neither read nor released again.
#[derive(Debug)]
#[must_use = "a SharedBuffer leaks engine memory unless released"]
pub struct SharedBuffer {
    ptr: EnginePtr,
    len: usize,
    released: bool,
}

impl SharedBuffer {
    /// Allocate exactly `bytes.len()` bytes in engine memory and copy `bytes` in.
    pub fn create<M: EngineMemory + ?Sized>(mem: &mut M, bytes: &[u8]) -> Result<Self> {
        let ptr = mem.alloc(bytes.len())?;
        let buf = Self {
            ptr,
            len: bytes.len(),
            released: false,
        };
        if let Err(err) = mem.write(ptr, bytes) {
            buf.release(mem)?;
            return Err(err);
        }
        tracing::trace!(ptr = ptr.get(), len = bytes.len(), "shared buffer created");
        Ok(buf)
    }

    /// Allocate a zero-filled destination buffer of `len` bytes for the engine to write into.
    pub fn zeroed<M: EngineMemory + ?Sized>(mem: &mut M, len: usize) -> Result<Self> {
        Self::create(mem, &vec![0u8; len])
    }

    pub fn pointer(&self) -> EnginePtr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the buffer's current contents as UTF-8.
    ///
    /// Invalid sequences are replaced with U+FFFD rather than failing, matching how the engine's
    /// diagnostic and generated text is displayed.
    pub fn read_text<M: EngineMemory + ?Sized>(&self, mem: &M) -> Result<String> {
        let bytes = self.read_bytes(mem)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    /// Copy the buffer's current contents out as opaque binary.
    pub fn read_bytes<M: EngineMemory + ?Sized>(&self, mem: &M) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        mem.read(self.ptr, &mut out)?;
        Ok(out)
    }

    /// Free the engine allocation.
    pub fn release<M: EngineMemory + ?Sized>(mut self, mem: &mut M) -> Result<()> {
        self.released = true;
        tracing::trace!(ptr = self.ptr.get(), len = self.len, "shared buffer released");
        mem.free(self.ptr)
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(
                ptr = self.ptr.get(),
                len = self.len,
                "shared buffer dropped without release; engine memory leaked"
            );
        }
    }
}

/// Run `f` with a buffer holding a copy of `bytes`, releasing it afterwards.
///
/// The closure receives the memory back so it can issue further engine calls while the buffer is
/// alive. A release failure is reported only if `f` itself succeeded.
pub fn with_shared_buffer<M, T, E, F>(
    mem: &mut M,
    bytes: &[u8],
    f: F,
) -> core::result::Result<T, E>
where
    M: EngineMemory + ?Sized,
    E: From<crate::MemoryError>,
    F: FnOnce(&mut M, &SharedBuffer) -> core::result::Result<T, E>,
{
    let buf = SharedBuffer::create(mem, bytes)?;
    scoped(mem, buf, f)
}

/// Run `f` with a zero-filled buffer of `len` bytes, releasing it afterwards.
pub fn with_zeroed_buffer<M, T, E, F>(
    mem: &mut M,
    len: usize,
    f: F,
) -> core::result::Result<T, E>
where
    M: EngineMemory + ?Sized,
    E: From<crate::MemoryError>,
    F: FnOnce(&mut M, &SharedBuffer) -> core::result::Result<T, E>,
{
    let buf = SharedBuffer::zeroed(mem, len)?;
    scoped(mem, buf, f)
}

fn scoped<M, T, E, F>(mem: &mut M, buf: SharedBuffer, f: F) -> core::result::Result<T, E>
where
    M: EngineMemory + ?Sized,
    E: From<crate::MemoryError>,
    F: FnOnce(&mut M, &SharedBuffer) -> core::result::Result<T, E>,
{
    let out = f(mem, &buf);
    let released = buf.release(mem);
    let value = out?;
    released?;
    Ok(value)
}
