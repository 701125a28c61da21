//! Grow-only native memory arenas
//!
//! A [`MemoryArena`] owns at most one block from the native allocator and
//! keeps it across calls until a larger size is requested. Pointers into an
//! arena are handed out as [`ArenaPtr`], which remembers the arena and the
//! allocation generation it was minted from so stale or foreign pointers
//! are caught before they reach the native side.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ArenaError, Result};
use crate::runtime::NativeRuntime;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique arena identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    fn next() -> Self {
        Self(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Opaque pointer into a [`MemoryArena`]
///
/// The raw offset is only recoverable through [`MemoryArena::resolve`] on
/// the arena that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaPtr {
    arena: ArenaId,
    generation: u32,
    offset: u32,
}

impl ArenaPtr {
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A reusable, growable native buffer
#[derive(Debug)]
pub struct MemoryArena {
    id: ArenaId,
    label: &'static str,
    /// 0 while nothing is allocated
    base: u32,
    capacity: u32,
    /// Bumped on every reallocation and release
    generation: u32,
    allocations: u64,
}

impl MemoryArena {
    pub fn new(label: &'static str) -> Self {
        Self {
            id: ArenaId::next(),
            label,
            base: 0,
            capacity: 0,
            generation: 0,
            allocations: 0,
        }
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Bytes currently owned
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_allocated(&self) -> bool {
        self.base != 0
    }

    /// Number of native allocations made over the arena's lifetime
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    /// Pointer to the start of the current allocation
    pub fn ptr(&self) -> Option<ArenaPtr> {
        self.is_allocated().then_some(ArenaPtr {
            arena: self.id,
            generation: self.generation,
            offset: self.base,
        })
    }

    /// Turn a pointer minted by this arena back into a native offset
    pub fn resolve(&self, ptr: ArenaPtr) -> Result<u32, ArenaError> {
        if ptr.arena != self.id {
            return Err(ArenaError::ForeignPointer {
                expected: self.id.0,
                found: ptr.arena.0,
            });
        }
        if ptr.generation != self.generation {
            return Err(ArenaError::StalePointer {
                current: self.generation,
                found: ptr.generation,
            });
        }
        if !self.is_allocated() {
            return Err(ArenaError::Unallocated);
        }
        Ok(ptr.offset)
    }

    /// Make sure the arena holds at least `required` bytes
    ///
    /// Keeps the current block when it is large enough. Otherwise frees it
    /// and allocates exactly `required` bytes. Returns true if a new block
    /// was allocated.
    pub fn ensure(&mut self, runtime: &mut NativeRuntime, required: u32) -> Result<bool> {
        if self.capacity >= required {
            return Ok(false);
        }

        self.release(runtime)?;

        let base = runtime.allocate(required)?;
        self.base = base;
        self.capacity = required;
        self.allocations += 1;
        log::debug!(
            "{} arena grown to {} bytes at {:#x} (allocation #{})",
            self.label,
            required,
            base,
            self.allocations
        );
        Ok(true)
    }

    /// Grow to fit `bytes` and copy them to the start of the arena
    pub fn write(&mut self, runtime: &mut NativeRuntime, bytes: &[u8]) -> Result<ArenaPtr> {
        let len = u32::try_from(bytes.len()).map_err(|_| ArenaError::AllocationFailed {
            size: u32::MAX,
        })?;
        self.ensure(runtime, len)?;
        let ptr = self.ptr().ok_or(ArenaError::Unallocated)?;
        runtime.write(self.base, bytes)?;
        Ok(ptr)
    }

    fn check_len(&self, len: u32) -> Result<(), ArenaError> {
        if len > self.capacity {
            return Err(ArenaError::OutOfBounds {
                offset: self.base,
                len,
                limit: self.capacity as usize,
            });
        }
        Ok(())
    }

    /// Read-only view of the first `len` bytes
    pub fn view<'a>(&self, runtime: &'a NativeRuntime, len: u32) -> Result<&'a [u8]> {
        self.check_len(len)?;
        if len == 0 {
            return Ok(&[]);
        }
        runtime.read(self.base, len)
    }

    /// Mutable view of the first `len` bytes
    pub fn view_mut<'a>(&self, runtime: &'a mut NativeRuntime, len: u32) -> Result<&'a mut [u8]> {
        self.check_len(len)?;
        if len == 0 {
            return Ok(&mut []);
        }
        runtime.read_mut(self.base, len)
    }

    /// Free the native block, if any
    ///
    /// Safe to call repeatedly; only the first call after an allocation
    /// reaches the native allocator.
    pub fn release(&mut self, runtime: &mut NativeRuntime) -> Result<()> {
        if !self.is_allocated() {
            return Ok(());
        }
        let base = self.base;
        self.base = 0;
        self.capacity = 0;
        self.generation = self.generation.wrapping_add(1);
        runtime.release(base)?;
        log::debug!("{} arena released {:#x}", self.label, base);
        Ok(())
    }
}

impl Drop for MemoryArena {
    fn drop(&mut self) {
        if self.is_allocated() {
            log::warn!(
                "{} arena dropped while holding {} bytes at {:#x}",
                self.label,
                self.capacity,
                self.base
            );
        }
    }
}
