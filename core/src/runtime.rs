//! Instantiated transcoder module
//!
//! [`NativeRuntime`] owns the wasmtime store, the exported linear memory and
//! the [`BindingTable`]. All native calls and all host-side memory access go
//! through it.

use bytemuck::Pod;
use wasmtime::{Engine, Linker, Memory, Module, Store, StoreLimits, StoreLimitsBuilder};

use basis_bridge_shared::MEMORY_EXPORT;

use crate::binding::{BindingTable, NativeFnId, NativeValue};
use crate::config::ModuleConfig;
use crate::error::{ArenaError, Error, ModuleError, Result};

/// Reactor initialisers, tried in order; the first one found is called once
const REACTOR_INITIALIZERS: [&str; 2] = ["_initialize", "__wasm_call_ctors"];

/// Per-store host data
pub struct HostState {
    limits: StoreLimits,
}

impl HostState {
    pub fn with_memory_limit(memory_limit: usize) -> Self {
        Self {
            limits: StoreLimitsBuilder::new().memory_size(memory_limit).build(),
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::with_memory_limit(basis_bridge_shared::DEFAULT_MEMORY_LIMIT)
    }
}

/// A live transcoder module instance
pub struct NativeRuntime {
    pub(crate) store: Store<HostState>,
    /// Kept for direct export lookups in tests
    #[cfg(test)]
    pub(crate) instance: wasmtime::Instance,
    memory: Memory,
    bindings: BindingTable,
}

impl NativeRuntime {
    /// Instantiate `module`, run its initialisers and bind the native table
    pub fn instantiate(engine: &Engine, module: &Module, config: &ModuleConfig) -> Result<Self> {
        let mut store = Store::new(engine, HostState::with_memory_limit(config.memory_limit));

        // Enforce the configured linear memory cap
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<HostState> = Linker::new(engine);
        if config.trap_unknown_imports {
            linker
                .define_unknown_imports_as_traps(module)
                .map_err(|e| ModuleError::Instantiate(e.into()))?;
        }

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| ModuleError::Instantiate(e.into()))?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or(ModuleError::MissingMemory(MEMORY_EXPORT))?;

        for name in REACTOR_INITIALIZERS {
            if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, name) {
                tracing::debug!("running reactor initialiser '{}'", name);
                init.call(&mut store, ()).map_err(|e| Error::Trap {
                    name,
                    source: e.into(),
                })?;
                break;
            }
        }

        let bindings = BindingTable::new(&mut store, &instance)?;

        let mut runtime = Self {
            store,
            #[cfg(test)]
            instance,
            memory,
            bindings,
        };
        runtime.call_void(NativeFnId::TranscoderInit, &[])?;

        Ok(runtime)
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn call(&mut self, id: NativeFnId, args: &[u32]) -> Result<NativeValue> {
        self.bindings.call(&mut self.store, id, args)
    }

    pub fn call_bool(&mut self, id: NativeFnId, args: &[u32]) -> Result<bool> {
        self.bindings.call_bool(&mut self.store, id, args)
    }

    pub fn call_number(&mut self, id: NativeFnId, args: &[u32]) -> Result<u32> {
        self.bindings.call_number(&mut self.store, id, args)
    }

    pub fn call_void(&mut self, id: NativeFnId, args: &[u32]) -> Result<()> {
        self.bindings.call_void(&mut self.store, id, args)
    }

    /// Allocate `size` bytes with the native allocator
    pub fn allocate(&mut self, size: u32) -> Result<u32> {
        let ptr = self.call_number(NativeFnId::Allocate, &[size])?;
        if ptr == 0 {
            return Err(ArenaError::AllocationFailed { size }.into());
        }
        log::trace!("allocated {} bytes at {:#x}", size, ptr);
        Ok(ptr)
    }

    /// Free a block returned by [`allocate`](Self::allocate)
    pub fn release(&mut self, ptr: u32) -> Result<()> {
        log::trace!("releasing {:#x}", ptr);
        self.call_void(NativeFnId::Release, &[ptr])
    }

    /// Current size of the linear memory in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// The whole linear memory
    pub fn memory_bytes(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn checked_range(&self, offset: u32, len: u32) -> Result<std::ops::Range<usize>> {
        let limit = self.memory_size();
        let start = offset as usize;
        let end = start.saturating_add(len as usize);
        if end > limit {
            return Err(ArenaError::OutOfBounds { offset, len, limit }.into());
        }
        Ok(start..end)
    }

    /// Bounds-checked read of `len` bytes at `offset`
    pub fn read(&self, offset: u32, len: u32) -> Result<&[u8]> {
        let range = self.checked_range(offset, len)?;
        Ok(&self.memory.data(&self.store)[range])
    }

    /// Bounds-checked mutable access to `len` bytes at `offset`
    pub fn read_mut(&mut self, offset: u32, len: u32) -> Result<&mut [u8]> {
        let range = self.checked_range(offset, len)?;
        Ok(&mut self.memory.data_mut(&mut self.store)[range])
    }

    /// Copy `bytes` into linear memory at `offset`
    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| ArenaError::OutOfBounds {
            offset,
            len: u32::MAX,
            limit: self.memory_size(),
        })?;
        self.read_mut(offset, len)?.copy_from_slice(bytes);
        Ok(())
    }

    /// Decode a plain-old-data record at `offset`
    pub fn read_pod<T: Pod>(&self, offset: u32) -> Result<T> {
        let bytes = self.read(offset, std::mem::size_of::<T>() as u32)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fake_counter, fake_runtime};

    #[test]
    fn test_instantiate_calls_transcoder_init() {
        let mut runtime = fake_runtime();
        assert_eq!(fake_counter(&mut runtime, "test_init_calls"), 1);
        assert_eq!(runtime.memory_size(), 2 * basis_bridge_shared::WASM_PAGE_SIZE);
    }

    #[test]
    fn test_reactor_initializer_runs_first() {
        let wasm = crate::test_utils::fake_wasm_with(|wat| {
            wat.replacen(
                "(func (export \"basisu_transcoder_init\")",
                "(func (export \"_initialize\") (global.set $init_calls (i32.const 100)))\n  (func (export \"basisu_transcoder_init\")",
                1,
            )
        });
        let engine = Engine::default();
        let module = Module::new(&engine, wasm).unwrap();
        let mut runtime =
            NativeRuntime::instantiate(&engine, &module, &ModuleConfig::default()).unwrap();
        assert_eq!(fake_counter(&mut runtime, "test_init_calls"), 101);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut runtime = fake_runtime();
        let ptr = runtime.allocate(8).unwrap();
        runtime.write(ptr, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(runtime.read(ptr + 2, 3).unwrap(), &[3, 4, 5]);
        assert_eq!(runtime.read_pod::<u32>(ptr).unwrap(), u32::from_le_bytes([1, 2, 3, 4]));
        runtime.release(ptr).unwrap();
        assert_eq!(fake_counter(&mut runtime, "test_live_allocations"), 0);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut runtime = fake_runtime();
        let size = runtime.memory_size() as u32;

        assert!(runtime.read(size - 4, 4).is_ok());
        assert!(matches!(
            runtime.read(size - 4, 5).unwrap_err(),
            Error::Arena(ArenaError::OutOfBounds { .. })
        ));
        assert!(runtime.write(u32::MAX, &[0]).is_err());
    }

    #[test]
    fn test_allocation_failure() {
        let mut runtime = fake_runtime();
        let err = runtime.allocate(16 * 1024 * 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::Arena(ArenaError::AllocationFailed { size: 16_777_216 })
        ));
    }
}
