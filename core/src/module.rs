//! Transcoder module loading and sharing
//!
//! # Key Types
//!
//! - [`TranscoderEngine`] - Shared wasmtime engine
//! - [`TranscoderModule`] - Loaded transcoder; shared by sessions via `Arc`
//! - [`ModuleCell`] - Get-or-create slot that loads a module at most once
//!
//! The module serialises all native calls through one mutex. Sessions and
//! transcoded images lock it only for the duration of each operation.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use wasmtime::{Engine, ExternType, Module};

use basis_bridge_shared::{BasisTexFormat, TranscoderTextureFormat, WASM_PAGE_SIZE};

use crate::binding::NativeFnId;
use crate::config::{ModuleConfig, SessionConfig};
use crate::error::{ModuleError, Result};
use crate::runtime::NativeRuntime;
use crate::session::TranscoderSession;

/// Shared WASM engine
#[derive(Clone)]
pub struct TranscoderEngine {
    engine: Engine,
}

impl TranscoderEngine {
    /// Create a new engine with default configuration
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    /// Get a reference to the underlying wasmtime engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a transcoder module from bytes
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes)
            .map_err(|e| ModuleError::Compile(e.into()).into())
    }

    /// Validate that a module's declared memory fits within `memory_limit`
    pub fn validate_module_memory(module: &Module, memory_limit: usize) -> Result<()> {
        for export in module.exports() {
            if let ExternType::Memory(mem_type) = export.ty() {
                let required = mem_type.minimum() as usize * WASM_PAGE_SIZE;
                if required > memory_limit {
                    return Err(ModuleError::MemoryLimit {
                        required,
                        limit: memory_limit,
                    }
                    .into());
                }

                if mem_type.maximum().is_none() {
                    log::debug!(
                        "module memory '{}' has no maximum declared; host will limit to {} bytes",
                        export.name(),
                        memory_limit
                    );
                }
            }
        }
        Ok(())
    }
}

/// Where to load a transcoder module from
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl From<PathBuf> for ModuleSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for ModuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// A loaded and bound transcoder module
pub struct TranscoderModule {
    engine: TranscoderEngine,
    runtime: Mutex<NativeRuntime>,
}

impl TranscoderModule {
    /// Instantiate an already compiled module
    pub fn new(engine: &TranscoderEngine, module: &Module, config: &ModuleConfig) -> Result<Self> {
        TranscoderEngine::validate_module_memory(module, config.memory_limit)?;
        let runtime = NativeRuntime::instantiate(engine.engine(), module, config)?;

        tracing::info!(
            "transcoder module ready ({} bound exports, {} bytes of linear memory)",
            runtime.bindings().iter().count(),
            runtime.memory_size()
        );

        Ok(Self {
            engine: engine.clone(),
            runtime: Mutex::new(runtime),
        })
    }

    /// Compile and instantiate from WASM bytes
    pub fn from_bytes(bytes: &[u8], config: &ModuleConfig) -> Result<Self> {
        let engine = TranscoderEngine::new()?;
        let module = engine.load_module(bytes)?;
        Self::new(&engine, &module, config)
    }

    /// Load from bytes or from a file
    ///
    /// Reading the file is the only suspending step.
    pub async fn load(source: ModuleSource, config: &ModuleConfig) -> Result<Self> {
        let bytes = match source {
            ModuleSource::Bytes(bytes) => bytes,
            ModuleSource::Path(path) => {
                tracing::debug!("reading transcoder module from {}", path.display());
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| ModuleError::Read { path, source })?
            }
        };
        Self::from_bytes(&bytes, config)
    }

    pub fn engine(&self) -> &TranscoderEngine {
        &self.engine
    }

    /// Lock the native runtime
    pub(crate) fn lock(&self) -> MutexGuard<'_, NativeRuntime> {
        self.runtime.lock().unwrap_or_else(|e| {
            tracing::warn!("transcoder runtime mutex poisoned; continuing");
            e.into_inner()
        })
    }

    /// Returns true if the module provides this entry point
    pub fn has_export(&self, id: NativeFnId) -> bool {
        self.lock().bindings().contains(id)
    }

    /// Start a new session on this module
    pub fn new_session(self: &Arc<Self>) -> Result<TranscoderSession> {
        TranscoderSession::new(Arc::clone(self))
    }

    /// Start a new session with configured defaults
    pub fn new_session_with(self: &Arc<Self>, config: &SessionConfig) -> Result<TranscoderSession> {
        TranscoderSession::with_input_capacity(Arc::clone(self), config.initial_input_capacity)
    }

    pub fn format_has_alpha(&self, format: TranscoderTextureFormat) -> Result<bool> {
        self.lock()
            .call_bool(NativeFnId::FormatHasAlpha, &[format.as_raw()])
    }

    pub fn format_is_hdr(&self, format: TranscoderTextureFormat) -> Result<bool> {
        self.lock()
            .call_bool(NativeFnId::FormatIsHdr, &[format.as_raw()])
    }

    pub fn format_is_uncompressed(&self, format: TranscoderTextureFormat) -> Result<bool> {
        self.lock()
            .call_bool(NativeFnId::FormatIsUncompressed, &[format.as_raw()])
    }

    /// Bytes per block for block formats, bytes per pixel otherwise
    pub fn bytes_per_block_or_pixel(&self, format: TranscoderTextureFormat) -> Result<u32> {
        self.lock()
            .call_number(NativeFnId::BytesPerBlockOrPixel, &[format.as_raw()])
    }

    /// Output size in bytes of a `width` x `height` image in `format`
    pub fn transcoded_image_size(
        &self,
        format: TranscoderTextureFormat,
        width: u32,
        height: u32,
    ) -> Result<u32> {
        self.lock().call_number(
            NativeFnId::TranscodedImageSize,
            &[format.as_raw(), width, height],
        )
    }

    /// Whether `format` can be produced from a `basis_format` source
    pub fn is_format_supported(
        &self,
        format: TranscoderTextureFormat,
        basis_format: BasisTexFormat,
    ) -> Result<bool> {
        self.lock().call_bool(
            NativeFnId::IsFormatSupported,
            &[format.as_raw(), basis_format.as_raw()],
        )
    }

    /// Raw `basisu::texture_format` matching a transcoder format
    pub fn basisu_texture_format(&self, format: TranscoderTextureFormat) -> Result<u32> {
        self.lock()
            .call_number(NativeFnId::BasisuTextureFormat, &[format.as_raw()])
    }

    /// Block size (width, height) of a source format
    pub fn tex_format_block_size(&self, basis_format: BasisTexFormat) -> Result<(u32, u32)> {
        let mut runtime = self.lock();
        let width =
            runtime.call_number(NativeFnId::TexFormatBlockWidth, &[basis_format.as_raw()])?;
        let height =
            runtime.call_number(NativeFnId::TexFormatBlockHeight, &[basis_format.as_raw()])?;
        Ok((width, height))
    }

    pub fn tex_format_is_hdr(&self, basis_format: BasisTexFormat) -> Result<bool> {
        self.lock()
            .call_bool(NativeFnId::TexFormatIsHdr, &[basis_format.as_raw()])
    }
}

/// Get-or-create slot for a [`TranscoderModule`]
///
/// Concurrent callers wait on the same in-flight load and all receive the
/// same `Arc`. A failed load leaves the cell empty.
#[derive(Default)]
pub struct ModuleCell {
    cell: tokio::sync::OnceCell<Arc<TranscoderModule>>,
}

impl ModuleCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The module, if already loaded
    pub fn get(&self) -> Option<Arc<TranscoderModule>> {
        self.cell.get().cloned()
    }

    /// Return the loaded module, loading it from `source` on first use
    pub async fn get_or_load(
        &self,
        source: ModuleSource,
        config: &ModuleConfig,
    ) -> Result<Arc<TranscoderModule>> {
        self.get_or_init_with(|| TranscoderModule::load(source, config))
            .await
    }

    /// Return the loaded module, running `load` on first use
    pub async fn get_or_init_with<F, Fut>(&self, load: F) -> Result<Arc<TranscoderModule>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TranscoderModule>>,
    {
        self.cell
            .get_or_try_init(|| async move { load().await.map(Arc::new) })
            .await
            .cloned()
    }
}

static SHARED_MODULE: LazyLock<ModuleCell> = LazyLock::new(ModuleCell::new);

/// Process-wide transcoder module, loaded from `config.path` on first use
pub async fn shared_module(config: &ModuleConfig) -> Result<Arc<TranscoderModule>> {
    SHARED_MODULE
        .get_or_load(ModuleSource::Path(config.path.clone()), config)
        .await
}
