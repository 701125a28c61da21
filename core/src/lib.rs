//! Basis Bridge Core - host for a WASM-compiled Basis Universal transcoder
//!
//! Loads the transcoder module once per process and drives KTX2 transcoding
//! through its C ABI.
//!
//! # Architecture
//!
//! - [`TranscoderModule`] - Loaded module with its bound native entry points
//! - [`BindingTable`] - Static declaration of every native export, checked at load time
//! - [`MemoryArena`] - Grow-only native buffer with generation-checked pointers
//! - [`TranscoderSession`] - State machine around one native KTX2 transcoder
//! - [`ModuleCell`] - Get-or-create slot so concurrent loaders share one module

pub mod arena;
pub mod binding;
pub mod config;
pub mod error;
pub mod module;
pub mod runtime;
pub mod session;
#[cfg(test)]
pub mod test_utils;
pub mod views;

pub use arena::{ArenaId, ArenaPtr, MemoryArena};
pub use binding::{BindingTable, NativeExport, NativeFn, NativeFnId, NativeValue, ReturnKind};
pub use config::{BridgeConfig, ModuleConfig, SessionConfig};
pub use error::{ArenaError, BindingError, ConfigError, Error, ModuleError, Result, SessionError};
pub use module::{ModuleCell, ModuleSource, TranscoderEngine, TranscoderModule, shared_module};
pub use runtime::NativeRuntime;
pub use session::{OwnedImage, SessionState, TranscodeOptions, TranscodedImage, TranscoderSession};
pub use views::{ImageLevelInfo, Ktx2Header};

// Re-export the format enums so callers need only this crate
pub use basis_bridge_shared::{
    BasisTexFormat, DecodeFlags, SupercompressionScheme, TranscoderTextureFormat,
};
