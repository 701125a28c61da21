//! Error types for the transcoder bridge
//!
//! Only misuse of the session state machine and broken module contracts
//! become errors. Native-reported failures (bad data, out-of-range
//! levels, unsupported format combinations) are plain `false`/`None`
//! return values and never show up here.

use crate::session::SessionState;

/// Unified error type for the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The native side trapped during a call
    #[error("native call '{name}' trapped")]
    Trap {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Binding table construction and call errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// A required export is absent from the module
    #[error("native export '{name}' not found")]
    MissingExport { name: &'static str },

    /// The export exists but its WASM signature disagrees with the declaration
    #[error("native export '{name}' has signature {found}, expected {expected}")]
    SignatureMismatch {
        name: &'static str,
        expected: String,
        found: String,
    },

    /// A sentinel value that maps to no return kind
    #[error("ambiguous signature tag for '{name}': {sentinel}")]
    AmbiguousSignature { name: &'static str, sentinel: String },

    /// Called with the wrong number of arguments
    #[error("'{name}' takes {expected} argument(s), got {got}")]
    ArityMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    /// Called through a typed helper that expects a different return kind
    #[error("'{name}' returned {found}, expected {expected}")]
    UnexpectedReturn {
        name: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Memory arena errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// The native allocator returned null
    #[error("native allocation of {size} bytes failed")]
    AllocationFailed { size: u32 },

    /// Pointer minted by a different arena
    #[error("pointer belongs to arena {found}, not arena {expected}")]
    ForeignPointer { expected: u64, found: u64 },

    /// Pointer minted before the arena was reallocated or released
    #[error("stale pointer (generation {found}, arena is at generation {current})")]
    StalePointer { current: u32, found: u32 },

    /// Arena holds no allocation
    #[error("arena holds no allocation")]
    Unallocated,

    /// Range exceeds the arena capacity or the linear memory
    #[error("range {offset}+{len} out of bounds (limit {limit})")]
    OutOfBounds { offset: u32, len: u32, limit: usize },
}

/// Session usage errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Operation called in a state that does not allow it
    #[error("{operation}() is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// `ktx2_transcoder_new` returned null
    #[error("native transcoder allocation failed")]
    HandleAllocationFailed,

    /// Destination buffer does not match the transcoded size
    #[error("output buffer is {actual} bytes, transcoded image is {expected} bytes")]
    OutputSizeMismatch { expected: usize, actual: usize },
}

/// Module loading errors
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("failed to read transcoder module from {path}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile transcoder module")]
    Compile(#[source] anyhow::Error),

    #[error("failed to instantiate transcoder module")]
    Instantiate(#[source] anyhow::Error),

    #[error(
        "module requires {required} bytes of linear memory, limit is {limit} bytes"
    )]
    MemoryLimit { required: usize, limit: usize },

    #[error("module does not export linear memory '{0}'")]
    MissingMemory(&'static str),
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
