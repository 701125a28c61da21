//! Configuration management (`config.toml`)
//!
//! Settings for loading the transcoder module and for new sessions.
//! Stored as TOML; every field has a default so partial files are fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use basis_bridge_shared::DEFAULT_MEMORY_LIMIT;

use crate::error::ConfigError;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Transcoder module settings
    #[serde(default)]
    pub module: ModuleConfig,
    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

/// How the transcoder module is located and instantiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Path to the transcoder `.wasm` (default: basis_transcoder.wasm)
    #[serde(default = "default_module_path")]
    pub path: PathBuf,
    /// Maximum linear memory in bytes (default: 256MB)
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
    /// Satisfy unresolved imports with trapping stubs (default: true)
    #[serde(default = "default_true")]
    pub trap_unknown_imports: bool,
}

/// Defaults applied to new sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Bytes to pre-allocate for the input arena (default: 0)
    #[serde(default)]
    pub initial_input_capacity: u32,
}

fn default_module_path() -> PathBuf {
    PathBuf::from("basis_transcoder.wasm")
}

fn default_memory_limit() -> usize {
    DEFAULT_MEMORY_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            path: default_module_path(),
            memory_limit: default_memory_limit(),
            trap_unknown_imports: default_true(),
        }
    }
}

impl BridgeConfig {
    /// Load a config file, failing on I/O or parse errors
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Linux: `~/.config/basis-bridge`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.basis-bridge", "", "basis-bridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> BridgeConfig {
    config_dir()
        .map(|dir| dir.join("config.toml"))
        .and_then(|path| match BridgeConfig::load(&path) {
            Ok(config) => Some(config),
            Err(ConfigError::Read { .. }) => None,
            Err(e) => {
                tracing::warn!("ignoring config: {:#}", anyhow::Error::from(e));
                None
            }
        })
        .unwrap_or_default()
}
