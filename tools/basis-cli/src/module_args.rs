//! Options shared by every command that loads the transcoder

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use basis_bridge_core::{BridgeConfig, TranscoderModule, shared_module};

/// Where to find the transcoder and how to run it
#[derive(Args, Debug, Clone, Default)]
pub struct ModuleArgs {
    /// Path to the transcoder .wasm (overrides the config file)
    #[arg(short, long)]
    pub module: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Linear memory limit in MiB (overrides the config file)
    #[arg(long)]
    pub memory_limit_mib: Option<usize>,
}

impl ModuleArgs {
    /// Merge command-line flags over the config file
    pub fn resolve(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => basis_bridge_core::config::load(),
        };

        if let Some(path) = &self.module {
            config.module.path = path.clone();
        }
        if let Some(mib) = self.memory_limit_mib {
            config.module.memory_limit = mib
                .checked_mul(1024 * 1024)
                .with_context(|| format!("--memory-limit-mib {} is too large", mib))?;
        }
        Ok(config)
    }

    /// Resolve the config and load the transcoder
    pub async fn load(&self) -> Result<(BridgeConfig, Arc<TranscoderModule>)> {
        let config = self.resolve()?;
        tracing::info!("loading transcoder from {}", config.module.path.display());
        let module = shared_module(&config.module).await.with_context(|| {
            format!(
                "Failed to load transcoder module {}",
                config.module.path.display()
            )
        })?;
        Ok((config, module))
    }
}
