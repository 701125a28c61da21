//! basis-bridge CLI - inspect and transcode KTX2 files through a WASM transcoder
//!
//! # Commands
//!
//! - `basis-bridge info` - Print the header and per-image layout of a KTX2 file
//! - `basis-bridge transcode` - Transcode one image to a GPU or raw pixel format
//! - `basis-bridge formats` - List target formats and their properties
//!
//! # Usage
//!
//! ```bash
//! basis-bridge info --module basis_transcoder.wasm texture.ktx2
//! basis-bridge transcode --module basis_transcoder.wasm -f rgba32 -o out.png texture.ktx2
//! ```
//!
//! Settings not given on the command line come from `config.toml` in the
//! platform config directory (on Linux: `~/.config/basis-bridge`).

mod formats;
mod info;
mod module_args;
mod transcode;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// basis-bridge - KTX2 transcoding through a WASM Basis Universal transcoder
#[derive(Parser)]
#[command(name = "basis-bridge")]
#[command(about = "Inspect and transcode KTX2 textures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header fields and per-level info
    Info(info::InfoArgs),

    /// Transcode one image level to a file
    Transcode(transcode::TranscodeArgs),

    /// List target formats and their properties
    Formats(formats::FormatsArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => info::execute(args).await,
        Commands::Transcode(args) => transcode::execute(args).await,
        Commands::Formats(args) => formats::execute(args).await,
    }
}
