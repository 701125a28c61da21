//! Info command - print the layout of a KTX2 file

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basis_bridge_core::{SessionConfig, TranscoderModule, TranscoderSession, TranscoderTextureFormat};
use basis_bridge_shared::{KTX2_EXTENSION, has_ktx2_identifier};

use crate::module_args::ModuleArgs;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// KTX2 file to inspect
    pub input: PathBuf,

    #[command(flatten)]
    pub module: ModuleArgs,

    /// Also print every (level, layer, face) image
    #[arg(long)]
    pub images: bool,
}

/// Read a KTX2 file, rejecting anything without the KTX2 identifier
pub async fn read_ktx2(path: &Path) -> Result<Vec<u8>> {
    if path.extension().is_some_and(|ext| ext != KTX2_EXTENSION) {
        tracing::warn!("{} does not have a .{} extension", path.display(), KTX2_EXTENSION);
    }
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if !has_ktx2_identifier(&data) {
        anyhow::bail!("{} is not a KTX2 file (bad identifier)", path.display());
    }
    Ok(data)
}

/// Load `data` into a fresh session
pub fn open_session(
    module: &Arc<TranscoderModule>,
    config: &SessionConfig,
    data: &[u8],
    path: &Path,
) -> Result<TranscoderSession> {
    let mut session = module.new_session_with(config)?;
    if !session.init(data)? {
        anyhow::bail!("Transcoder rejected {}", path.display());
    }
    Ok(session)
}

/// Execute the info command
pub async fn execute(args: InfoArgs) -> Result<()> {
    let data = read_ktx2(&args.input).await?;
    let (config, module) = args.module.load().await?;
    let mut session = open_session(&module, &config.session, &data, &args.input)?;

    let header = session.header()?;
    let basis_format = session.basis_tex_format()?;

    println!("{}", args.input.display());
    println!("  Size:         {} bytes", data.len());
    println!(
        "  Dimensions:   {}x{}x{}",
        header.pixel_width(),
        header.pixel_height(),
        header.pixel_depth()
    );
    println!("  Levels:       {}", header.level_count());
    println!("  Layers:       {}", header.layer_count());
    println!("  Faces:        {}", header.face_count());
    println!("  vkFormat:     {}", header.vk_format());
    println!("  Supercomp.:   {:?}", header.supercompression_scheme());
    println!("  Basis format: {}", basis_format);

    let levels = session.levels()?;
    let layers = session.layers()?;
    let faces = session.faces()?;

    println!();
    println!("  Level  Size        Blocks   Alpha");
    for level in 0..levels {
        let Some(info) = session.image_level_info(level, 0, 0)? else {
            println!("  {:>5}  (unavailable)", level);
            continue;
        };
        println!(
            "  {:>5}  {:<10}  {:<7}  {}",
            level,
            format!("{}x{}", info.orig_width(), info.orig_height()),
            info.total_blocks(),
            if info.has_alpha() { "yes" } else { "no" }
        );
    }

    if args.images {
        println!();
        for level in 0..levels {
            for layer in 0..layers {
                for face in 0..faces {
                    match session.image_level_info(level, layer, face)? {
                        Some(info) => println!(
                            "  level {} layer {} face {}: {}x{} ({}x{} blocks of {}x{}){}",
                            level,
                            layer,
                            face,
                            info.orig_width(),
                            info.orig_height(),
                            info.num_blocks_x(),
                            info.num_blocks_y(),
                            info.block_width(),
                            info.block_height(),
                            if info.is_iframe() { " [key frame]" } else { "" }
                        ),
                        None => println!("  level {} layer {} face {}: unavailable", level, layer, face),
                    }
                }
            }
        }
    }

    // Size of level 0 in the most common targets
    let module = session.module().clone();
    let (width, height) = (header.pixel_width(), header.pixel_height());
    println!();
    for format in [
        TranscoderTextureFormat::Rgba32,
        TranscoderTextureFormat::Bc7Rgba,
        TranscoderTextureFormat::Astc4x4Rgba,
    ] {
        let size = module.transcoded_image_size(format, width, height)?;
        println!("  As {:<14} {} bytes", format.to_string() + ":", size);
    }

    session.dispose();
    Ok(())
}
