//! Formats command - list target formats as reported by the transcoder

use anyhow::Result;
use clap::Args;

use basis_bridge_core::TranscoderTextureFormat;

use crate::module_args::ModuleArgs;

/// Arguments for the formats command
#[derive(Args)]
pub struct FormatsArgs {
    #[command(flatten)]
    pub module: ModuleArgs,
}

/// Execute the formats command
pub async fn execute(args: FormatsArgs) -> Result<()> {
    let (_config, module) = args.module.load().await?;

    println!(
        "{:<20} {:>4}  {:<5}  {:<3}  {:<12}  {:>5}",
        "FORMAT", "ID", "ALPHA", "HDR", "LAYOUT", "BYTES"
    );
    for &(format, name) in TranscoderTextureFormat::ALL {
        let uncompressed = module.format_is_uncompressed(format)?;
        println!(
            "{:<20} {:>4}  {:<5}  {:<3}  {:<12}  {:>5}",
            name,
            format.as_raw(),
            yes_no(module.format_has_alpha(format)?),
            yes_no(module.format_is_hdr(format)?),
            if uncompressed { "per pixel" } else { "per block" },
            module.bytes_per_block_or_pixel(format)?
        );
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
