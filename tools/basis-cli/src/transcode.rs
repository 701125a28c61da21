//! Transcode command - write one image level to disk
//!
//! Output is the raw transcoded bytes, except for RGBA32 written to a
//! `.png` path, which is encoded as a PNG image.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use basis_bridge_core::{DecodeFlags, OwnedImage, TranscodeOptions, TranscoderTextureFormat};

use crate::info::{open_session, read_ktx2};
use crate::module_args::ModuleArgs;

/// Arguments for the transcode command
#[derive(Args)]
pub struct TranscodeArgs {
    /// KTX2 file to transcode
    pub input: PathBuf,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Target format (e.g. rgba32, bc7-rgba, astc-4x4-rgba)
    #[arg(short, long, default_value = "rgba32")]
    pub format: TranscoderTextureFormat,

    /// Mip level
    #[arg(long, default_value_t = 0)]
    pub level: u32,

    /// Array layer
    #[arg(long, default_value_t = 0)]
    pub layer: u32,

    /// Cubemap face
    #[arg(long, default_value_t = 0)]
    pub face: u32,

    /// Favour quality over speed where the target supports it
    #[arg(long)]
    pub high_quality: bool,

    #[command(flatten)]
    pub module: ModuleArgs,
}

impl TranscodeArgs {
    fn options(&self) -> TranscodeOptions {
        let mut flags = DecodeFlags::empty();
        if self.high_quality {
            flags |= DecodeFlags::HIGH_QUALITY;
        }
        TranscodeOptions::new(self.format)
            .level(self.level)
            .layer(self.layer)
            .face(self.face)
            .decode_flags(flags)
    }
}

/// Whether the image should be PNG-encoded rather than written raw
fn writes_png(format: TranscoderTextureFormat, path: &Path) -> bool {
    format == TranscoderTextureFormat::Rgba32
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn write_image(image: &OwnedImage, path: &Path) -> Result<()> {
    if writes_png(image.format, path) {
        let rgba = image::RgbaImage::from_raw(image.width, image.height, image.data.clone())
            .context("Transcoded RGBA32 data does not match the image size")?;
        rgba.save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        std::fs::write(path, &image.data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Execute the transcode command
pub async fn execute(args: TranscodeArgs) -> Result<()> {
    let data = read_ktx2(&args.input).await?;
    let (config, module) = args.module.load().await?;
    let mut session = open_session(&module, &config.session, &data, &args.input)?;

    let basis_format = session.basis_tex_format()?;
    if session.module().format_is_hdr(args.format)?
        && !session.module().tex_format_is_hdr(basis_format).unwrap_or(true)
    {
        tracing::warn!(
            "{} is an HDR target but the source is {}; transcoding will likely fail",
            args.format,
            basis_format
        );
    }

    if !session.start_transcoding()? {
        anyhow::bail!("Transcoder failed to start on {}", args.input.display());
    }

    let options = args.options();
    let image = session
        .transcode_image_level(&options)?
        .map(|image| image.into_owned())
        .with_context(|| {
            format!(
                "Cannot transcode level {} layer {} face {} of {} to {}",
                options.level,
                options.layer,
                options.face,
                args.input.display(),
                options.format
            )
        })?;

    write_image(&image, &args.output)?;
    println!(
        "Wrote {} ({}x{} {}, {} bytes)",
        args.output.display(),
        image.width,
        image.height,
        image.format,
        image.data.len()
    );

    session.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32, format: TranscoderTextureFormat, len: usize) -> OwnedImage {
        OwnedImage {
            data: vec![0x7F; len],
            width,
            height,
            format,
        }
    }

    #[test]
    fn test_png_only_for_rgba32() {
        assert!(writes_png(TranscoderTextureFormat::Rgba32, Path::new("a.png")));
        assert!(writes_png(TranscoderTextureFormat::Rgba32, Path::new("a.PNG")));
        assert!(!writes_png(TranscoderTextureFormat::Rgba32, Path::new("a.bin")));
        assert!(!writes_png(TranscoderTextureFormat::Bc7Rgba, Path::new("a.png")));
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        write_image(&image(2, 3, TranscoderTextureFormat::Rgba32, 24), &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(decoded.get_pixel(1, 2).0, [0x7F; 4]);
    }

    #[test]
    fn test_write_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bc7");
        write_image(&image(4, 4, TranscoderTextureFormat::Bc7Rgba, 16), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 16);
    }

    #[test]
    fn test_png_size_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        assert!(write_image(&image(4, 4, TranscoderTextureFormat::Rgba32, 10), &path).is_err());
    }

    #[test]
    fn test_options_from_args() {
        let args = TranscodeArgs {
            input: PathBuf::from("in.ktx2"),
            output: PathBuf::from("out.bin"),
            format: TranscoderTextureFormat::Etc2Rgba,
            level: 1,
            layer: 2,
            face: 3,
            high_quality: true,
            module: ModuleArgs::default(),
        };
        let options = args.options();
        assert_eq!(options.format, TranscoderTextureFormat::Etc2Rgba);
        assert_eq!((options.level, options.layer, options.face), (1, 2, 3));
        assert_eq!(options.decode_flags, DecodeFlags::HIGH_QUALITY);
    }
}
