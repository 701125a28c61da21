//! Texture format enumerations shared between the host and the CLI.
//!
//! Discriminants are the raw values the native transcoder uses for
//! `transcoder_texture_format`, `basis_tex_format` and the KTX2
//! supercompression scheme. They cross the boundary as plain `u32`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a format name fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown texture format '{0}'")]
pub struct UnknownFormatName(pub String);

/// Target format for transcoding (`transcoder_texture_format`)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TranscoderTextureFormat {
    Etc1Rgb = 0,
    Etc2Rgba = 1,
    Bc1Rgb = 2,
    Bc3Rgba = 3,
    Bc4R = 4,
    Bc5Rg = 5,
    Bc7Rgba = 6,
    Pvrtc1_4Rgb = 8,
    Pvrtc1_4Rgba = 9,
    Astc4x4Rgba = 10,
    AtcRgb = 11,
    AtcRgba = 12,
    Rgba32 = 13,
    Rgb565 = 14,
    Bgr565 = 15,
    Rgba4444 = 16,
    Fxt1Rgb = 17,
    Pvrtc2_4Rgb = 18,
    Pvrtc2_4Rgba = 19,
    Etc2EacR11 = 20,
    Etc2EacRg11 = 21,
    Bc6h = 22,
    AstcHdr4x4Rgba = 23,
    RgbHalf = 24,
    RgbaHalf = 25,
    Rgb9e5 = 26,
    AstcHdr6x6Rgba = 27,
}

impl TranscoderTextureFormat {
    /// Every format with its CLI name, in discriminant order
    pub const ALL: &'static [(Self, &'static str)] = &[
        (Self::Etc1Rgb, "etc1-rgb"),
        (Self::Etc2Rgba, "etc2-rgba"),
        (Self::Bc1Rgb, "bc1-rgb"),
        (Self::Bc3Rgba, "bc3-rgba"),
        (Self::Bc4R, "bc4-r"),
        (Self::Bc5Rg, "bc5-rg"),
        (Self::Bc7Rgba, "bc7-rgba"),
        (Self::Pvrtc1_4Rgb, "pvrtc1-4-rgb"),
        (Self::Pvrtc1_4Rgba, "pvrtc1-4-rgba"),
        (Self::Astc4x4Rgba, "astc-4x4-rgba"),
        (Self::AtcRgb, "atc-rgb"),
        (Self::AtcRgba, "atc-rgba"),
        (Self::Rgba32, "rgba32"),
        (Self::Rgb565, "rgb565"),
        (Self::Bgr565, "bgr565"),
        (Self::Rgba4444, "rgba4444"),
        (Self::Fxt1Rgb, "fxt1-rgb"),
        (Self::Pvrtc2_4Rgb, "pvrtc2-4-rgb"),
        (Self::Pvrtc2_4Rgba, "pvrtc2-4-rgba"),
        (Self::Etc2EacR11, "etc2-eac-r11"),
        (Self::Etc2EacRg11, "etc2-eac-rg11"),
        (Self::Bc6h, "bc6h"),
        (Self::AstcHdr4x4Rgba, "astc-hdr-4x4-rgba"),
        (Self::RgbHalf, "rgb-half"),
        (Self::RgbaHalf, "rgba-half"),
        (Self::Rgb9e5, "rgb-9e5"),
        (Self::AstcHdr6x6Rgba, "astc-hdr-6x6-rgba"),
    ];

    /// Raw value passed across the native boundary
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Look up a format by its raw native value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(format, _)| format.as_raw() == raw)
            .map(|(format, _)| *format)
    }

    /// Short lowercase name (used by the CLI and config files)
    pub fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for TranscoderTextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TranscoderTextureFormat {
    type Err = UnknownFormatName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .find(|(_, name)| *name == wanted)
            .map(|(format, _)| *format)
            .ok_or_else(|| UnknownFormatName(s.to_string()))
    }
}

impl From<TranscoderTextureFormat> for &'static str {
    fn from(format: TranscoderTextureFormat) -> Self {
        format.name()
    }
}

impl TryFrom<String> for TranscoderTextureFormat {
    type Error = UnknownFormatName;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

/// Source encoding of a loaded texture (`basis_tex_format`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasisTexFormat {
    Etc1s,
    Uastc4x4,
    UastcHdr4x4,
    AstcHdr6x6,
    UastcHdr6x6Intermediate,
    /// Value this host does not know about
    Other(u32),
}

impl BasisTexFormat {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Etc1s,
            1 => Self::Uastc4x4,
            2 => Self::UastcHdr4x4,
            3 => Self::AstcHdr6x6,
            4 => Self::UastcHdr6x6Intermediate,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Etc1s => 0,
            Self::Uastc4x4 => 1,
            Self::UastcHdr4x4 => 2,
            Self::AstcHdr6x6 => 3,
            Self::UastcHdr6x6Intermediate => 4,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for BasisTexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Etc1s => f.write_str("ETC1S"),
            Self::Uastc4x4 => f.write_str("UASTC 4x4"),
            Self::UastcHdr4x4 => f.write_str("UASTC HDR 4x4"),
            Self::AstcHdr6x6 => f.write_str("ASTC HDR 6x6"),
            Self::UastcHdr6x6Intermediate => f.write_str("UASTC HDR 6x6 intermediate"),
            Self::Other(raw) => write!(f, "unknown ({})", raw),
        }
    }
}

/// KTX2 `supercompressionScheme` header field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupercompressionScheme {
    None,
    BasisLz,
    Zstandard,
    Zlib,
    Other(u32),
}

impl SupercompressionScheme {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::BasisLz,
            2 => Self::Zstandard,
            3 => Self::Zlib,
            other => Self::Other(other),
        }
    }
}

bitflags::bitflags! {
    /// Decode flags forwarded verbatim to `transcode_image_level`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DecodeFlags: u32 {
        const PVRTC_DECODE_TO_NEXT_POW2 = 2;
        const TRANSCODE_ALPHA_DATA_TO_OPAQUE_FORMATS = 4;
        const BC1_FORBID_THREE_COLOR_BLOCKS = 8;
        const OUTPUT_HAS_ALPHA_INDICES = 16;
        const HIGH_QUALITY = 32;
        const NO_ETC1S_CHROMA_FILTERING = 64;
    }
}
