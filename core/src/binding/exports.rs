//! Declarative table of the native transcoder entry points
//!
//! Each entry fixes the export name, the argument count and the return
//! kind. Every argument is an `i32` on the WASM side; pointers are offsets
//! into the module's linear memory.

use crate::error::BindingError;

/// Return kind of a native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    Void,
    /// Native `bool`, returned as 0/1
    Bool,
    /// Any integer result: sizes, enum values, pointers
    Number,
}

/// Tag value used to describe a return kind by example
///
/// `false` tags a boolean result, `0` a numeric result and `Void` no result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentinel {
    Void,
    Bool(bool),
    Number(f64),
}

impl ReturnKind {
    /// Map a sentinel to a return kind
    ///
    /// Only `false`, `0` and `Void` are recognised; anything else leaves the
    /// signature ambiguous and is rejected.
    pub fn from_sentinel(name: &'static str, sentinel: Sentinel) -> Result<Self, BindingError> {
        match sentinel {
            Sentinel::Void => Ok(Self::Void),
            Sentinel::Bool(false) => Ok(Self::Bool),
            Sentinel::Number(n) if n == 0.0 => Ok(Self::Number),
            other => Err(BindingError::AmbiguousSignature {
                name,
                sentinel: format!("{:?}", other),
            }),
        }
    }

    pub fn result_count(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Bool | Self::Number => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Number => "number",
        }
    }
}

/// Static declaration of one native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeExport {
    /// Preferred export name
    pub name: &'static str,
    /// Alternative names tried in order when `name` is absent
    pub aliases: &'static [&'static str],
    pub arity: usize,
    pub returns: ReturnKind,
    /// Missing required exports fail binding; missing optional ones only
    /// fail when called
    pub required: bool,
}

impl NativeExport {
    const fn required(name: &'static str, arity: usize, returns: ReturnKind) -> Self {
        Self {
            name,
            aliases: &[],
            arity,
            returns,
            required: true,
        }
    }

    const fn optional(name: &'static str, arity: usize, returns: ReturnKind) -> Self {
        Self {
            name,
            aliases: &[],
            arity,
            returns,
            required: false,
        }
    }

    const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Build a declaration from a sentinel tag
    pub fn from_sentinel(
        name: &'static str,
        arity: usize,
        sentinel: Sentinel,
    ) -> Result<Self, BindingError> {
        Ok(Self::required(
            name,
            arity,
            ReturnKind::from_sentinel(name, sentinel)?,
        ))
    }

    /// Export names to try, preferred name first
    pub fn candidate_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

/// Index of a native entry point in [`NATIVE_EXPORTS`]
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFnId {
    TranscoderInit,
    FormatHasAlpha,
    FormatIsHdr,
    FormatIsUncompressed,
    BytesPerBlockOrPixel,
    TranscodedImageSize,
    IsFormatSupported,
    BasisuTextureFormat,
    TexFormatBlockWidth,
    TexFormatBlockHeight,
    TexFormatIsHdr,
    Ktx2New,
    Ktx2Delete,
    Ktx2Init,
    Ktx2GetHeader,
    Ktx2GetBasisTexFormat,
    Ktx2StartTranscoding,
    Ktx2GetImageLevelInfo,
    Ktx2TranscodeImageLevel,
    Allocate,
    Release,
}

impl NativeFnId {
    pub const ALL: [NativeFnId; 21] = [
        Self::TranscoderInit,
        Self::FormatHasAlpha,
        Self::FormatIsHdr,
        Self::FormatIsUncompressed,
        Self::BytesPerBlockOrPixel,
        Self::TranscodedImageSize,
        Self::IsFormatSupported,
        Self::BasisuTextureFormat,
        Self::TexFormatBlockWidth,
        Self::TexFormatBlockHeight,
        Self::TexFormatIsHdr,
        Self::Ktx2New,
        Self::Ktx2Delete,
        Self::Ktx2Init,
        Self::Ktx2GetHeader,
        Self::Ktx2GetBasisTexFormat,
        Self::Ktx2StartTranscoding,
        Self::Ktx2GetImageLevelInfo,
        Self::Ktx2TranscodeImageLevel,
        Self::Allocate,
        Self::Release,
    ];

    pub fn export(self) -> &'static NativeExport {
        &NATIVE_EXPORTS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.export().name
    }
}

use ReturnKind::{Bool, Number, Void};

/// The prototype table, ordered like [`NativeFnId`]
pub static NATIVE_EXPORTS: [NativeExport; 21] = [
    NativeExport::required("basisu_transcoder_init", 0, Void),
    NativeExport::required("basis_transcoder_format_has_alpha", 1, Bool),
    NativeExport::required("basis_transcoder_format_is_hdr", 1, Bool),
    NativeExport::required("basis_transcoder_format_is_uncompressed", 1, Bool),
    NativeExport::required("basis_get_bytes_per_block_or_pixel", 1, Number),
    NativeExport::required("basis_compute_transcoded_image_size_in_bytes", 3, Number),
    NativeExport::optional("basis_is_format_supported", 2, Bool),
    NativeExport::optional("basis_get_basisu_texture_format", 1, Number),
    NativeExport::optional("basis_tex_format_get_block_width", 1, Number),
    NativeExport::optional("basis_tex_format_get_block_height", 1, Number),
    NativeExport::optional("basis_tex_format_is_hdr", 1, Bool),
    NativeExport::required("ktx2_transcoder_new", 0, Number),
    NativeExport::required("ktx2_transcoder_delete", 1, Void),
    NativeExport::required("ktx2_transcoder_init", 3, Bool),
    NativeExport::required("ktx2_transcoder_get_header", 1, Number),
    NativeExport::required("ktx2_transcoder_get_basis_texture_format", 1, Number)
        .with_aliases(&["ktx2_transcoder_get_basis_tex_format"]),
    NativeExport::required("ktx2_transcoder_start_transcoding", 1, Bool),
    NativeExport::required("ktx2_transcoder_get_image_level_info", 5, Bool),
    NativeExport::required("ktx2_transcoder_transcode_image_level", 13, Bool)
        .with_aliases(&["transcode_image_level"]),
    NativeExport::required("allocate", 1, Number).with_aliases(&["malloc"]),
    NativeExport::required("release", 1, Void).with_aliases(&["free"]),
];
