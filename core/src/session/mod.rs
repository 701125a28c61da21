//! Transcoder sessions
//!
//! A [`TranscoderSession`] owns one native `ktx2_transcoder` object and three
//! arenas (input bytes, output bytes, and the image-level-info record). It
//! walks a small state machine:
//!
//! ```text
//! Created --init--> Initialized --start_transcoding--> TranscodingReady
//!    \                   \                                   \
//!     +-------------------+---------- dispose ---------------+--> Disposed
//! ```
//!
//! Calling an operation in the wrong state is a [`SessionError::InvalidState`].
//! Failures reported by the native side (bad data, out-of-range level,
//! unsupported format) come back as `Ok(false)` or `Ok(None)`.
//!
//! Transcoded output is borrowed from the output arena through
//! [`TranscodedImage`]. It borrows the session, so the next transcode
//! cannot overwrite bytes that are still being read. The module is only
//! locked while the bytes are accessed through
//! [`TranscodedImage::with_data`], [`TranscodedImage::to_vec`] or
//! [`TranscodedImage::into_owned`].

use std::ops::Range;
use std::sync::Arc;

use basis_bridge_shared::{
    BasisTexFormat, DecodeFlags, IMAGE_LEVEL_INFO_SIZE, TranscoderTextureFormat,
};

use crate::arena::MemoryArena;
use crate::binding::NativeFnId;
use crate::error::{ArenaError, Result, SessionError};
use crate::module::TranscoderModule;
use crate::runtime::NativeRuntime;
use crate::views::{ImageLevelInfo, Ktx2Header};

/// Lifecycle state of a [`TranscoderSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Native handle allocated, no texture loaded
    Created,
    /// A texture was accepted by `init`
    Initialized,
    /// `start_transcoding` succeeded for the loaded texture
    TranscodingReady,
    /// Terminal; all native resources are freed
    Disposed,
}

impl SessionState {
    /// A texture is loaded (transcoding may or may not have started)
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::TranscodingReady)
    }
}

/// Parameters for [`TranscoderSession::transcode_image_level`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub format: TranscoderTextureFormat,
    pub level: u32,
    pub layer: u32,
    pub face: u32,
    pub decode_flags: DecodeFlags,
}

impl TranscodeOptions {
    /// Level 0, layer 0, face 0, no decode flags
    pub fn new(format: TranscoderTextureFormat) -> Self {
        Self {
            format,
            level: 0,
            layer: 0,
            face: 0,
            decode_flags: DecodeFlags::empty(),
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn face(mut self, face: u32) -> Self {
        self.face = face;
        self
    }

    pub fn decode_flags(mut self, flags: DecodeFlags) -> Self {
        self.decode_flags = flags;
        self
    }
}

/// A transcoded image level, borrowed from the session's output arena
///
/// The session stays mutably borrowed while this value is alive. The module
/// itself is free for other sessions and queries.
pub struct TranscodedImage<'s> {
    module: &'s TranscoderModule,
    range: Range<usize>,
    format: TranscoderTextureFormat,
    info: ImageLevelInfo,
}

impl TranscodedImage<'_> {
    /// Run `f` on the transcoded bytes
    ///
    /// The module is locked for the duration of `f`, so `f` must not call
    /// back into the same module.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let runtime = self.module.lock();
        // The range was bounds-checked when the image was created and linear
        // memory never shrinks.
        f(&runtime.memory_bytes()[self.range.clone()])
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Original (unpadded) width of the level
    pub fn width(&self) -> u32 {
        self.info.orig_width()
    }

    /// Original (unpadded) height of the level
    pub fn height(&self) -> u32 {
        self.info.orig_height()
    }

    pub fn format(&self) -> TranscoderTextureFormat {
        self.format
    }

    /// Level description the transcode was computed from
    pub fn level_info(&self) -> &ImageLevelInfo {
        &self.info
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.with_data(<[u8]>::to_vec)
    }

    /// Copy the bytes into `dst`, which must be exactly [`len`](Self::len) long
    pub fn copy_into(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != self.len() {
            return Err(SessionError::OutputSizeMismatch {
                expected: self.len(),
                actual: dst.len(),
            }
            .into());
        }
        self.with_data(|bytes| dst.copy_from_slice(bytes));
        Ok(())
    }

    /// Copy the bytes out and release the session borrow
    pub fn into_owned(self) -> OwnedImage {
        OwnedImage {
            data: self.to_vec(),
            width: self.width(),
            height: self.height(),
            format: self.format,
        }
    }
}

impl std::fmt::Debug for TranscodedImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodedImage")
            .field("format", &self.format)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("len", &self.len())
            .finish()
    }
}

/// A transcoded image level copied out of native memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TranscoderTextureFormat,
}

/// One native KTX2 transcoder plus its reusable buffers
pub struct TranscoderSession {
    module: Arc<TranscoderModule>,
    /// Native `ktx2_transcoder*`; 0 once disposed
    handle: u32,
    input: MemoryArena,
    output: MemoryArena,
    level_info: MemoryArena,
    state: SessionState,
}

impl TranscoderSession {
    /// Create a session with an empty input arena
    pub fn new(module: Arc<TranscoderModule>) -> Result<Self> {
        Self::with_input_capacity(module, 0)
    }

    /// Create a session whose input arena is pre-grown to `input_capacity`
    pub fn with_input_capacity(module: Arc<TranscoderModule>, input_capacity: u32) -> Result<Self> {
        let handle = module.lock().call_number(NativeFnId::Ktx2New, &[])?;
        if handle == 0 {
            return Err(SessionError::HandleAllocationFailed.into());
        }

        let mut session = Self {
            module,
            handle,
            input: MemoryArena::new("input"),
            output: MemoryArena::new("output"),
            level_info: MemoryArena::new("level-info"),
            state: SessionState::Created,
        };

        {
            let mut runtime = session.module.lock();
            session
                .level_info
                .ensure(&mut runtime, IMAGE_LEVEL_INFO_SIZE as u32)?;
            if input_capacity > 0 {
                session.input.ensure(&mut runtime, input_capacity)?;
            }
        }

        tracing::debug!("created transcoder session (handle {:#x})", handle);
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn module(&self) -> &Arc<TranscoderModule> {
        &self.module
    }

    /// Bytes currently reserved for input data
    pub fn input_capacity(&self) -> u32 {
        self.input.capacity()
    }

    /// Bytes currently reserved for transcoded output
    pub fn output_capacity(&self) -> u32 {
        self.output.capacity()
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            }
            .into())
        }
    }

    /// Load a KTX2 file
    ///
    /// Copies `data` into the input arena (reusing it when large enough)
    /// and hands it to the native transcoder. Output from an earlier file
    /// is released first. Returns `Ok(false)` if the native side rejects
    /// the data; the state is then left as it was.
    ///
    /// An `Err` means the previous input may already be gone, so the
    /// session drops back to [`SessionState::Created`].
    pub fn init(&mut self, data: &[u8]) -> Result<bool> {
        self.require("init", |state| state != SessionState::Disposed)?;
        if data.is_empty() {
            tracing::debug!("init called with empty data");
            return Ok(false);
        }

        let loaded = {
            let mut runtime = self.module.lock();
            load_input(&mut runtime, self.handle, &mut self.input, &mut self.output, data)
        };

        match loaded {
            Ok(ok) => {
                if ok {
                    self.state = SessionState::Initialized;
                } else {
                    tracing::debug!("native transcoder rejected {} bytes of KTX2 data", data.len());
                }
                Ok(ok)
            }
            Err(e) => {
                self.state = SessionState::Created;
                Err(e)
            }
        }
    }

    /// The header of the loaded file
    ///
    /// Re-read from the native object on every call, since `init`
    /// repopulates it.
    pub fn header(&self) -> Result<Ktx2Header> {
        self.require("header", SessionState::is_initialized)?;
        let mut runtime = self.module.lock();
        let ptr = runtime.call_number(NativeFnId::Ktx2GetHeader, &[self.handle])?;
        runtime.read_pod(ptr)
    }

    /// Source encoding of the loaded file
    pub fn basis_tex_format(&self) -> Result<BasisTexFormat> {
        self.require("basis_tex_format", SessionState::is_initialized)?;
        let raw = self
            .module
            .lock()
            .call_number(NativeFnId::Ktx2GetBasisTexFormat, &[self.handle])?;
        Ok(BasisTexFormat::from_raw(raw))
    }

    /// Number of mip levels in the loaded file (at least 1)
    pub fn levels(&self) -> Result<u32> {
        Ok(self.header()?.levels())
    }

    /// Number of array layers in the loaded file (at least 1)
    pub fn layers(&self) -> Result<u32> {
        Ok(self.header()?.layers())
    }

    pub fn faces(&self) -> Result<u32> {
        Ok(self.header()?.face_count())
    }

    /// Decode global data and prepare for transcoding
    pub fn start_transcoding(&mut self) -> Result<bool> {
        self.require("start_transcoding", SessionState::is_initialized)?;
        let ok = self
            .module
            .lock()
            .call_bool(NativeFnId::Ktx2StartTranscoding, &[self.handle])?;
        if ok {
            self.state = SessionState::TranscodingReady;
        } else {
            tracing::debug!("native transcoder failed to start transcoding");
        }
        Ok(ok)
    }

    /// Describe one image of the loaded file
    ///
    /// `Ok(None)` when (`level`, `layer`, `face`) is out of range.
    pub fn image_level_info(
        &mut self,
        level: u32,
        layer: u32,
        face: u32,
    ) -> Result<Option<ImageLevelInfo>> {
        self.require("image_level_info", SessionState::is_initialized)?;
        let mut runtime = self.module.lock();
        fill_level_info(
            &mut runtime,
            self.handle,
            &self.level_info,
            level,
            layer,
            face,
        )
    }

    /// Transcode one image into the output arena
    ///
    /// `Ok(None)` when the native side cannot produce the requested image.
    /// The session stays ready for further calls either way.
    pub fn transcode_image_level(
        &mut self,
        options: &TranscodeOptions,
    ) -> Result<Option<TranscodedImage<'_>>> {
        self.require("transcode_image_level", |state| {
            state == SessionState::TranscodingReady
        })?;

        let mut runtime = self.module.lock();
        let Some(info) = fill_level_info(
            &mut runtime,
            self.handle,
            &self.level_info,
            options.level,
            options.layer,
            options.face,
        )?
        else {
            tracing::debug!(
                "no image at level {} layer {} face {}",
                options.level,
                options.layer,
                options.face
            );
            return Ok(None);
        };

        let format = options.format.as_raw();
        let (width, height) = (info.orig_width(), info.orig_height());
        let size = runtime.call_number(
            NativeFnId::TranscodedImageSize,
            &[format, width, height],
        )?;
        if size == 0 {
            return Ok(None);
        }

        self.output.ensure(&mut runtime, size)?;
        let out = self
            .output
            .resolve(self.output.ptr().ok_or(ArenaError::Unallocated)?)?;

        // Uncompressed targets are addressed in pixels, block formats in blocks
        let (count, row_pitch, rows) =
            if runtime.call_bool(NativeFnId::FormatIsUncompressed, &[format])? {
                (width.saturating_mul(height), width, height)
            } else {
                let block_bytes =
                    runtime.call_number(NativeFnId::BytesPerBlockOrPixel, &[format])?;
                (size.checked_div(block_bytes).unwrap_or(0), 0, 0)
            };

        let ok = runtime.call_bool(
            NativeFnId::Ktx2TranscodeImageLevel,
            &[
                self.handle,
                options.level,
                options.layer,
                options.face,
                out,
                count,
                format,
                options.decode_flags.bits(),
                row_pitch,
                rows,
                u32::MAX, // channel0: unused
                u32::MAX, // channel1: unused
                0,        // no external transcode state
            ],
        )?;
        if !ok {
            tracing::debug!(
                "transcode of level {} to {} failed",
                options.level,
                options.format
            );
            return Ok(None);
        }

        let start = out as usize;
        runtime.read(out, size)?;
        Ok(Some(TranscodedImage {
            module: &self.module,
            range: start..start + size as usize,
            format: options.format,
            info,
        }))
    }

    /// Free the native transcoder and all arenas
    ///
    /// Never fails; repeated calls do nothing. Also run on drop.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }

        let mut runtime = self.module.lock();
        if self.handle != 0 {
            if let Err(e) = runtime.call_void(NativeFnId::Ktx2Delete, &[self.handle]) {
                tracing::warn!("failed to delete native transcoder: {:#}", anyhow::Error::from(e));
            }
            self.handle = 0;
        }
        for arena in [&mut self.input, &mut self.output, &mut self.level_info] {
            if let Err(e) = arena.release(&mut runtime) {
                tracing::warn!(
                    "failed to release {} arena: {:#}",
                    arena.label(),
                    anyhow::Error::from(e)
                );
            }
        }

        self.state = SessionState::Disposed;
        tracing::debug!("disposed transcoder session");
    }
}

impl Drop for TranscoderSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn load_input(
    runtime: &mut NativeRuntime,
    handle: u32,
    input: &mut MemoryArena,
    output: &mut MemoryArena,
    data: &[u8],
) -> Result<bool> {
    output.release(runtime)?;
    let ptr = input.write(runtime, data)?;
    let offset = input.resolve(ptr)?;
    runtime.call_bool(NativeFnId::Ktx2Init, &[handle, offset, data.len() as u32])
}

fn fill_level_info(
    runtime: &mut NativeRuntime,
    handle: u32,
    arena: &MemoryArena,
    level: u32,
    layer: u32,
    face: u32,
) -> Result<Option<ImageLevelInfo>> {
    let offset = arena.resolve(arena.ptr().ok_or(ArenaError::Unallocated)?)?;
    let ok = runtime.call_bool(
        NativeFnId::Ktx2GetImageLevelInfo,
        &[handle, offset, level, layer, face],
    )?;
    if !ok {
        return Ok(None);
    }
    runtime.read_pod(offset).map(Some)
}
