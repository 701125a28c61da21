//! Shared test utilities
//!
//! Provides a fake transcoder module written in WAT that implements the
//! native C ABI closely enough to drive sessions end to end, plus a builder
//! for synthetic KTX2 buffers.

use std::sync::Arc;

use basis_bridge_shared::{KTX2_HEADER_SIZE, KTX2_IDENTIFIER};

use crate::config::ModuleConfig;
use crate::module::{TranscoderEngine, TranscoderModule};
use crate::runtime::NativeRuntime;

/// Fake transcoder implementing the native ABI
///
/// - Bump allocator with an 8-byte block header (size, live marker) and
///   counters for live/total allocations, frees and double frees.
/// - Transcoder objects are 128 bytes: header copy at 0, initialised flag
///   at 80, started flag at 84.
/// - Basis format is ETC1S when the supercompression scheme is BasisLZ,
///   UASTC otherwise. HDR targets are rejected for ETC1S sources.
/// - Transcoding fills the output with `0xA0 + level` and records the
///   argument layout of the last call.
/// - Memory is capped at 64 pages so large allocations fail.
pub const FAKE_TRANSCODER_WAT: &str = r#"
(module
  (memory (export "memory") 2 64)

  (global $heap (mut i32) (i32.const 4096))
  (global $live (mut i32) (i32.const 0))
  (global $total (mut i32) (i32.const 0))
  (global $frees (mut i32) (i32.const 0))
  (global $double_frees (mut i32) (i32.const 0))
  (global $init_calls (mut i32) (i32.const 0))
  (global $last_count (mut i32) (i32.const 0))
  (global $last_pitch (mut i32) (i32.const 0))
  (global $last_rows (mut i32) (i32.const 0))
  (global $last_flags (mut i32) (i32.const 0))
  (global $last_channel0 (mut i32) (i32.const 0))
  (global $last_channel1 (mut i32) (i32.const 0))
  (global $last_state (mut i32) (i32.const 0))
  (global $lw (mut i32) (i32.const 0))
  (global $lh (mut i32) (i32.const 0))

  ;; ---------------------------------------------------------------- allocator

  (func $allocate (export "allocate") (param $size i32) (result i32)
    (local $ptr i32)
    (local $end i32)
    (local.set $ptr (i32.add (global.get $heap) (i32.const 8)))
    (local.set $end
      (i32.and
        (i32.add (i32.add (local.get $ptr) (local.get $size)) (i32.const 7))
        (i32.const -8)))
    (if (i32.gt_u (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
      (then
        (if (i32.eq
              (memory.grow
                (i32.add
                  (i32.shr_u
                    (i32.sub (local.get $end) (i32.mul (memory.size) (i32.const 65536)))
                    (i32.const 16))
                  (i32.const 1)))
              (i32.const -1))
          (then (return (i32.const 0))))))
    (i32.store (i32.sub (local.get $ptr) (i32.const 8)) (local.get $size))
    (i32.store (i32.sub (local.get $ptr) (i32.const 4)) (i32.const 0x0A110C8D))
    (global.set $heap (local.get $end))
    (global.set $live (i32.add (global.get $live) (i32.const 1)))
    (global.set $total (i32.add (global.get $total) (i32.const 1)))
    (local.get $ptr))

  (func $release (export "release") (param $ptr i32)
    (if (i32.eqz (local.get $ptr)) (then (return)))
    (if (i32.ne (i32.load (i32.sub (local.get $ptr) (i32.const 4))) (i32.const 0x0A110C8D))
      (then
        (global.set $double_frees (i32.add (global.get $double_frees) (i32.const 1)))
        (return)))
    (i32.store (i32.sub (local.get $ptr) (i32.const 4)) (i32.const 0xDEAD))
    (global.set $live (i32.sub (global.get $live) (i32.const 1)))
    (global.set $frees (i32.add (global.get $frees) (i32.const 1))))

  ;; ------------------------------------------------------------ format queries

  (func (export "basisu_transcoder_init")
    (global.set $init_calls (i32.add (global.get $init_calls) (i32.const 1))))

  (func $is_uncompressed (export "basis_transcoder_format_is_uncompressed")
    (param $f i32) (result i32)
    (i32.or
      (i32.and (i32.ge_u (local.get $f) (i32.const 13)) (i32.le_u (local.get $f) (i32.const 16)))
      (i32.and (i32.ge_u (local.get $f) (i32.const 24)) (i32.le_u (local.get $f) (i32.const 26)))))

  (func $is_hdr (export "basis_transcoder_format_is_hdr") (param $f i32) (result i32)
    (i32.and (i32.ge_u (local.get $f) (i32.const 22)) (i32.le_u (local.get $f) (i32.const 27))))

  (func (export "basis_transcoder_format_has_alpha") (param $f i32) (result i32)
    (i32.and
      (i32.lt_u (local.get $f) (i32.const 32))
      (i32.ne (i32.and (i32.shl (i32.const 1) (local.get $f)) (i32.const 0x0A89364A))
              (i32.const 0))))

  (func $bytes_per (export "basis_get_bytes_per_block_or_pixel") (param $f i32) (result i32)
    (if (i32.eq (local.get $f) (i32.const 13)) (then (return (i32.const 4))))
    (if (i32.eq (local.get $f) (i32.const 26)) (then (return (i32.const 4))))
    (if (i32.eq (local.get $f) (i32.const 24)) (then (return (i32.const 6))))
    (if (i32.eq (local.get $f) (i32.const 25)) (then (return (i32.const 8))))
    (if (call $is_uncompressed (local.get $f)) (then (return (i32.const 2))))
    ;; 8-byte blocks: ETC1, BC1, BC4, PVRTC1, ATC RGB, FXT1, PVRTC2, EAC R11
    (if (i32.and
          (i32.lt_u (local.get $f) (i32.const 32))
          (i32.ne (i32.and (i32.shl (i32.const 1) (local.get $f)) (i32.const 0x1E0B15))
                  (i32.const 0)))
      (then (return (i32.const 8))))
    (i32.const 16))

  (func $image_size (export "basis_compute_transcoded_image_size_in_bytes")
    (param $f i32) (param $w i32) (param $h i32) (result i32)
    (if (result i32) (call $is_uncompressed (local.get $f))
      (then
        (i32.mul (i32.mul (local.get $w) (local.get $h)) (call $bytes_per (local.get $f))))
      (else
        (i32.mul
          (i32.mul
            (i32.shr_u (i32.add (local.get $w) (i32.const 3)) (i32.const 2))
            (i32.shr_u (i32.add (local.get $h) (i32.const 3)) (i32.const 2)))
          (call $bytes_per (local.get $f))))))

  (func (export "basis_tex_format_get_block_width") (param $f i32) (result i32)
    (if (result i32) (i32.eq (local.get $f) (i32.const 3))
      (then (i32.const 6)) (else (i32.const 4))))

  (func (export "basis_tex_format_get_block_height") (param $f i32) (result i32)
    (if (result i32) (i32.eq (local.get $f) (i32.const 3))
      (then (i32.const 6)) (else (i32.const 4))))

  (func (export "basis_tex_format_is_hdr") (param $f i32) (result i32)
    (i32.ge_u (local.get $f) (i32.const 2)))

  ;; --------------------------------------------------------- ktx2 transcoder

  (func (export "ktx2_transcoder_new") (result i32)
    (local $h i32)
    (local.set $h (call $allocate (i32.const 128)))
    (if (local.get $h)
      (then (memory.fill (local.get $h) (i32.const 0) (i32.const 128))))
    (local.get $h))

  (func (export "ktx2_transcoder_delete") (param $h i32)
    (call $release (local.get $h)))

  (func (export "ktx2_transcoder_init")
    (param $h i32) (param $data i32) (param $len i32) (result i32)
    (i32.store offset=80 (local.get $h) (i32.const 0))
    (i32.store offset=84 (local.get $h) (i32.const 0))
    (if (i32.lt_u (local.get $len) (i32.const 80)) (then (return (i32.const 0))))
    (if (i32.ne (i32.load (local.get $data)) (i32.const 0x58544BAB))
      (then (return (i32.const 0))))
    (memory.copy (local.get $h) (local.get $data) (i32.const 80))
    (i32.store offset=80 (local.get $h) (i32.const 1))
    (i32.const 1))

  (func (export "ktx2_transcoder_get_header") (param $h i32) (result i32)
    (local.get $h))

  (func (export "ktx2_transcoder_get_basis_texture_format") (param $h i32) (result i32)
    (if (result i32) (i32.eq (i32.load offset=44 (local.get $h)) (i32.const 1))
      (then (i32.const 0)) (else (i32.const 1))))

  (func (export "ktx2_transcoder_start_transcoding") (param $h i32) (result i32)
    (if (i32.eqz (i32.load offset=80 (local.get $h))) (then (return (i32.const 0))))
    (i32.store offset=84 (local.get $h) (i32.const 1))
    (i32.const 1))

  ;; validates (level, layer, face); leaves the level size in $lw/$lh
  (func $level_dims
    (param $h i32) (param $level i32) (param $layer i32) (param $face i32) (result i32)
    (local $levels i32)
    (local $layers i32)
    (if (i32.eqz (i32.load offset=80 (local.get $h))) (then (return (i32.const 0))))
    (local.set $levels (i32.load offset=40 (local.get $h)))
    (if (i32.eqz (local.get $levels)) (then (local.set $levels (i32.const 1))))
    (local.set $layers (i32.load offset=32 (local.get $h)))
    (if (i32.eqz (local.get $layers)) (then (local.set $layers (i32.const 1))))
    (if (i32.ge_u (local.get $level) (local.get $levels)) (then (return (i32.const 0))))
    (if (i32.ge_u (local.get $layer) (local.get $layers)) (then (return (i32.const 0))))
    (if (i32.ge_u (local.get $face) (i32.load offset=36 (local.get $h)))
      (then (return (i32.const 0))))
    (global.set $lw (i32.shr_u (i32.load offset=20 (local.get $h)) (local.get $level)))
    (if (i32.eqz (global.get $lw)) (then (global.set $lw (i32.const 1))))
    (global.set $lh (i32.shr_u (i32.load offset=24 (local.get $h)) (local.get $level)))
    (if (i32.eqz (global.get $lh)) (then (global.set $lh (i32.const 1))))
    (i32.const 1))

  (func (export "ktx2_transcoder_get_image_level_info")
    (param $h i32) (param $info i32) (param $level i32) (param $layer i32) (param $face i32)
    (result i32)
    (local $bx i32)
    (local $by i32)
    (if (i32.eqz (call $level_dims (local.get $h) (local.get $level) (local.get $layer) (local.get $face)))
      (then (return (i32.const 0))))
    (local.set $bx (i32.shr_u (i32.add (global.get $lw) (i32.const 3)) (i32.const 2)))
    (local.set $by (i32.shr_u (i32.add (global.get $lh) (i32.const 3)) (i32.const 2)))
    (i32.store offset=0 (local.get $info) (local.get $level))
    (i32.store offset=4 (local.get $info) (local.get $layer))
    (i32.store offset=8 (local.get $info) (local.get $face))
    (i32.store offset=12 (local.get $info) (global.get $lw))
    (i32.store offset=16 (local.get $info) (global.get $lh))
    (i32.store offset=20 (local.get $info) (i32.shl (local.get $bx) (i32.const 2)))
    (i32.store offset=24 (local.get $info) (i32.shl (local.get $by) (i32.const 2)))
    (i32.store offset=28 (local.get $info) (local.get $bx))
    (i32.store offset=32 (local.get $info) (local.get $by))
    (i32.store offset=36 (local.get $info) (i32.const 4))
    (i32.store offset=40 (local.get $info) (i32.const 4))
    (i32.store offset=44 (local.get $info) (i32.mul (local.get $bx) (local.get $by)))
    (i32.store offset=48 (local.get $info)
      (i32.ne (i32.load offset=44 (local.get $h)) (i32.const 1)))
    (i32.store offset=52 (local.get $info) (i32.eqz (local.get $level)))
    (i32.const 1))

  (func (export "ktx2_transcoder_transcode_image_level")
    (param $h i32) (param $level i32) (param $layer i32) (param $face i32)
    (param $out i32) (param $count i32) (param $fmt i32) (param $flags i32)
    (param $pitch i32) (param $rows i32) (param $c0 i32) (param $c1 i32) (param $state i32)
    (result i32)
    (local $size i32)
    (global.set $last_count (local.get $count))
    (global.set $last_pitch (local.get $pitch))
    (global.set $last_rows (local.get $rows))
    (global.set $last_flags (local.get $flags))
    (global.set $last_channel0 (local.get $c0))
    (global.set $last_channel1 (local.get $c1))
    (global.set $last_state (local.get $state))
    (if (i32.eqz (i32.load offset=84 (local.get $h))) (then (return (i32.const 0))))
    (if (i32.eqz (call $level_dims (local.get $h) (local.get $level) (local.get $layer) (local.get $face)))
      (then (return (i32.const 0))))
    (if (i32.gt_u (local.get $fmt) (i32.const 27)) (then (return (i32.const 0))))
    ;; ETC1S sources cannot produce HDR targets
    (if (i32.and (call $is_hdr (local.get $fmt))
                 (i32.eq (i32.load offset=44 (local.get $h)) (i32.const 1)))
      (then (return (i32.const 0))))
    (local.set $size (call $image_size (local.get $fmt) (global.get $lw) (global.get $lh)))
    (if (call $is_uncompressed (local.get $fmt))
      (then
        (if (i32.lt_u (local.get $count) (i32.mul (global.get $lw) (global.get $lh)))
          (then (return (i32.const 0)))))
      (else
        (if (i32.lt_u (i32.mul (local.get $count) (call $bytes_per (local.get $fmt))) (local.get $size))
          (then (return (i32.const 0))))))
    (memory.fill (local.get $out) (i32.add (local.get $level) (i32.const 0xA0)) (local.get $size))
    (i32.const 1))

  ;; --------------------------------------------------------------- test hooks

  (func (export "test_live_allocations") (result i32) (global.get $live))
  (func (export "test_total_allocations") (result i32) (global.get $total))
  (func (export "test_frees") (result i32) (global.get $frees))
  (func (export "test_double_frees") (result i32) (global.get $double_frees))
  (func (export "test_init_calls") (result i32) (global.get $init_calls))
  (func (export "test_last_count") (result i32) (global.get $last_count))
  (func (export "test_last_pitch") (result i32) (global.get $last_pitch))
  (func (export "test_last_rows") (result i32) (global.get $last_rows))
  (func (export "test_last_flags") (result i32) (global.get $last_flags))
  (func (export "test_last_channel0") (result i32) (global.get $last_channel0))
  (func (export "test_last_channel1") (result i32) (global.get $last_channel1))
  (func (export "test_last_state") (result i32) (global.get $last_state))
)
"#;

/// Compile the fake transcoder, optionally rewriting its source first
pub fn fake_wasm_with(rewrite: impl FnOnce(&str) -> String) -> Vec<u8> {
    wat::parse_str(rewrite(FAKE_TRANSCODER_WAT)).unwrap()
}

pub fn fake_wasm() -> Vec<u8> {
    fake_wasm_with(str::to_string)
}

/// Instantiate the fake transcoder as a bare runtime
pub fn fake_runtime() -> NativeRuntime {
    let engine = TranscoderEngine::new().unwrap();
    let module = engine.load_module(&fake_wasm()).unwrap();
    NativeRuntime::instantiate(engine.engine(), &module, &ModuleConfig::default()).unwrap()
}

/// Load the fake transcoder as a shareable module
pub fn fake_module() -> Arc<TranscoderModule> {
    Arc::new(TranscoderModule::from_bytes(&fake_wasm(), &ModuleConfig::default()).unwrap())
}

/// Read one of the fake transcoder's `test_*` counters
pub fn fake_counter(runtime: &mut NativeRuntime, name: &str) -> u32 {
    let func = runtime
        .instance
        .get_typed_func::<(), i32>(&mut runtime.store, name)
        .unwrap();
    func.call(&mut runtime.store, ()).unwrap() as u32
}

/// Read a counter through a shared module
pub fn module_counter(module: &TranscoderModule, name: &str) -> u32 {
    fake_counter(&mut module.lock(), name)
}

/// Builder for synthetic KTX2 buffers
///
/// Only the header is meaningful; the payload is filler.
#[derive(Debug, Clone)]
pub struct Ktx2Builder {
    width: u32,
    height: u32,
    depth: u32,
    levels: u32,
    layers: u32,
    faces: u32,
    vk_format: u32,
    scheme: u32,
    payload: usize,
}

impl Ktx2Builder {
    /// A single-level, single-face ETC1S (BasisLZ) texture
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 0,
            levels: 1,
            layers: 0,
            faces: 1,
            vk_format: 0,
            scheme: 1,
            payload: 16,
        }
    }

    pub fn levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    pub fn layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn faces(mut self, faces: u32) -> Self {
        self.faces = faces;
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn vk_format(mut self, vk_format: u32) -> Self {
        self.vk_format = vk_format;
        self
    }

    /// UASTC textures carry no BasisLZ supercompression
    pub fn uastc(mut self) -> Self {
        self.scheme = 0;
        self
    }

    /// Filler bytes appended after the header
    pub fn payload(mut self, len: usize) -> Self {
        self.payload = len;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(KTX2_HEADER_SIZE + self.payload);
        bytes.extend_from_slice(&KTX2_IDENTIFIER);
        for word in [
            self.vk_format,
            1, // typeSize
            self.width,
            self.height,
            self.depth,
            self.layers,
            self.faces,
            self.levels,
            self.scheme,
            KTX2_HEADER_SIZE as u32, // dfdByteOffset
            0,
            0,
            0,
        ] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.resize(KTX2_HEADER_SIZE + self.payload, 0x5A);
        bytes
    }
}
