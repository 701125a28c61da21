//! Typed views of native structures
//!
//! Both records are decoded from linear memory as packed little-endian
//! layouts. Accessors convert from little-endian, so decoding does not
//! depend on the host byte order.

use bytemuck::{Pod, Zeroable};

use basis_bridge_shared::{
    IMAGE_LEVEL_INFO_SIZE, KTX2_HEADER_SIZE, KTX2_IDENTIFIER, SupercompressionScheme,
};

/// KTX2 file header as held by the native transcoder
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Ktx2Header {
    identifier: [u8; 12],
    vk_format: u32,
    type_size: u32,
    pixel_width: u32,
    pixel_height: u32,
    pixel_depth: u32,
    layer_count: u32,
    face_count: u32,
    level_count: u32,
    supercompression_scheme: u32,
    dfd_byte_offset: u32,
    dfd_byte_length: u32,
    kvd_byte_offset: u32,
    kvd_byte_length: u32,
    sgd_byte_offset: u64,
    sgd_byte_length: u64,
}

const _: () = assert!(std::mem::size_of::<Ktx2Header>() == KTX2_HEADER_SIZE);

impl Ktx2Header {
    /// Decode from the first [`KTX2_HEADER_SIZE`] bytes of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes
            .get(..KTX2_HEADER_SIZE)
            .map(bytemuck::pod_read_unaligned)
    }

    pub fn identifier_is_valid(&self) -> bool {
        self.identifier == KTX2_IDENTIFIER
    }

    /// `vkFormat`; 0 (`VK_FORMAT_UNDEFINED`) for Basis Universal payloads
    pub fn vk_format(&self) -> u32 {
        u32::from_le(self.vk_format)
    }

    pub fn pixel_width(&self) -> u32 {
        u32::from_le(self.pixel_width)
    }

    pub fn pixel_height(&self) -> u32 {
        u32::from_le(self.pixel_height)
    }

    pub fn pixel_depth(&self) -> u32 {
        u32::from_le(self.pixel_depth)
    }

    pub fn layer_count(&self) -> u32 {
        u32::from_le(self.layer_count)
    }

    pub fn face_count(&self) -> u32 {
        u32::from_le(self.face_count)
    }

    pub fn level_count(&self) -> u32 {
        u32::from_le(self.level_count)
    }

    pub fn supercompression_scheme(&self) -> SupercompressionScheme {
        SupercompressionScheme::from_raw(u32::from_le(self.supercompression_scheme))
    }

    /// Data format descriptor (offset, length)
    pub fn dfd_range(&self) -> (u32, u32) {
        (
            u32::from_le(self.dfd_byte_offset),
            u32::from_le(self.dfd_byte_length),
        )
    }

    /// Key/value data (offset, length)
    pub fn kvd_range(&self) -> (u32, u32) {
        (
            u32::from_le(self.kvd_byte_offset),
            u32::from_le(self.kvd_byte_length),
        )
    }

    /// Supercompression global data (offset, length)
    pub fn sgd_range(&self) -> (u64, u64) {
        (
            u64::from_le(self.sgd_byte_offset),
            u64::from_le(self.sgd_byte_length),
        )
    }

    /// Number of mip levels to iterate; a count of 0 means one level
    pub fn levels(&self) -> u32 {
        self.level_count().max(1)
    }

    /// Number of array layers to iterate; a count of 0 means not an array
    pub fn layers(&self) -> u32 {
        self.layer_count().max(1)
    }
}

/// Per-level description filled in by the native transcoder
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageLevelInfo {
    level_index: u32,
    layer_index: u32,
    face_index: u32,
    orig_width: u32,
    orig_height: u32,
    width: u32,
    height: u32,
    num_blocks_x: u32,
    num_blocks_y: u32,
    block_width: u32,
    block_height: u32,
    total_blocks: u32,
    alpha_flag: u32,
    iframe_flag: u32,
}

const _: () = assert!(std::mem::size_of::<ImageLevelInfo>() == IMAGE_LEVEL_INFO_SIZE);

impl ImageLevelInfo {
    /// Decode from the first [`IMAGE_LEVEL_INFO_SIZE`] bytes of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes
            .get(..IMAGE_LEVEL_INFO_SIZE)
            .map(bytemuck::pod_read_unaligned)
    }

    pub fn level_index(&self) -> u32 {
        u32::from_le(self.level_index)
    }

    pub fn layer_index(&self) -> u32 {
        u32::from_le(self.layer_index)
    }

    pub fn face_index(&self) -> u32 {
        u32::from_le(self.face_index)
    }

    /// Width before block padding
    pub fn orig_width(&self) -> u32 {
        u32::from_le(self.orig_width)
    }

    /// Height before block padding
    pub fn orig_height(&self) -> u32 {
        u32::from_le(self.orig_height)
    }

    /// Width padded to whole blocks
    pub fn width(&self) -> u32 {
        u32::from_le(self.width)
    }

    /// Height padded to whole blocks
    pub fn height(&self) -> u32 {
        u32::from_le(self.height)
    }

    pub fn num_blocks_x(&self) -> u32 {
        u32::from_le(self.num_blocks_x)
    }

    pub fn num_blocks_y(&self) -> u32 {
        u32::from_le(self.num_blocks_y)
    }

    pub fn block_width(&self) -> u32 {
        u32::from_le(self.block_width)
    }

    pub fn block_height(&self) -> u32 {
        u32::from_le(self.block_height)
    }

    pub fn total_blocks(&self) -> u32 {
        u32::from_le(self.total_blocks)
    }

    // Flags are read from the low byte only: a one-byte native bool at the
    // start of the word decodes the same as a full 0/1 word.
    pub fn has_alpha(&self) -> bool {
        u32::from_le(self.alpha_flag) & 0xFF != 0
    }

    pub fn is_iframe(&self) -> bool {
        u32::from_le(self.iframe_flag) & 0xFF != 0
    }
}
