//! Centralized constants for the basis-bridge host.
//!
//! Layout sizes here must match the native transcoder's structure
//! definitions byte for byte.

/// The 12-byte KTX2 file identifier: `«KTX 20»\r\n\x1A\n`.
pub const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Size of the packed KTX2 header (identifier, 13 words, 2 double words).
pub const KTX2_HEADER_SIZE: usize = 80;

/// Size of the packed image-level-info record (14 words).
pub const IMAGE_LEVEL_INFO_SIZE: usize = 56;

/// WASM pages are 64KB.
pub const WASM_PAGE_SIZE: usize = 65536;

/// Default cap on the transcoder module's linear memory (256MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Name of the linear memory export every transcoder module must provide.
pub const MEMORY_EXPORT: &str = "memory";

/// File extension of KTX2 containers.
pub const KTX2_EXTENSION: &str = "ktx2";

/// Returns true if `bytes` starts with the KTX2 identifier.
pub fn has_ktx2_identifier(bytes: &[u8]) -> bool {
    bytes.len() >= KTX2_IDENTIFIER.len() && bytes[..KTX2_IDENTIFIER.len()] == KTX2_IDENTIFIER
}
