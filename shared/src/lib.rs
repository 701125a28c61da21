//! Shared types for the basis-bridge transcoder host.
//!
//! Format enumerations and binary layout constants. Nothing here depends
//! on the WASM runtime, so front ends can use these types without pulling
//! in wasmtime.

pub mod constants;
pub mod formats;

pub use constants::*;
pub use formats::{
    BasisTexFormat, DecodeFlags, SupercompressionScheme, TranscoderTextureFormat,
    UnknownFormatName,
};
