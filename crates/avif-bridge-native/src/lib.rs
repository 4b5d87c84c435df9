//! Native shared-library backend for avif-bridge.
//!
//! This crate calls libavif's exported C functions directly:
//! - [`sys`]: `#[repr(C)]` mirrors of the library's in-memory layout
//! - [`LibAvif`]: runtime symbol resolution and version gating
//! - [`NativeCodec`]: the [`avif_bridge_common::PixelCodec`] implementation
//!
//! Everything here is ABI work: the mirrored structures must match
//! libavif 1.x field for field, since a mismatch corrupts memory instead
//! of failing to compile. All raw-pointer handling is confined to this
//! crate; the rest of the workspace never sees foreign memory.

// FFI crate: calling into the shared library and walking its structures
// is unsafe by nature.
#![allow(unsafe_code)]

pub mod codec;
pub mod library;
pub mod sys;

pub use codec::NativeCodec;
pub use library::LibAvif;
