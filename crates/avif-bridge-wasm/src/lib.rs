//! Guest execution backend for avif-bridge.
//!
//! This crate runs the codec inside an isolated Wasmtime virtual machine
//! with its own linear memory:
//! - [`GuestEngine`]: Configured Wasmtime engine, shared across all calls
//! - [`GuestModule`]: Compiled codec module (decoder or encoder artifact)
//! - [`GuestInstance`]: Per-call VM instance with tracked allocations
//! - [`WasmCodec`]: The [`avif_bridge_common::PixelCodec`] implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GuestEngine                         │
//! │  (Shared across all calls, thread-safe)                 │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              GuestModule (decoder, encoder)             │
//! │  (Compiled once at probe time, shared)                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    GuestInstance                        │
//! │  (Per-call, isolated linear memory, freed on all exits) │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;
pub mod instance;
pub mod module;

pub use codec::WasmCodec;
pub use engine::GuestEngine;
pub use instance::{GuestInstance, GuestOp};
pub use module::{GuestModule, ModuleRole};
