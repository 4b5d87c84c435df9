//! Common types shared across the avif-bridge workspace:
//! - Error taxonomy using `thiserror` for type-safe error handling
//! - Encoding options with default substitution rules
//! - The backend capability contract both codec backends implement

pub mod codec;
pub mod error;
pub mod options;

pub use codec::{DecodeMode, DecodePayload, EncodeParams, PixelCodec, PixelWordOrder};
pub use error::Error;
pub use options::{ChromaSubsampling, EncodeOptions, DEFAULT_QUALITY, DEFAULT_SPEED};
