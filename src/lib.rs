//! AVIF decoding and encoding through a dual-backend codec bridge.
//!
//! The codec work is delegated to libavif, reached over one of two
//! interchangeable execution paths behind a single contract:
//! - **Native**: the platform `libavif` shared library, loaded at runtime
//!   and called directly through mirrored C structures
//! - **Wasm**: libavif compiled to WebAssembly, executed inside a
//!   Wasmtime virtual machine with its own linear memory
//!
//! The native path is probed first (library present, symbols resolved,
//! version >= 1.0); the wasm path is the fallback. Whichever wins is
//! selected once per process and reused by every call; if both fail, the
//! captured reasons are re-reported by every call as
//! [`Error::BackendUnavailable`].
//!
//! # Architecture
//!
//! ```text
//! caller ──► facade (decode/decode_config/decode_all/encode)
//!                │
//!                ▼
//!         backend selector (once per process, sticky)
//!            │                       │
//!            ▼                       ▼
//!     native libavif          Wasmtime guest VM
//!            │                       │
//!            └──────► marshalling ◄──┘
//!                        │
//!                        ▼
//!              image::DynamicImage frames
//! ```
//!
//! # Alpha semantics
//!
//! The codec is asked for premultiplied alpha while converting YUV to
//! RGB, but returned images are declared non-premultiplied RGBA; callers
//! must not assume premultiplication survives into the result.
//!
//! # Example
//!
//! ```no_run
//! # use image::GenericImageView;
//! let bytes = std::fs::read("image.avif")?;
//! let info = avif_bridge::decode_config(&bytes[..])?;
//! let image = avif_bridge::decode(&bytes[..])?;
//! assert_eq!(image.dimensions(), (info.width, info.height));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{Read, Write};

use image::DynamicImage;

use avif_bridge_common::{DecodeMode, EncodeParams};

pub mod backend;
pub mod format;
pub mod marshal;
pub mod reader;

pub use avif_bridge_common::{
    ChromaSubsampling, EncodeOptions, Error, DEFAULT_QUALITY, DEFAULT_SPEED,
};
pub use backend::{backend_kind, initialize, native_status, BackendKind};
pub use format::{is_avif, is_avif_sequence};
pub use marshal::{ColorModel, ImageInfo};
pub use reader::AvifReader;

/// The possibly multiple images stored in an AVIF file.
#[derive(Debug, Clone)]
pub struct Avif {
    /// Decoded frames in presentation order.
    pub frames: Vec<DynamicImage>,
    /// Delay times, one per frame, in seconds.
    pub delays: Vec<f64>,
}

/// Decode an AVIF stream and return its first frame.
pub fn decode(reader: impl Read) -> Result<DynamicImage, Error> {
    let data = read_source(reader)?;

    let backend = backend::ensure_ready()?;
    let payload = backend.codec.decode(&data, DecodeMode::FirstFrame)?;

    marshal::frames(&payload)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::decode("no frames decoded"))
}

/// Report the dimensions and color model of an AVIF stream without
/// decoding pixel data.
pub fn decode_config(reader: impl Read) -> Result<ImageInfo, Error> {
    let data = read_source(reader)?;

    let backend = backend::ensure_ready()?;
    let payload = backend.codec.decode(&data, DecodeMode::ConfigOnly)?;

    Ok(marshal::image_info(&payload))
}

/// Decode every frame of an AVIF stream with per-frame timing.
///
/// The result satisfies `frames.len() == delays.len()`; still images
/// yield exactly one frame. Decoding is all-or-nothing: a failure on any
/// frame fails the whole call.
pub fn decode_all(reader: impl Read) -> Result<Avif, Error> {
    let data = read_source(reader)?;

    let backend = backend::ensure_ready()?;
    let payload = backend.codec.decode(&data, DecodeMode::AllFrames)?;

    let frames = marshal::frames(&payload)?;

    Ok(Avif {
        frames,
        delays: payload.delays,
    })
}

/// Encode `image` as a single-frame AVIF stream into `writer`.
///
/// Out-of-range option values fall back to their defaults (see
/// [`EncodeOptions::normalized`]); a chroma ratio outside
/// {4:4:4, 4:2:2, 4:2:0} fails with [`Error::UnsupportedChroma`] before
/// anything is written.
pub fn encode(
    mut writer: impl Write,
    image: &DynamicImage,
    options: &EncodeOptions,
) -> Result<(), Error> {
    let options = options.normalized();

    // Input validation happens before any backend work or output
    let yuv_format = marshal::yuv_format(options.chroma)?;

    let (rgba, width, height) = marshal::to_packed_rgba(image);

    let backend = backend::ensure_ready()?;
    let params = EncodeParams {
        quality: options.quality,
        quality_alpha: options.quality_alpha,
        speed: options.speed,
        yuv_format,
    };

    let bytes = backend.codec.encode(&rgba, width, height, &params)?;

    writer.write_all(&bytes)?;
    Ok(())
}

fn read_source(mut reader: impl Read) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}
