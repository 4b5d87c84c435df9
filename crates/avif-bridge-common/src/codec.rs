//! The capability contract implemented by both codec backends.
//!
//! The facade depends only on [`PixelCodec`]; whether a call runs inside a
//! Wasmtime guest or through the native library is decided once at
//! initialization and never visible past this trait.

use crate::error::Error;

/// avifPixelFormat value for 4:4:4 planes.
pub const PIXEL_FORMAT_YUV444: u32 = 1;
/// avifPixelFormat value for 4:2:2 planes.
pub const PIXEL_FORMAT_YUV422: u32 = 2;
/// avifPixelFormat value for 4:2:0 planes.
pub const PIXEL_FORMAT_YUV420: u32 = 3;

/// How much of the input a decode call should process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Populate metadata only; no pixel allocation or conversion.
    ConfigOnly,
    /// Decode the first frame and stop.
    FirstFrame,
    /// Decode every frame with per-frame timing.
    AllFrames,
}

impl DecodeMode {
    /// Returns `true` when no pixel work is requested.
    pub fn config_only(self) -> bool {
        matches!(self, Self::ConfigOnly)
    }

    /// Returns `true` when every frame should be decoded.
    pub fn all_frames(self) -> bool {
        matches!(self, Self::AllFrames)
    }
}

/// Byte order of the 16-bit channel words in a raw frame buffer.
///
/// Guest linear memory is always little-endian; the native library fills
/// buffers in host order. The marshalling layer reassembles words
/// explicitly instead of copying bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelWordOrder {
    /// 16-bit words stored little-endian (guest backend).
    LittleEndian,
    /// 16-bit words stored in host byte order (native backend).
    NativeEndian,
}

/// Raw output of a backend decode call, before marshalling into host images.
#[derive(Debug, Clone)]
pub struct DecodePayload {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bit depth reported by the codec; depth > 8 selects the 16-bit path.
    pub depth: u32,
    /// Packed RGBA buffers, one per decoded frame, in presentation order.
    ///
    /// Four channels per pixel; one byte per channel at depth <= 8, two
    /// bytes per channel (ordered per [`Self::word_order`]) above that.
    /// Empty for a config-only decode.
    pub frames: Vec<Vec<u8>>,
    /// Presentation duration in seconds, one entry per decoded frame.
    pub delays: Vec<f64>,
    /// Byte order of 16-bit channel words inside `frames`.
    pub word_order: PixelWordOrder,
}

impl DecodePayload {
    /// Bytes per pixel for this payload's depth.
    pub fn bytes_per_pixel(&self) -> usize {
        if self.depth > 8 { 8 } else { 4 }
    }

    /// Byte size of a single frame buffer.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel()
    }
}

/// Normalized parameters handed to a backend encode call.
///
/// The chroma ratio has already been mapped to a codec pixel format and
/// the quality/speed fields have passed default substitution; backends
/// consume these verbatim.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams {
    /// Color quality, [1,100], 100 meaning lossless.
    pub quality: i32,
    /// Alpha channel quality, [1,100].
    pub quality_alpha: i32,
    /// Encoder speed, [1,10].
    pub speed: i32,
    /// avifPixelFormat value for the requested chroma subsampling.
    pub yuv_format: u32,
}

/// A codec execution backend.
///
/// Implementations must be safe for concurrent use once constructed: the
/// guest backend instantiates a fresh VM per call, the native backend
/// creates a fresh decoder/encoder context per call, and neither mutates
/// shared state after initialization.
pub trait PixelCodec: Send + Sync {
    /// Decode a complete AVIF byte stream.
    ///
    /// All-or-nothing: a failure on any frame discards every frame decoded
    /// before it. The returned payload satisfies
    /// `frames.len() == delays.len()`.
    fn decode(&self, data: &[u8], mode: DecodeMode) -> Result<DecodePayload, Error>;

    /// Encode one packed RGBA8 buffer (`width * height * 4` bytes) into an
    /// AVIF byte stream.
    fn encode(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, Error>;
}
