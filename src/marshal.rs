//! Conversion between backend pixel buffers and host images.
//!
//! Backends hand back packed RGBA byte buffers plus the codec's reported
//! bit depth; this module turns them into `image` crate buffers. Depth
//! above 8 selects the 16-bit path, where every channel is reassembled
//! from explicit 16-bit words in the backend's byte order — the guest's
//! linear memory is always little-endian, the native library fills
//! buffers in host order — rather than copied byte-for-byte.

use image::{DynamicImage, ImageBuffer, Rgba};

use avif_bridge_common::codec::{
    PIXEL_FORMAT_YUV420, PIXEL_FORMAT_YUV422, PIXEL_FORMAT_YUV444,
};
use avif_bridge_common::{ChromaSubsampling, DecodePayload, Error, PixelWordOrder};

/// The host-facing color model of a decoded image.
///
/// Both models are non-premultiplied: the codec is asked for
/// premultiplied alpha during YUV conversion, but no premultiplication
/// guarantee survives into the returned buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    /// Four 8-bit channels per pixel.
    Rgba8,
    /// Four 16-bit channels per pixel.
    Rgba16,
}

/// Dimensions and color model of an encoded image, without pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Host color model derived from the codec's bit depth.
    pub model: ColorModel,
}

/// Derive the host-facing descriptor from a decode payload.
pub(crate) fn image_info(payload: &DecodePayload) -> ImageInfo {
    ImageInfo {
        width: payload.width,
        height: payload.height,
        model: if payload.depth > 8 {
            ColorModel::Rgba16
        } else {
            ColorModel::Rgba8
        },
    }
}

/// Convert every frame buffer in the payload into an owned host image.
pub(crate) fn frames(payload: &DecodePayload) -> Result<Vec<DynamicImage>, Error> {
    payload
        .frames
        .iter()
        .map(|bytes| frame(payload, bytes))
        .collect()
}

fn frame(payload: &DecodePayload, bytes: &[u8]) -> Result<DynamicImage, Error> {
    if bytes.len() != payload.frame_size() {
        return Err(Error::decode("frame buffer size mismatch"));
    }

    let (width, height) = (payload.width, payload.height);

    if payload.depth > 8 {
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| {
                let raw = [pair[0], pair[1]];
                match payload.word_order {
                    PixelWordOrder::LittleEndian => u16::from_le_bytes(raw),
                    PixelWordOrder::NativeEndian => u16::from_ne_bytes(raw),
                }
            })
            .collect();

        ImageBuffer::<Rgba<u16>, Vec<u16>>::from_raw(width, height, words)
            .map(DynamicImage::ImageRgba16)
            .ok_or_else(|| Error::decode("frame buffer size mismatch"))
    } else {
        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, bytes.to_vec())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| Error::decode("frame buffer size mismatch"))
    }
}

/// Convert any host image into the packed RGBA8 layout the encoders
/// consume. Higher-depth inputs are narrowed; the codec re-expands
/// during RGB→YUV conversion.
pub(crate) fn to_packed_rgba(image: &DynamicImage) -> (Vec<u8>, u32, u32) {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    (rgba.into_raw(), width, height)
}

/// Map a chroma ratio onto the codec's pixel format.
///
/// Closed enumeration: anything outside {4:4:4, 4:2:2, 4:2:0} is a hard
/// validation failure, never a silent fallback.
pub(crate) fn yuv_format(chroma: ChromaSubsampling) -> Result<u32, Error> {
    match chroma {
        ChromaSubsampling::Yuv444 => Ok(PIXEL_FORMAT_YUV444),
        ChromaSubsampling::Yuv422 => Ok(PIXEL_FORMAT_YUV422),
        ChromaSubsampling::Yuv420 => Ok(PIXEL_FORMAT_YUV420),
        requested => Err(Error::UnsupportedChroma { requested }),
    }
}
