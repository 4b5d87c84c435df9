//! Decode/encode protocols over the bound library.
//!
//! Contexts (decoder, encoder, image, output buffer) are created per call
//! and destroyed by RAII guards on every exit path. The input byte slice
//! stays borrowed for the whole decode because the library holds a raw
//! reference into it; nothing here copies it.

use std::ptr;
use std::slice;

use tracing::debug;

use avif_bridge_common::{DecodeMode, DecodePayload, EncodeParams, Error, PixelCodec, PixelWordOrder};

use crate::library::LibAvif;
use crate::sys::{
    AvifDecoder, AvifEncoder, AvifImage, AvifRgbImage, AvifRwData,
    AVIF_ADD_IMAGE_FLAG_SINGLE, AVIF_CHROMA_UPSAMPLING_FASTEST,
};

/// The libavif-backed codec.
///
/// Holds the process-wide library handle; read-only after probing and
/// safe for concurrent calls, each of which creates its own contexts.
pub struct NativeCodec {
    lib: LibAvif,
}

impl NativeCodec {
    /// Load the platform library and verify it is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] with the discovery failure;
    /// the caller folds this into the sticky probe status.
    pub fn probe() -> Result<Self, Error> {
        Ok(Self {
            lib: LibAvif::open()?,
        })
    }

    /// The loaded library's (major, minor) version.
    pub fn version(&self) -> (u32, u32) {
        self.lib.version_pair()
    }
}

struct DecoderGuard<'a> {
    lib: &'a LibAvif,
    ptr: *mut AvifDecoder,
}

impl Drop for DecoderGuard<'_> {
    fn drop(&mut self) {
        self.lib.decoder_destroy(self.ptr);
    }
}

struct ImageGuard<'a> {
    lib: &'a LibAvif,
    ptr: *mut AvifImage,
}

impl Drop for ImageGuard<'_> {
    fn drop(&mut self) {
        self.lib.image_destroy(self.ptr);
    }
}

struct EncoderGuard<'a> {
    lib: &'a LibAvif,
    ptr: *mut AvifEncoder,
}

impl Drop for EncoderGuard<'_> {
    fn drop(&mut self) {
        self.lib.encoder_destroy(self.ptr);
    }
}

struct OutputGuard<'a> {
    lib: &'a LibAvif,
    data: AvifRwData,
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        self.lib.rw_data_free(&mut self.data);
    }
}

/// Worker-thread cap handed to the library: the host's logical CPU count.
fn max_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .try_into()
        .unwrap_or(i32::MAX)
}

impl PixelCodec for NativeCodec {
    fn decode(&self, data: &[u8], mode: DecodeMode) -> Result<DecodePayload, Error> {
        let lib = &self.lib;

        let decoder = lib.decoder_create();
        if decoder.is_null() {
            return Err(Error::decode("decoder context allocation failed"));
        }
        let _guard = DecoderGuard { lib, ptr: decoder };

        // SAFETY: `decoder` is live until the guard drops; the library
        // reads these knobs before any decode work starts.
        unsafe {
            (*decoder).ignore_exif = 1;
            (*decoder).ignore_xmp = 1;
            (*decoder).max_threads = max_threads();
            (*decoder).strict_flags = 0;
        }

        // The library keeps a raw reference into `data` until the guard
        // destroys the decoder; the borrow spans this whole function.
        if !lib.decoder_set_io_memory(decoder, data) {
            return Err(Error::decode(unsafe { (*decoder).diag.message() }));
        }

        if !lib.decoder_parse(decoder) {
            return Err(Error::decode(unsafe { (*decoder).diag.message() }));
        }

        // SAFETY: a successful parse leaves a valid image descriptor.
        let (width, height, depth, image_count) = unsafe {
            let image = &*(*decoder).image;
            (image.width, image.height, image.depth, (*decoder).image_count)
        };

        debug!(width, height, depth, image_count, "native parse complete");

        let mut payload = DecodePayload {
            width,
            height,
            depth,
            frames: Vec::new(),
            delays: Vec::new(),
            word_order: PixelWordOrder::NativeEndian,
        };

        if mode.config_only() {
            return Ok(payload);
        }

        let mut rgb = AvifRgbImage::zeroed();
        // SAFETY: the image descriptor stays valid between frames.
        lib.rgb_image_set_defaults(&mut rgb, unsafe { (*decoder).image });

        rgb.max_threads = max_threads();
        rgb.alpha_premultiplied = 1;

        if depth > 8 {
            rgb.depth = 16;
        }

        if image_count > 1 && mode.all_frames() {
            rgb.chroma_upsampling = AVIF_CHROMA_UPSAMPLING_FASTEST;
        }

        while lib.decoder_next_image(decoder) {
            if !lib.rgb_image_allocate_pixels(&mut rgb) {
                return Err(Error::decode("pixel buffer allocation failed"));
            }

            // SAFETY: the current frame's descriptor is live after
            // decoder_next_image succeeded.
            let converted = lib.image_yuv_to_rgb(unsafe { (*decoder).image }, &mut rgb);
            if !converted {
                lib.rgb_image_free_pixels(&mut rgb);
                return Err(Error::decode("YUV to RGB conversion failed"));
            }

            let size = rgb.row_bytes as usize * height as usize;
            // SAFETY: allocate_pixels sized the buffer at row_bytes * height.
            let frame = unsafe { slice::from_raw_parts(rgb.pixels, size) }.to_vec();
            lib.rgb_image_free_pixels(&mut rgb);

            payload.frames.push(frame);
            // SAFETY: timing for the current frame was just populated.
            payload.delays.push(unsafe { (*decoder).image_timing.duration });

            if !mode.all_frames() {
                break;
            }
        }

        // All-or-nothing: a frame that failed to come out mid-sequence
        // discards the ones before it
        let expected = if mode.all_frames() {
            image_count.max(1) as usize
        } else {
            1
        };
        if payload.frames.len() != expected {
            return Err(Error::decode(unsafe { (*decoder).diag.message() }));
        }

        Ok(payload)
    }

    fn encode(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, Error> {
        let lib = &self.lib;

        let image = lib.image_create(width, height, 8, params.yuv_format);
        if image.is_null() {
            return Err(Error::encode("image allocation failed"));
        }
        let _image_guard = ImageGuard { lib, ptr: image };

        let mut rgb = AvifRgbImage::zeroed();
        lib.rgb_image_set_defaults(&mut rgb, image);

        rgb.max_threads = max_threads();
        rgb.alpha_premultiplied = 1;

        if !lib.rgb_image_allocate_pixels(&mut rgb) {
            return Err(Error::encode("pixel buffer allocation failed"));
        }

        let size = rgb.row_bytes as usize * rgb.height as usize;
        let len = size.min(rgba.len());
        // SAFETY: allocate_pixels sized the destination at row_bytes *
        // height; `len` never exceeds it.
        unsafe {
            ptr::copy_nonoverlapping(rgba.as_ptr(), rgb.pixels, len);
        }

        let converted = lib.image_rgb_to_yuv(image, &rgb);
        lib.rgb_image_free_pixels(&mut rgb);
        if !converted {
            return Err(Error::encode("RGB to YUV conversion failed"));
        }

        let encoder = lib.encoder_create();
        if encoder.is_null() {
            return Err(Error::encode("encoder context allocation failed"));
        }
        let _encoder_guard = EncoderGuard { lib, ptr: encoder };

        // SAFETY: `encoder` is live until the guard drops.
        unsafe {
            (*encoder).max_threads = max_threads();
            (*encoder).quality = params.quality;
            (*encoder).quality_alpha = params.quality_alpha;
            (*encoder).speed = params.speed;
        }

        if !lib.encoder_add_image(encoder, image, 1, AVIF_ADD_IMAGE_FLAG_SINGLE) {
            return Err(Error::encode(unsafe { (*encoder).diag.message() }));
        }

        let mut output = OutputGuard {
            lib,
            data: AvifRwData::empty(),
        };
        if !lib.encoder_finish(encoder, &mut output.data) {
            return Err(Error::encode(unsafe { (*encoder).diag.message() }));
        }

        if output.data.data.is_null() || output.data.size == 0 {
            return Err(Error::encode("codec returned an empty stream"));
        }

        // SAFETY: a successful finish leaves a valid byte range; copied
        // out before the guard releases it.
        let bytes = unsafe { slice::from_raw_parts(output.data.data, output.data.size) }.to_vec();

        debug!(width, height, encoded_len = bytes.len(), "native encode complete");

        Ok(bytes)
    }
}

impl std::fmt::Debug for NativeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCodec").finish_non_exhaustive()
    }
}
