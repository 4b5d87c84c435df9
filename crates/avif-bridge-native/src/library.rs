//! Runtime loading and symbol binding for the platform libavif.
//!
//! The library is resolved by its canonical platform name, every required
//! export is bound to a local function pointer, and the self-reported
//! version is gated at major >= 1. Any failure here becomes part of the
//! sticky probe status; nothing is retried.

use std::ffi::CStr;
use std::os::raw::c_char;

use libloading::Library;
use tracing::{debug, info};

use avif_bridge_common::Error;

use crate::sys::{
    AvifDecoder, AvifEncoder, AvifImage, AvifResult, AvifRgbImage, AvifRwData, AVIF_RESULT_OK,
};

/// Canonical shared-library name for the current platform.
pub fn library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "libavif.dll"
    } else if cfg!(target_os = "macos") {
        "libavif.dylib"
    } else {
        "libavif.so"
    }
}

/// The loaded library with every required symbol bound.
///
/// Created once per process during probing and read-only afterwards; the
/// function pointers stay valid for as long as `_lib` is alive, which is
/// the lifetime of this struct.
pub struct LibAvif {
    _lib: Library,

    version: unsafe extern "C" fn() -> *const c_char,

    decoder_create: unsafe extern "C" fn() -> *mut AvifDecoder,
    decoder_destroy: unsafe extern "C" fn(*mut AvifDecoder),
    decoder_set_io_memory:
        unsafe extern "C" fn(*mut AvifDecoder, *const u8, usize) -> AvifResult,
    decoder_parse: unsafe extern "C" fn(*mut AvifDecoder) -> AvifResult,
    decoder_next_image: unsafe extern "C" fn(*mut AvifDecoder) -> AvifResult,

    rgb_image_set_defaults: unsafe extern "C" fn(*mut AvifRgbImage, *const AvifImage),
    rgb_image_allocate_pixels: unsafe extern "C" fn(*mut AvifRgbImage) -> AvifResult,
    rgb_image_free_pixels: unsafe extern "C" fn(*mut AvifRgbImage),
    image_yuv_to_rgb: unsafe extern "C" fn(*const AvifImage, *mut AvifRgbImage) -> AvifResult,
    image_rgb_to_yuv: unsafe extern "C" fn(*mut AvifImage, *const AvifRgbImage) -> AvifResult,

    image_create: unsafe extern "C" fn(u32, u32, u32, u32) -> *mut AvifImage,
    image_destroy: unsafe extern "C" fn(*mut AvifImage),

    encoder_create: unsafe extern "C" fn() -> *mut AvifEncoder,
    encoder_destroy: unsafe extern "C" fn(*mut AvifEncoder),
    encoder_add_image:
        unsafe extern "C" fn(*mut AvifEncoder, *const AvifImage, u64, u32) -> AvifResult,
    encoder_finish: unsafe extern "C" fn(*mut AvifEncoder, *mut AvifRwData) -> AvifResult,

    rw_data_free: unsafe extern "C" fn(*mut AvifRwData),
}

/// Copy a typed function pointer out of the library.
///
/// # Safety
///
/// The caller asserts that the symbol, if present, has exactly the type
/// `T`; the pointer is only valid while the library stays loaded.
unsafe fn bind<T: Copy>(lib: &Library, name: &'static [u8]) -> Result<T, Error> {
    // SAFETY: upheld by the caller per above.
    unsafe {
        lib.get::<T>(name).map(|sym| *sym).map_err(|e| {
            Error::backend_unavailable(format!(
                "symbol {} missing: {e}",
                String::from_utf8_lossy(&name[..name.len() - 1])
            ))
        })
    }
}

impl LibAvif {
    /// Load the platform library and bind every required symbol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] when the library cannot be
    /// found, a symbol is missing, or the version is older than 1.0.
    pub fn open() -> Result<Self, Error> {
        let name = library_name();

        debug!(library = name, "probing native codec library");

        // SAFETY: loading a shared library runs its initializers; libavif
        // has no constructors with side effects beyond its own state.
        let lib = unsafe { Library::new(name) }
            .map_err(|e| Error::backend_unavailable(format!("cannot load library {name}: {e}")))?;

        // SAFETY: each signature matches the libavif 1.x prototypes that
        // the sys module mirrors.
        let bridge = unsafe {
            Self {
                version: bind(&lib, b"avifVersion\0")?,
                decoder_create: bind(&lib, b"avifDecoderCreate\0")?,
                decoder_destroy: bind(&lib, b"avifDecoderDestroy\0")?,
                decoder_set_io_memory: bind(&lib, b"avifDecoderSetIOMemory\0")?,
                decoder_parse: bind(&lib, b"avifDecoderParse\0")?,
                decoder_next_image: bind(&lib, b"avifDecoderNextImage\0")?,
                rgb_image_set_defaults: bind(&lib, b"avifRGBImageSetDefaults\0")?,
                rgb_image_allocate_pixels: bind(&lib, b"avifRGBImageAllocatePixels\0")?,
                rgb_image_free_pixels: bind(&lib, b"avifRGBImageFreePixels\0")?,
                image_yuv_to_rgb: bind(&lib, b"avifImageYUVToRGB\0")?,
                image_rgb_to_yuv: bind(&lib, b"avifImageRGBToYUV\0")?,
                image_create: bind(&lib, b"avifImageCreate\0")?,
                image_destroy: bind(&lib, b"avifImageDestroy\0")?,
                encoder_create: bind(&lib, b"avifEncoderCreate\0")?,
                encoder_destroy: bind(&lib, b"avifEncoderDestroy\0")?,
                encoder_add_image: bind(&lib, b"avifEncoderAddImage\0")?,
                encoder_finish: bind(&lib, b"avifEncoderFinish\0")?,
                rw_data_free: bind(&lib, b"avifRWDataFree\0")?,
                _lib: lib,
            }
        };

        let (major, minor) = bridge.version_pair();
        if major < 1 {
            return Err(Error::backend_unavailable(format!(
                "minimum required libavif version is 1.0.0, found {major}.{minor}"
            )));
        }

        info!(library = name, major, minor, "native codec library loaded");

        Ok(bridge)
    }

    /// The library's self-reported (major, minor) version.
    pub fn version_pair(&self) -> (u32, u32) {
        // SAFETY: avifVersion returns a static NUL-terminated string.
        let raw = unsafe { CStr::from_ptr((self.version)()) };
        let text = raw.to_string_lossy();

        let mut parts = text.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);
        (major, minor)
    }

    pub(crate) fn decoder_create(&self) -> *mut AvifDecoder {
        // SAFETY: no preconditions.
        unsafe { (self.decoder_create)() }
    }

    pub(crate) fn decoder_destroy(&self, decoder: *mut AvifDecoder) {
        // SAFETY: `decoder` came from decoder_create and is destroyed once.
        unsafe { (self.decoder_destroy)(decoder) }
    }

    /// Feed `data` to the decoder as a memory-backed source.
    ///
    /// The library keeps a raw reference into `data` for the lifetime of
    /// the decoder; the caller's borrow must outlive every later decoder
    /// call, which the codec layer guarantees by keeping the input slice
    /// borrowed across the whole decode.
    pub(crate) fn decoder_set_io_memory(&self, decoder: *mut AvifDecoder, data: &[u8]) -> bool {
        // SAFETY: pointer/length describe a live slice per above.
        unsafe { (self.decoder_set_io_memory)(decoder, data.as_ptr(), data.len()) == AVIF_RESULT_OK }
    }

    pub(crate) fn decoder_parse(&self, decoder: *mut AvifDecoder) -> bool {
        // SAFETY: `decoder` is live and has a source configured.
        unsafe { (self.decoder_parse)(decoder) == AVIF_RESULT_OK }
    }

    pub(crate) fn decoder_next_image(&self, decoder: *mut AvifDecoder) -> bool {
        // SAFETY: `decoder` is live and parsed.
        unsafe { (self.decoder_next_image)(decoder) == AVIF_RESULT_OK }
    }

    pub(crate) fn rgb_image_set_defaults(&self, rgb: &mut AvifRgbImage, image: *const AvifImage) {
        // SAFETY: `image` points at the decoder's live image descriptor.
        unsafe { (self.rgb_image_set_defaults)(rgb, image) }
    }

    pub(crate) fn rgb_image_allocate_pixels(&self, rgb: &mut AvifRgbImage) -> bool {
        // SAFETY: `rgb` holds defaults from rgb_image_set_defaults.
        unsafe { (self.rgb_image_allocate_pixels)(rgb) == AVIF_RESULT_OK }
    }

    pub(crate) fn rgb_image_free_pixels(&self, rgb: &mut AvifRgbImage) {
        // SAFETY: pixels were allocated by rgb_image_allocate_pixels.
        unsafe { (self.rgb_image_free_pixels)(rgb) }
    }

    pub(crate) fn image_yuv_to_rgb(&self, image: *const AvifImage, rgb: &mut AvifRgbImage) -> bool {
        // SAFETY: both operands are live; `rgb` has allocated pixels.
        unsafe { (self.image_yuv_to_rgb)(image, rgb) == AVIF_RESULT_OK }
    }

    pub(crate) fn image_rgb_to_yuv(&self, image: *mut AvifImage, rgb: &AvifRgbImage) -> bool {
        // SAFETY: both operands are live; `rgb` has allocated pixels.
        unsafe { (self.image_rgb_to_yuv)(image, rgb) == AVIF_RESULT_OK }
    }

    pub(crate) fn image_create(&self, width: u32, height: u32, depth: u32, format: u32) -> *mut AvifImage {
        // SAFETY: no preconditions.
        unsafe { (self.image_create)(width, height, depth, format) }
    }

    pub(crate) fn image_destroy(&self, image: *mut AvifImage) {
        // SAFETY: `image` came from image_create and is destroyed once.
        unsafe { (self.image_destroy)(image) }
    }

    pub(crate) fn encoder_create(&self) -> *mut AvifEncoder {
        // SAFETY: no preconditions.
        unsafe { (self.encoder_create)() }
    }

    pub(crate) fn encoder_destroy(&self, encoder: *mut AvifEncoder) {
        // SAFETY: `encoder` came from encoder_create and is destroyed once.
        unsafe { (self.encoder_destroy)(encoder) }
    }

    pub(crate) fn encoder_add_image(
        &self,
        encoder: *mut AvifEncoder,
        image: *const AvifImage,
        duration_in_timescales: u64,
        flags: u32,
    ) -> bool {
        // SAFETY: both contexts are live.
        unsafe { (self.encoder_add_image)(encoder, image, duration_in_timescales, flags) == AVIF_RESULT_OK }
    }

    pub(crate) fn encoder_finish(&self, encoder: *mut AvifEncoder, output: *mut AvifRwData) -> bool {
        // SAFETY: `encoder` is live; `output` points at a valid RWData.
        unsafe { (self.encoder_finish)(encoder, output) == AVIF_RESULT_OK }
    }

    pub(crate) fn rw_data_free(&self, data: *mut AvifRwData) {
        // SAFETY: `data` was filled by the library (or is empty).
        unsafe { (self.rw_data_free)(data) }
    }
}

impl std::fmt::Debug for LibAvif {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibAvif").finish_non_exhaustive()
    }
}
