//! `#[repr(C)]` mirrors of the libavif 1.x ABI.
//!
//! Field order, widths and implicit padding must match `avif.h` exactly;
//! these declarations are the contract the native backend lives or dies
//! by. Only the fields the bridge actually touches are given safe
//! accessors elsewhere — everything else exists to keep offsets right.

use std::os::raw::c_void;
use std::ptr;

/// avifResult. Zero is success; any other value is a specific error code.
pub type AvifResult = i32;

/// The success value of [`AvifResult`].
pub const AVIF_RESULT_OK: AvifResult = 0;

/// avifChromaUpsampling: fastest available upsampling filter.
pub const AVIF_CHROMA_UPSAMPLING_FASTEST: u32 = 1;

/// avifAddImageFlags: the image is a complete, non-layered unit.
pub const AVIF_ADD_IMAGE_FLAG_SINGLE: u32 = 2;

/// Size of the diagnostics message buffer.
pub const AVIF_DIAGNOSTICS_ERROR_BUFFER_SIZE: usize = 256;

/// avifRWData: a byte range owned by the library's allocator.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifRwData {
    pub data: *mut u8,
    pub size: usize,
}

impl AvifRwData {
    /// AVIF_DATA_EMPTY.
    pub const fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            size: 0,
        }
    }
}

/// avifContentLightLevelInformationBox.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifContentLightLevelInformationBox {
    pub max_cll: u16,
    pub max_pall: u16,
}

/// avifPixelAspectRatioBox.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifPixelAspectRatioBox {
    pub h_spacing: u32,
    pub v_spacing: u32,
}

/// avifCleanApertureBox.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifCleanApertureBox {
    pub width_n: u32,
    pub width_d: u32,
    pub height_n: u32,
    pub height_d: u32,
    pub horiz_off_n: u32,
    pub horiz_off_d: u32,
    pub vert_off_n: u32,
    pub vert_off_d: u32,
}

/// avifImageRotation.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifImageRotation {
    pub angle: u8,
}

/// avifImageMirror.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifImageMirror {
    pub axis: u8,
}

/// avifImageTiming: presentation timing of the current frame.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifImageTiming {
    pub timescale: u64,
    pub pts: f64,
    pub pts_in_timescales: u64,
    pub duration: f64,
    pub duration_in_timescales: u64,
}

/// avifIOStats.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifIoStats {
    pub color_obu_size: u64,
    pub alpha_obu_size: u64,
}

/// avifDiagnostics: a NUL-terminated message buffer embedded in the
/// decoder/encoder contexts.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AvifDiagnostics {
    pub error: [u8; AVIF_DIAGNOSTICS_ERROR_BUFFER_SIZE],
}

impl AvifDiagnostics {
    /// The diagnostic text, trimmed at the first NUL byte.
    pub fn message(&self) -> String {
        let end = self
            .error
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.error.len());
        String::from_utf8_lossy(&self.error[..end]).trim().to_string()
    }
}

impl std::fmt::Debug for AvifDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvifDiagnostics")
            .field("message", &self.message())
            .finish()
    }
}

/// avifIO: the decoder's byte source. The function pointers are opaque to
/// the bridge; the library installs its own when memory IO is configured.
#[repr(C)]
pub struct AvifIo {
    pub destroy: *mut c_void,
    pub read: *mut c_void,
    pub write: *mut c_void,
    pub size_hint: u64,
    pub persistent: i32,
    pub data: *mut u8,
}

/// Opaque decoder internals.
#[repr(C)]
pub struct AvifDecoderData {
    _private: [u8; 0],
}

/// Opaque encoder internals.
#[repr(C)]
pub struct AvifEncoderData {
    _private: [u8; 0],
}

/// Opaque codec-specific options.
#[repr(C)]
pub struct AvifCodecSpecificOptions {
    _private: [u8; 0],
}

/// avifImage: the library's YUV image descriptor.
#[repr(C)]
pub struct AvifImage {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub yuv_format: u32,
    pub yuv_range: u32,
    pub yuv_chroma_sample_position: u32,
    pub yuv_planes: [*mut u8; 3],
    pub yuv_row_bytes: [u32; 3],
    pub image_owns_yuv_planes: i32,
    pub alpha_plane: *mut u8,
    pub alpha_row_bytes: u32,
    pub image_owns_alpha_plane: i32,
    pub alpha_premultiplied: i32,
    pub icc: AvifRwData,
    pub color_primaries: u16,
    pub transfer_characteristics: u16,
    pub matrix_coefficients: u16,
    pub clli: AvifContentLightLevelInformationBox,
    pub transform_flags: u32,
    pub pasp: AvifPixelAspectRatioBox,
    pub clap: AvifCleanApertureBox,
    pub irot: AvifImageRotation,
    pub imir: AvifImageMirror,
    pub exif: AvifRwData,
    pub xmp: AvifRwData,
}

/// avifRGBImage: the library's interleaved RGB(A) conversion target.
#[repr(C)]
pub struct AvifRgbImage {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: u32,
    pub chroma_upsampling: u32,
    pub chroma_downsampling: u32,
    pub avoid_lib_yuv: i32,
    pub ignore_alpha: i32,
    pub alpha_premultiplied: i32,
    pub is_float: i32,
    pub max_threads: i32,
    pub pixels: *mut u8,
    pub row_bytes: u32,
}

impl AvifRgbImage {
    /// A zeroed value, ready for `avifRGBImageSetDefaults`.
    pub fn zeroed() -> Self {
        // SAFETY: all-zero bytes are a valid value for this POD mirror
        // (null pixel pointer, zero dimensions).
        unsafe { std::mem::zeroed() }
    }
}

/// avifFraction.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifFraction {
    pub n: i32,
    pub d: i32,
}

/// avifScalingMode.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AvifScalingMode {
    pub horizontal: AvifFraction,
    pub vertical: AvifFraction,
}

/// avifDecoder: the per-call decode context.
#[repr(C)]
pub struct AvifDecoder {
    pub codec_choice: u32,
    pub max_threads: i32,
    pub requested_source: u32,
    pub allow_progressive: i32,
    pub allow_incremental: i32,
    pub ignore_exif: i32,
    pub ignore_xmp: i32,
    pub image_size_limit: u32,
    pub image_dimension_limit: u32,
    pub image_count_limit: u32,
    pub strict_flags: u32,
    pub image: *mut AvifImage,
    pub image_index: i32,
    pub image_count: i32,
    pub progressive_state: u32,
    pub image_timing: AvifImageTiming,
    pub timescale: u64,
    pub duration: f64,
    pub duration_in_timescales: u64,
    pub repetition_count: i32,
    pub alpha_present: i32,
    pub io_stats: AvifIoStats,
    pub diag: AvifDiagnostics,
    pub io: *mut AvifIo,
    pub data: *mut AvifDecoderData,
}

/// avifEncoder: the per-call encode context.
#[repr(C)]
pub struct AvifEncoder {
    pub codec_choice: u32,
    pub max_threads: i32,
    pub speed: i32,
    pub keyframe_interval: i32,
    pub timescale: u64,
    pub repetition_count: i32,
    pub extra_layer_count: u32,
    pub quality: i32,
    pub quality_alpha: i32,
    pub min_quantizer: i32,
    pub max_quantizer: i32,
    pub min_quantizer_alpha: i32,
    pub max_quantizer_alpha: i32,
    pub tile_rows_log2: i32,
    pub tile_cols_log2: i32,
    pub auto_tiling: i32,
    pub scaling_mode: AvifScalingMode,
    pub io_stats: AvifIoStats,
    pub diag: AvifDiagnostics,
    pub data: *mut AvifEncoderData,
    pub cs_options: *mut AvifCodecSpecificOptions,
}
