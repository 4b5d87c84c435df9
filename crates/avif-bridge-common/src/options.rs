//! Encoding options.
//!
//! Options follow a default-substitution rule rather than hard validation:
//! a quality of 0 or 1000 encodes exactly like the default of 60. The one
//! exception is chroma subsampling, where only 4:4:4, 4:2:2 and 4:2:0 map
//! onto codec pixel formats and anything else is a hard error at encode
//! time (see [`crate::Error::UnsupportedChroma`]).

use serde::{Deserialize, Serialize};

/// The default quality encoding parameter.
pub const DEFAULT_QUALITY: i32 = 60;

/// The default speed encoding parameter.
pub const DEFAULT_SPEED: i32 = 10;

/// Chroma subsampling ratio for the encoded YUV planes.
///
/// Mirrors the ratios image pipelines commonly express; only the first
/// three have a codec pixel format behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaSubsampling {
    /// No chroma downsampling.
    Yuv444,
    /// Chroma halved horizontally.
    Yuv422,
    /// Chroma halved in both dimensions. The default.
    Yuv420,
    /// Chroma halved vertically. Not encodable.
    Yuv440,
    /// Chroma quartered horizontally. Not encodable.
    Yuv411,
    /// Chroma quartered horizontally, halved vertically. Not encodable.
    Yuv410,
}

impl Default for ChromaSubsampling {
    fn default() -> Self {
        Self::Yuv420
    }
}

/// Encoding parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Quality in the range [1,100]. Quality of 100 implies lossless.
    #[serde(default = "defaults::quality")]
    pub quality: i32,

    /// Alpha channel quality in the range [1,100].
    #[serde(default = "defaults::quality")]
    pub quality_alpha: i32,

    /// Speed in the range [1,10]. Slower should make for a better quality
    /// image in less bytes.
    #[serde(default = "defaults::speed")]
    pub speed: i32,

    /// Chroma subsampling of the encoded planes.
    #[serde(default)]
    pub chroma: ChromaSubsampling,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: defaults::quality(),
            quality_alpha: defaults::quality(),
            speed: defaults::speed(),
            chroma: ChromaSubsampling::default(),
        }
    }
}

impl EncodeOptions {
    /// Return a copy with every out-of-range value replaced by its default.
    ///
    /// Quality and alpha quality outside [1,100] become
    /// [`DEFAULT_QUALITY`]; speed outside [1,10] becomes [`DEFAULT_SPEED`].
    /// The chroma field is left untouched; its validation happens at the
    /// pixel-format mapping.
    pub fn normalized(&self) -> Self {
        Self {
            quality: in_range_or(self.quality, 1, 100, DEFAULT_QUALITY),
            quality_alpha: in_range_or(self.quality_alpha, 1, 100, DEFAULT_QUALITY),
            speed: in_range_or(self.speed, 1, 10, DEFAULT_SPEED),
            chroma: self.chroma,
        }
    }
}

fn in_range_or(value: i32, min: i32, max: i32, default: i32) -> i32 {
    if (min..=max).contains(&value) {
        value
    } else {
        default
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn quality() -> i32 {
        super::DEFAULT_QUALITY
    }

    pub const fn speed() -> i32 {
        super::DEFAULT_SPEED
    }
}
