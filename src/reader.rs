//! `image` crate integration.
//!
//! [`AvifReader`] implements [`image::ImageDecoder`] so the generic
//! `image` entry points can consume AVIF streams through this bridge,
//! playing the role the original format registration plays in other
//! ecosystems.

use std::io::Read;

use image::error::{DecodingError, ImageFormatHint};
use image::{
    ColorType, DynamicImage, GenericImageView, ImageDecoder, ImageError, ImageFormat, ImageResult,
};

use avif_bridge_common::Error;

/// A one-shot AVIF decoder for the `image` crate.
///
/// The stream is decoded eagerly at construction (first frame only);
/// `read_image` then hands out the pixel bytes.
pub struct AvifReader {
    image: DynamicImage,
}

impl AvifReader {
    /// Decode the first frame of the AVIF stream in `reader`.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] wrapping the bridge's error taxonomy.
    pub fn new(reader: impl Read) -> ImageResult<Self> {
        let image = crate::decode(reader).map_err(into_image_error)?;
        Ok(Self { image })
    }
}

impl ImageDecoder for AvifReader {
    fn dimensions(&self) -> (u32, u32) {
        GenericImageView::dimensions(&self.image)
    }

    fn color_type(&self) -> ColorType {
        match self.image {
            DynamicImage::ImageRgba16(_) => ColorType::Rgba16,
            _ => ColorType::Rgba8,
        }
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        let bytes = self.image.as_bytes();
        if buf.len() != bytes.len() {
            return Err(into_image_error(Error::decode(
                "output buffer size mismatch",
            )));
        }
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image(buf)
    }
}

fn into_image_error(err: Error) -> ImageError {
    ImageError::Decoding(DecodingError::new(
        ImageFormatHint::Exact(ImageFormat::Avif),
        err,
    ))
}
