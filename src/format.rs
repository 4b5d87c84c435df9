//! AVIF signature detection.
//!
//! An AVIF stream is an ISO-BMFF container whose `ftyp` box major brand
//! sits at byte offset 8: `avif` for a still image, `avis` for an image
//! sequence. Matching the fixed `ftyp` + brand bytes at offset 4 lets a
//! generic "decode any image" dispatcher route to this codec without
//! parsing the container.

/// Byte offset of the signature inside the stream.
const SIGNATURE_OFFSET: usize = 4;

/// Signature of the still-image brand.
const BRAND_STILL: &[u8; 8] = b"ftypavif";

/// Signature of the image-sequence brand.
const BRAND_SEQUENCE: &[u8; 8] = b"ftypavis";

fn has_signature(data: &[u8], brand: &[u8; 8]) -> bool {
    data.len() >= SIGNATURE_OFFSET + brand.len()
        && &data[SIGNATURE_OFFSET..SIGNATURE_OFFSET + brand.len()] == brand
}

/// Returns `true` if `data` starts with either AVIF brand.
pub fn is_avif(data: &[u8]) -> bool {
    has_signature(data, BRAND_STILL) || has_signature(data, BRAND_SEQUENCE)
}

/// Returns `true` if `data` starts with the image-sequence brand.
///
/// Sequence streams are still decodable with [`crate::decode`] (first
/// frame) but are the ones worth handing to [`crate::decode_all`].
pub fn is_avif_sequence(data: &[u8]) -> bool {
    has_signature(data, BRAND_SEQUENCE)
}
