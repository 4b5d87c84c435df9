//! Error types for the avif-bridge workspace.
//!
//! Every fault raised inside a backend (bad header, codec trap, allocation
//! failure) is caught at the bridge boundary and converted into one of the
//! variants below; no raw backend fault crosses into caller-visible state.

use std::io;

use thiserror::Error;

use crate::options::ChromaSubsampling;

/// The closed error taxonomy surfaced by every decode/encode entry point.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading from guest linear memory failed (out-of-bounds range).
    #[error("avif: mem read failed")]
    MemRead,

    /// Writing into guest linear memory failed (out-of-bounds range).
    #[error("avif: mem write failed")]
    MemWrite,

    /// Parsing or frame conversion failed.
    ///
    /// `detail` carries the backend diagnostic text when one is available,
    /// otherwise a short description of the failing step.
    #[error("avif: decode failed: {detail}")]
    Decode {
        /// Diagnostic text from the backend, or the failing step.
        detail: String,
    },

    /// Encoding failed.
    #[error("avif: encode failed: {detail}")]
    Encode {
        /// Diagnostic text from the backend, or the failing step.
        detail: String,
    },

    /// The requested chroma subsampling is not part of the supported set.
    ///
    /// Only 4:4:4, 4:2:2 and 4:2:0 map onto the codec's pixel formats;
    /// anything else is rejected before any backend work happens.
    #[error("avif: unsupported chroma subsampling {requested:?}")]
    UnsupportedChroma {
        /// The ratio the caller asked for.
        requested: ChromaSubsampling,
    },

    /// Neither codec backend could be initialized.
    ///
    /// The reason is captured once during probing and re-reported
    /// identically on every subsequent call.
    #[error("avif: backend unavailable: {reason}")]
    BackendUnavailable {
        /// The captured initialization failure reason.
        reason: String,
    },

    /// The underlying byte source or sink failed.
    #[error("avif: io: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a `Decode` error with the given detail.
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: detail.into(),
        }
    }

    /// Create an `Encode` error with the given detail.
    pub fn encode(detail: impl Into<String>) -> Self {
        Self::Encode {
            detail: detail.into(),
        }
    }

    /// Create a `BackendUnavailable` error with the captured reason.
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error means no backend could be initialized.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Returns `true` if this error is a guest memory access failure.
    pub fn is_memory_failure(&self) -> bool {
        matches!(self, Self::MemRead | Self::MemWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::decode("BMFF parsing failed");
        assert_eq!(err.to_string(), "avif: decode failed: BMFF parsing failed");

        let err = Error::MemRead;
        assert_eq!(err.to_string(), "avif: mem read failed");

        let err = Error::backend_unavailable("cannot load library");
        assert_eq!(
            err.to_string(),
            "avif: backend unavailable: cannot load library"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_backend_unavailable() {
        assert!(Error::backend_unavailable("x").is_backend_unavailable());
        assert!(!Error::MemRead.is_backend_unavailable());
    }

    #[test]
    fn test_is_memory_failure() {
        assert!(Error::MemRead.is_memory_failure());
        assert!(Error::MemWrite.is_memory_failure());
        assert!(!Error::decode("x").is_memory_failure());
    }
}
