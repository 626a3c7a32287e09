use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the bundle reader.
pub type BundleResult<T> = std::result::Result<T, BundleError>;

/// Errors produced while locating, decoding or extracting a bundle.
///
/// Locator and decoder errors are fatal to the whole operation. Extraction
/// errors are reported per entry (see [`ExtractionReport`](super::ExtractionReport)).
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle signature not found (not a single-file bundle?)")]
    SignatureNotFound,

    #[error("bundle signature found {} times (at {offsets:?})", .offsets.len())]
    AmbiguousSignature { offsets: Vec<usize> },

    #[error("truncated buffer: need {needed} bytes at offset {offset}, buffer holds {available}")]
    TruncatedBuffer {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("payload size mismatch for {path}: expected {expected} bytes, inflated to {actual}")]
    PayloadSizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("failed to inflate {path}: {source}")]
    Decompression {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to write {path}: path escapes the output directory")]
    UnsafePath { path: String },

    #[error("failed to write {}: {source}", .path.display())]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BundleError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        BundleError::MalformedManifest(msg.into())
    }

    /// True for failures on the output side: unsafe paths and I/O errors.
    pub fn is_destination_error(&self) -> bool {
        matches!(
            self,
            BundleError::UnsafePath { .. } | BundleError::DestinationWrite { .. }
        )
    }
}
