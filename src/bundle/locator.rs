//! Signature search.
//!
//! The bundler appends the manifest to the host executable and patches a
//! placeholder inside the host with the header offset followed by a fixed
//! 32-byte signature. Finding that signature is the only way in: there is no
//! trailer to read from the end of the file as with ZIP.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use super::error::{BundleError, BundleResult};
use super::structures::{BUNDLE_SIGNATURE, HEADER_OFFSET_SIZE};

/// Find every offset at which `needle` occurs in `haystack`, in ascending order.
///
/// Overlapping matches are all reported. Degenerate inputs (empty haystack,
/// empty needle, needle longer than haystack) give an empty result.
pub fn locate(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if haystack.is_empty() || needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(i, _)| i)
        .collect()
}

/// Find the unique bundle signature in `buffer`.
///
/// # Errors
///
/// [`BundleError::SignatureNotFound`] when absent, [`BundleError::AmbiguousSignature`]
/// when present more than once.
pub fn find_signature(buffer: &[u8]) -> BundleResult<usize> {
    let offsets = locate(buffer, &BUNDLE_SIGNATURE);
    match offsets.len() {
        0 => Err(BundleError::SignatureNotFound),
        1 => {
            debug!(offset = offsets[0], "bundle signature found");
            Ok(offsets[0])
        }
        _ => Err(BundleError::AmbiguousSignature { offsets }),
    }
}

/// Read the header offset stored in the eight bytes before the signature.
pub fn header_offset(buffer: &[u8], signature_offset: usize) -> BundleResult<i64> {
    if signature_offset > buffer.len() {
        return Err(BundleError::TruncatedBuffer {
            offset: signature_offset as u64,
            needed: 0,
            available: buffer.len() as u64,
        });
    }

    let start = signature_offset
        .checked_sub(HEADER_OFFSET_SIZE)
        .ok_or(BundleError::TruncatedBuffer {
            offset: 0,
            needed: HEADER_OFFSET_SIZE as u64,
            available: signature_offset as u64,
        })?;

    let offset = LittleEndian::read_i64(&buffer[start..signature_offset]);
    if offset < 0 || offset as u64 >= buffer.len() as u64 {
        return Err(BundleError::malformed(format!(
            "header offset {offset} outside of {}-byte image",
            buffer.len()
        )));
    }

    debug!(header_offset = offset, "bundle header located");
    Ok(offset)
}
