//! Manifest decoder.
//!
//! The manifest is written by the bundler with a .NET `BinaryWriter`, so the
//! layout is plain little-endian integers and length-prefixed strings:
//!
//! ```text
//! u32 major, u32 minor, i32 file_count, string bundle_id
//! [major >= 2] i64 deps_offset, i64 deps_size,
//!              i64 runtimeconfig_offset, i64 runtimeconfig_size, u64 flags
//! file_count x { i64 offset, i64 size, [major >= 6] i64 compressed_size,
//!                u8 type, string relative_path }
//! ```
//!
//! Strings carry a 7-bit encoded length followed by UTF-8 bytes.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::{debug, info};

use super::error::{BundleError, BundleResult};
use super::structures::*;

/// Smallest possible encoded entry: offset, size, type and an empty path.
const MIN_ENTRY_SIZE: u64 = 8 + 8 + 1 + 1;

/// Longest 7-bit encoded length prefix for an `i32`.
const MAX_LENGTH_PREFIX_BYTES: u32 = 5;

/// Decode the manifest starting at `header_offset`.
///
/// Decoding is all-or-nothing: any failure discards everything read so far.
pub fn decode(buffer: &[u8], header_offset: i64) -> BundleResult<Manifest> {
    if header_offset < 0 {
        return Err(BundleError::malformed(format!(
            "negative header offset {header_offset}"
        )));
    }

    let mut reader = ManifestReader::new(buffer, header_offset as u64);
    let manifest = reader.read_manifest()?;

    info!(
        major = manifest.header.major_version,
        minor = manifest.header.minor_version,
        bundle_id = %manifest.header.bundle_id,
        entries = manifest.entries.len(),
        "decoded bundle manifest"
    );
    Ok(manifest)
}

/// Forward-only cursor over the image.
///
/// Every read is bounds checked and reports [`BundleError::TruncatedBuffer`]
/// instead of an I/O error.
pub struct ManifestReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ManifestReader<'a> {
    pub fn new(buffer: &'a [u8], position: u64) -> Self {
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(position);
        Self { cursor }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    /// Fail with `TruncatedBuffer` unless `needed` bytes are left.
    fn ensure(&self, needed: u64) -> BundleResult<()> {
        if self.remaining() < needed {
            return Err(BundleError::TruncatedBuffer {
                offset: self.position(),
                needed,
                available: self.len(),
            });
        }
        Ok(())
    }

    /// Run a fixed-size read, mapping a short read to `TruncatedBuffer`.
    fn read_with<T>(
        &mut self,
        needed: u64,
        read: impl FnOnce(&mut Cursor<&'a [u8]>) -> std::io::Result<T>,
    ) -> BundleResult<T> {
        let offset = self.position();
        read(&mut self.cursor).map_err(|_| BundleError::TruncatedBuffer {
            offset,
            needed,
            available: self.len(),
        })
    }

    pub fn read_u8(&mut self) -> BundleResult<u8> {
        self.read_with(1, |c| c.read_u8())
    }

    pub fn read_u32(&mut self) -> BundleResult<u32> {
        self.read_with(4, |c| c.read_u32::<LittleEndian>())
    }

    pub fn read_i32(&mut self) -> BundleResult<i32> {
        self.read_with(4, |c| c.read_i32::<LittleEndian>())
    }

    pub fn read_i64(&mut self) -> BundleResult<i64> {
        self.read_with(8, |c| c.read_i64::<LittleEndian>())
    }

    pub fn read_u64(&mut self) -> BundleResult<u64> {
        self.read_with(8, |c| c.read_u64::<LittleEndian>())
    }

    /// Read a 7-bit encoded non-negative `i32` (the .NET string length prefix).
    pub fn read_7bit_length(&mut self) -> BundleResult<usize> {
        let mut value: u32 = 0;
        for i in 0..MAX_LENGTH_PREFIX_BYTES {
            let byte = self.read_u8()?;
            if i == MAX_LENGTH_PREFIX_BYTES - 1 && byte > 0x07 {
                return Err(BundleError::malformed("string length prefix overflows i32"));
            }
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as usize);
            }
        }
        Err(BundleError::malformed("string length prefix too long"))
    }

    /// Read a length-prefixed string, replacing invalid UTF-8.
    pub fn read_string(&mut self) -> BundleResult<String> {
        let len = self.read_7bit_length()?;
        // Check before allocating: the prefix comes from untrusted input
        self.ensure(len as u64)?;
        let mut bytes = vec![0u8; len];
        self.read_with(len as u64, |c| c.read_exact(&mut bytes))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_location(&mut self) -> BundleResult<Location> {
        Ok(Location {
            offset: self.read_i64()?,
            size: self.read_i64()?,
        })
    }

    pub fn read_header(&mut self) -> BundleResult<(BundleHeader, usize)> {
        let major_version = self.read_u32()?;
        let minor_version = self.read_u32()?;
        let file_count = self.read_i32()?;
        if file_count < 0 {
            return Err(BundleError::malformed(format!(
                "negative file count {file_count}"
            )));
        }
        let bundle_id = self.read_string()?;

        let (deps_json, runtime_config_json, flags) =
            if major_version >= VERSION_WITH_HEADER_EXTRAS {
                let deps = self.read_location()?;
                let runtime_config = self.read_location()?;
                let flags = HeaderFlags(self.read_u64()?);
                (Some(deps), Some(runtime_config), Some(flags))
            } else {
                (None, None, None)
            };

        let header = BundleHeader {
            major_version,
            minor_version,
            bundle_id,
            deps_json,
            runtime_config_json,
            flags,
        };
        Ok((header, file_count as usize))
    }

    pub fn read_entry(&mut self, major_version: u32) -> BundleResult<FileEntry> {
        let offset = self.read_i64()?;
        let size = self.read_i64()?;
        let compressed_size = if major_version >= VERSION_WITH_COMPRESSION {
            self.read_i64()?
        } else {
            0
        };
        let kind = FileType::from_u8(self.read_u8()?);
        let relative_path = self.read_string()?;

        Ok(FileEntry {
            offset,
            size,
            compressed_size,
            kind,
            relative_path,
        })
    }

    pub fn read_manifest(&mut self) -> BundleResult<Manifest> {
        let (header, file_count) = self.read_header()?;

        // Reject counts that cannot fit before allocating for them
        let min_entry = if header.has_compression() {
            MIN_ENTRY_SIZE + 8
        } else {
            MIN_ENTRY_SIZE
        };
        let max_entries = self.remaining() / min_entry;
        if file_count as u64 > max_entries {
            return Err(BundleError::malformed(format!(
                "file count {file_count} exceeds the {max_entries} entries that fit in the image"
            )));
        }

        let mut entries = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            let entry = self.read_entry(header.major_version)?;
            debug!(entry = %entry, "decoded entry");
            entries.push(entry);
        }

        Ok(Manifest { header, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn write_string(buf: &mut Vec<u8>, s: &str) {
        let mut len = s.len() as u32;
        while len >= 0x80 {
            buf.push((len as u8) | 0x80);
            len >>= 7;
        }
        buf.push(len as u8);
        buf.extend_from_slice(s.as_bytes());
    }

    fn header(major: u32, count: i32, id: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(major).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_i32::<LittleEndian>(count).unwrap();
        write_string(&mut buf, id);
        buf
    }

    fn v1_entry(buf: &mut Vec<u8>, offset: i64, size: i64, kind: u8, path: &str) {
        buf.write_i64::<LittleEndian>(offset).unwrap();
        buf.write_i64::<LittleEndian>(size).unwrap();
        buf.write_u8(kind).unwrap();
        write_string(buf, path);
    }

    #[test]
    fn decodes_v1_manifest() {
        let mut buf = header(1, 2, "abc");
        v1_entry(&mut buf, 200, 5, 1, "a.dll");
        v1_entry(&mut buf, 205, 7, 9, "sub/b.json");

        let manifest = decode(&buf, 0).unwrap();
        assert_eq!(manifest.header.major_version, 1);
        assert_eq!(manifest.header.bundle_id, "abc");
        assert_eq!(manifest.header.deps_json, None);
        assert_eq!(manifest.header.flags, None);
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[1].kind, FileType::Other(9));
        assert_eq!(manifest.entries[1].relative_path, "sub/b.json");
        assert_eq!(manifest.entries[1].compressed_size, 0);
    }

    #[test]
    fn long_string_uses_multibyte_prefix() {
        let id = "x".repeat(300);
        let buf = header(1, 0, &id);
        // 300 = 0b10_0101100 -> 0xAC 0x02
        assert_eq!(&buf[12..14], &[0xAC, 0x02]);
        let manifest = decode(&buf, 0).unwrap();
        assert_eq!(manifest.header.bundle_id, id);
    }

    #[test]
    fn negative_file_count_is_malformed() {
        let buf = header(1, -1, "id");
        assert!(matches!(
            decode(&buf, 0),
            Err(BundleError::MalformedManifest(_))
        ));
    }

    #[test]
    fn absurd_file_count_fails_fast() {
        let buf = header(1, i32::MAX, "id");
        assert!(matches!(
            decode(&buf, 0),
            Err(BundleError::MalformedManifest(_))
        ));
    }

    #[test]
    fn truncated_entry_fails_whole_decode() {
        let mut buf = header(1, 2, "id");
        v1_entry(&mut buf, 0, 1, 1, "a");
        v1_entry(&mut buf, 0, 1, 1, "abcdefghijklmnopqrstuvwxyz");
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            decode(&buf, 0),
            Err(BundleError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn truncated_header_reports_position() {
        let buf = [1u8, 0, 0, 0, 0, 0];
        match decode(&buf, 0) {
            Err(BundleError::TruncatedBuffer {
                offset,
                needed,
                available,
            }) => {
                assert_eq!((offset, needed, available), (4, 4, 6));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn overlong_length_prefix_is_malformed() {
        let mut buf = ManifestReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F], 0);
        assert!(matches!(
            buf.read_7bit_length(),
            Err(BundleError::MalformedManifest(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let data = [2u8, 0xC3, 0x28];
        let mut reader = ManifestReader::new(&data, 0);
        assert_eq!(reader.read_string().unwrap(), "\u{FFFD}(");
    }

    #[test]
    fn decoding_starts_at_header_offset() {
        let mut buf = vec![0xEEu8; 16];
        buf.extend(header(1, 0, "later"));
        let manifest = decode(&buf, 16).unwrap();
        assert_eq!(manifest.header.bundle_id, "later");
        assert!(manifest.is_empty());
    }
}
