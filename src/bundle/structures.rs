use std::fmt;

/// Bundle signature written by the .NET bundler into the host executable.
///
/// The eight bytes preceding it hold the little-endian offset of the bundle header.
pub const BUNDLE_SIGNATURE: [u8; 32] = [
    0x8b, 0x12, 0x02, 0xb9, 0x6a, 0x61, 0x20, 0x38, //
    0x72, 0x7b, 0x93, 0x02, 0x14, 0xd7, 0xa0, 0x32, //
    0x13, 0xf5, 0xb9, 0xe6, 0xef, 0xae, 0x33, 0x18, //
    0xee, 0x3b, 0x2d, 0xce, 0x24, 0xb3, 0x6a, 0xae,
];

/// Size of the header offset stored right before the signature.
pub const HEADER_OFFSET_SIZE: usize = 8;

/// First major version carrying the deps.json/runtimeconfig.json locations and flags.
pub const VERSION_WITH_HEADER_EXTRAS: u32 = 2;

/// First major version carrying a per-entry compressed size.
pub const VERSION_WITH_COMPRESSION: u32 = 6;

/// Kind of an embedded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    Assembly,
    NativeBinary,
    DepsJson,
    RuntimeConfigJson,
    Symbols,
    /// Type code newer than this reader
    Other(u8),
}

impl FileType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => FileType::Unknown,
            1 => FileType::Assembly,
            2 => FileType::NativeBinary,
            3 => FileType::DepsJson,
            4 => FileType::RuntimeConfigJson,
            5 => FileType::Symbols,
            _ => FileType::Other(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            FileType::Unknown => 0,
            FileType::Assembly => 1,
            FileType::NativeBinary => 2,
            FileType::DepsJson => 3,
            FileType::RuntimeConfigJson => 4,
            FileType::Symbols => 5,
            FileType::Other(v) => *v,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Unknown => f.write_str("Unknown"),
            FileType::Assembly => f.write_str("Assembly"),
            FileType::NativeBinary => f.write_str("NativeBinary"),
            FileType::DepsJson => f.write_str("DepsJson"),
            FileType::RuntimeConfigJson => f.write_str("RuntimeConfigJson"),
            FileType::Symbols => f.write_str("Symbols"),
            FileType::Other(v) => write!(f, "Type({v})"),
        }
    }
}

/// Header flags word (major version 2+)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(pub u64);

impl HeaderFlags {
    pub const NONE: HeaderFlags = HeaderFlags(0);
    pub const NETCOREAPP3_COMPAT_MODE: HeaderFlags = HeaderFlags(1);

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, other: HeaderFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_compat_mode(&self) -> bool {
        self.contains(Self::NETCOREAPP3_COMPAT_MODE)
    }
}

/// Offset and size of a file referenced from the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: i64,
    pub size: i64,
}

/// Bundle header
///
/// `deps_json`, `runtime_config_json` and `flags` are `Some` exactly when
/// `major_version >= 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub major_version: u32,
    /// Stored but currently always zero
    pub minor_version: u32,
    pub bundle_id: String,
    pub deps_json: Option<Location>,
    pub runtime_config_json: Option<Location>,
    pub flags: Option<HeaderFlags>,
}

impl BundleHeader {
    pub fn has_compression(&self) -> bool {
        self.major_version >= VERSION_WITH_COMPRESSION
    }
}

/// One embedded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub offset: i64,
    pub size: i64,
    /// Zero when stored uncompressed (always zero before version 6)
    pub compressed_size: i64,
    pub kind: FileType,
    /// Path relative to the bundle's source directory
    pub relative_path: String,
}

impl FileEntry {
    pub fn is_compressed(&self) -> bool {
        self.compressed_size > 0
    }

    /// Number of bytes the entry occupies inside the image
    pub fn stored_size(&self) -> i64 {
        if self.is_compressed() {
            self.compressed_size
        } else {
            self.size
        }
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] @{} size={} compressed={}",
            self.relative_path, self.kind, self.offset, self.size, self.compressed_size
        )
    }
}

/// Decoded header plus entries in serialization order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub header: BundleHeader,
    pub entries: Vec<FileEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_codes_are_preserved() {
        assert_eq!(FileType::from_u8(1), FileType::Assembly);
        assert_eq!(FileType::from_u8(42), FileType::Other(42));
        assert_eq!(FileType::from_u8(42).as_u8(), 42);
        assert_eq!(FileType::Other(42).to_string(), "Type(42)");
    }

    #[test]
    fn compat_flag() {
        assert!(HeaderFlags(1).is_compat_mode());
        assert!(HeaderFlags(3).is_compat_mode());
        assert!(!HeaderFlags::NONE.is_compat_mode());
    }

    #[test]
    fn stored_size_follows_compression() {
        let mut entry = FileEntry {
            offset: 0,
            size: 100,
            compressed_size: 0,
            kind: FileType::Assembly,
            relative_path: "a.dll".into(),
        };
        assert_eq!(entry.stored_size(), 100);
        entry.compressed_size = 40;
        assert!(entry.is_compressed());
        assert_eq!(entry.stored_size(), 40);
    }
}
