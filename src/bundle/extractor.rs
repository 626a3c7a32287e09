use flate2::read::DeflateDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::error::{BundleError, BundleResult};
use super::locator::{find_signature, header_offset};
use super::parser::decode;
use super::structures::{FileEntry, Manifest};

/// What to do with the remaining entries once one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Extract every entry and report all failures
    #[default]
    Continue,
    /// Stop at the first failed entry
    Abort,
}

/// Result of extracting one entry
#[derive(Debug)]
pub struct EntryOutcome {
    pub relative_path: String,
    /// Destination written on success
    pub result: BundleResult<PathBuf>,
}

/// Per-entry outcomes of a batch extraction, in manifest order
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub outcomes: Vec<EntryOutcome>,
}

impl ExtractionReport {
    /// Relative paths that were written
    pub fn extracted(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.relative_path.as_str())
            .collect()
    }

    /// Failed entries with their errors
    pub fn failures(&self) -> Vec<(&str, &BundleError)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(_) => None,
                Err(e) => Some((o.relative_path.as_str(), e)),
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Single-file bundle extractor over an in-memory image
pub struct BundleExtractor<'a> {
    buffer: &'a [u8],
    manifest: Manifest,
}

impl<'a> BundleExtractor<'a> {
    /// Locate the signature, find the header and decode the manifest.
    ///
    /// Fails as a whole: without a unique signature and a clean decode there
    /// is nothing to extract.
    pub fn open(buffer: &'a [u8]) -> BundleResult<Self> {
        let signature_offset = find_signature(buffer)?;
        let header_offset = header_offset(buffer, signature_offset)?;
        let manifest = decode(buffer, header_offset)?;
        Ok(Self::new(buffer, manifest))
    }

    pub fn new(buffer: &'a [u8], manifest: Manifest) -> Self {
        Self { buffer, manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// List all entries in manifest order
    pub fn entries(&self) -> &[FileEntry] {
        &self.manifest.entries
    }

    /// Borrow `len` bytes of the image starting at the entry's offset
    fn payload(&self, entry: &FileEntry, len: i64) -> BundleResult<&'a [u8]> {
        if entry.offset < 0 || len < 0 {
            return Err(BundleError::malformed(format!(
                "{}: negative offset {} or length {}",
                entry.relative_path, entry.offset, len
            )));
        }

        let start = entry.offset as u64;
        let end = start + len as u64;
        if end > self.buffer.len() as u64 {
            return Err(BundleError::TruncatedBuffer {
                offset: start,
                needed: len as u64,
                available: self.buffer.len() as u64,
            });
        }

        Ok(&self.buffer[start as usize..end as usize])
    }

    /// Extract entry data to memory, inflating compressed entries
    pub fn extract_to_memory(&self, entry: &FileEntry) -> BundleResult<Vec<u8>> {
        if entry.compressed_size < 0 {
            return Err(BundleError::malformed(format!(
                "{}: negative compressed size {}",
                entry.relative_path, entry.compressed_size
            )));
        }
        if !entry.is_compressed() {
            return Ok(self.payload(entry, entry.size)?.to_vec());
        }

        if entry.size < 0 {
            return Err(BundleError::malformed(format!(
                "{}: negative size {}",
                entry.relative_path, entry.size
            )));
        }
        let compressed = self.payload(entry, entry.compressed_size)?;
        let expected = entry.size as u64;

        // One byte past the declared size is enough to detect an overrun
        let mut data = Vec::new();
        DeflateDecoder::new(compressed)
            .take(expected + 1)
            .read_to_end(&mut data)
            .map_err(|source| BundleError::Decompression {
                path: entry.relative_path.clone(),
                source,
            })?;

        if data.len() as u64 != expected {
            return Err(BundleError::PayloadSizeMismatch {
                path: entry.relative_path.clone(),
                expected,
                actual: data.len() as u64,
            });
        }

        Ok(data)
    }

    /// Extract one entry below `output_dir`, returning the written path
    pub fn extract_entry(&self, entry: &FileEntry, output_dir: &Path) -> BundleResult<PathBuf> {
        let output_path = output_dir.join(safe_relative_path(&entry.relative_path)?);
        let data = self.extract_to_memory(entry)?;

        let write_error = |source: std::io::Error| BundleError::DestinationWrite {
            path: output_path.clone(),
            source,
        };

        // create_dir_all treats an existing directory as success
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }
        fs::write(&output_path, &data).map_err(write_error)?;

        debug!(path = %entry.relative_path, bytes = data.len(), "extracted entry");
        Ok(output_path)
    }

    /// Extract every entry below `output_dir`
    pub fn extract_all(&self, output_dir: &Path, policy: FailurePolicy) -> ExtractionReport {
        self.extract_entries(self.entries(), output_dir, policy)
    }

    /// Extract the given entries below `output_dir`, in iteration order
    pub fn extract_entries<'e>(
        &self,
        entries: impl IntoIterator<Item = &'e FileEntry>,
        output_dir: &Path,
        policy: FailurePolicy,
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for entry in entries {
            let result = self.extract_entry(entry, output_dir);
            let failed = result.is_err();
            if let Err(ref e) = result {
                warn!(path = %entry.relative_path, error = %e, "failed to extract entry");
            }

            report.outcomes.push(EntryOutcome {
                relative_path: entry.relative_path.clone(),
                result,
            });

            if failed && policy == FailurePolicy::Abort {
                break;
            }
        }

        report
    }
}

/// Turn a bundle-relative path into one that cannot leave the output directory.
///
/// Both `/` and `\` separate components. `.` and empty components are dropped.
/// Parent references and rooted paths are rejected, and on Windows so is any
/// component containing `:` (drive prefixes and alternate data streams).
pub fn safe_relative_path(relative_path: &str) -> BundleResult<PathBuf> {
    let unsafe_path = || BundleError::UnsafePath {
        path: relative_path.to_string(),
    };

    if relative_path.starts_with(['/', '\\']) {
        return Err(unsafe_path());
    }

    let mut path = PathBuf::new();
    for part in relative_path.split(['/', '\\']) {
        if cfg!(windows) && part.contains(':') {
            return Err(unsafe_path());
        }
        for component in Path::new(part).components() {
            match component {
                Component::Normal(name) => path.push(name),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(unsafe_path());
                }
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(path)
}
