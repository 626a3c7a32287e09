//! # unbundle
//!
//! Extract the files embedded in a .NET single-file bundle.
//!
//! A single-file app is a native host executable with the application's
//! assemblies, native libraries and configuration appended to it. This crate
//! finds the bundle signature inside the image, decodes the manifest for any
//! bundle format version, and writes each embedded file (inflating compressed
//! ones) below an output directory.
//!
//! ## Features
//!
//! - Read bundles from the local filesystem or HTTP/HTTPS URLs (Range requests)
//! - Manifest format versions 1 through 6 and later
//! - Raw deflate compressed entries (version 6+)
//! - Paths that would escape the output directory are refused
//! - Per-entry outcomes: one bad entry does not stop the others
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use unbundle::{BundleExtractor, FailurePolicy};
//!
//! fn main() -> anyhow::Result<()> {
//!     let image = std::fs::read("app.exe")?;
//!     let extractor = BundleExtractor::open(&image)?;
//!
//!     for entry in extractor.entries() {
//!         println!("{}", entry.relative_path);
//!     }
//!
//!     let report = extractor.extract_all(Path::new("extracted"), FailurePolicy::Continue);
//!     for (path, err) in report.failures() {
//!         eprintln!("{path}: {err}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod io;

pub use bundle::{
    BUNDLE_SIGNATURE, BundleError, BundleExtractor, BundleHeader, BundleResult, ExtractionReport,
    FailurePolicy, FileEntry, FileType, HeaderFlags, Location, Manifest,
};
pub use cli::Cli;
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, read_fully};
