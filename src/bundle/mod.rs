//! Single-file bundle parsing and extraction.
//!
//! A .NET single-file app is a native host executable with the application's
//! files appended to it, followed by a manifest describing them. The host
//! carries a placeholder that the bundler patches with the manifest offset and
//! a fixed 32-byte signature.
//!
//! ## Architecture
//!
//! - [`locator`]: signature search and header offset lookup
//! - [`parser`]: version-aware manifest decoding over a bounds-checked cursor
//! - [`extractor`]: per-entry payload slicing, inflation and writing
//! - [`structures`]: the decoded header, entries and format constants
//!
//! ## Format versions
//!
//! - 1: header and entries only
//! - 2+: header also locates deps.json and runtimeconfig.json, plus a flags word
//! - 6+: entries carry a compressed size; compressed payloads are raw deflate
//!
//! Unknown newer versions are decoded with the version 6 rules.

mod error;
mod extractor;
pub mod locator;
pub mod parser;
mod structures;

pub use error::{BundleError, BundleResult};
pub use extractor::{
    BundleExtractor, EntryOutcome, ExtractionReport, FailurePolicy, safe_relative_path,
};
pub use locator::{find_signature, header_offset, locate};
pub use parser::decode;
pub use structures::*;
