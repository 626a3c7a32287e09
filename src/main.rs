//! Main entry point for the unbundle CLI application.
//!
//! Reads a single-file bundle from a local path or HTTP URL, then lists or
//! extracts the embedded files.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use unbundle::{
    BundleExtractor, Cli, FileEntry, HttpRangeReader, LocalFileReader, Manifest, read_fully,
};

/// Application entry point.
///
/// Loads the whole image (local file or HTTP Range requests), then hands the
/// bytes to the bundle reader.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let image = if cli.is_http_url() {
        let reader = HttpRangeReader::new(cli.file.clone()).await?;
        let image = read_fully(&reader).await?;

        if !cli.is_quiet() {
            eprintln!(
                "Total bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
        image
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))?;
        read_fully(&reader).await?
    };

    process_bundle(&image, &cli)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the CLI verbosity.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// List or extract the bundle contained in `image`.
///
/// Signature and manifest errors abort immediately. Extraction errors are
/// collected per entry and reported together at the end.
fn process_bundle(image: &[u8], cli: &Cli) -> Result<()> {
    let extractor = BundleExtractor::open(image)?;

    // List mode: display bundle contents and exit
    if cli.list || cli.verbose {
        list_files(extractor.manifest(), cli.verbose);
        return Ok(());
    }

    let selected: Vec<&FileEntry> = extractor
        .entries()
        .iter()
        .filter(|e| is_selected(e, cli))
        .collect();

    let output_dir = Path::new(&cli.output_dir);
    let report = extractor.extract_entries(selected, output_dir, cli.failure_policy());

    if !cli.is_quiet() {
        for path in report.extracted() {
            println!("  extracted: {}", path);
        }
    }

    let failures = report.failures();
    if !failures.is_empty() {
        for (path, err) in &failures {
            eprintln!("error: {}: {}", path, err);
        }
        bail!(
            "{} of {} entries failed to extract",
            failures.len(),
            report.outcomes.len()
        );
    }

    if !cli.is_quiet() {
        println!(
            "Extracted {} files to {}",
            report.extracted().len(),
            output_dir.display()
        );
    }

    Ok(())
}

/// Apply the positional filters and `-x` exclusions to an entry.
fn is_selected(entry: &FileEntry, cli: &Cli) -> bool {
    let name = entry.relative_path.as_str();
    let basename = name.rsplit(['/', '\\']).next().unwrap_or(name);

    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, name) || glob_match(f, basename)
            } else {
                name == f.as_str() || basename == f.as_str()
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, name))
}

/// Print the manifest.
///
/// - Simple format (`-l`): relative paths, one per line
/// - Verbose format (`-v`): header summary plus a table of sizes and types
fn list_files(manifest: &Manifest, verbose: bool) {
    if !verbose {
        for entry in &manifest.entries {
            println!("{}", entry.relative_path);
        }
        return;
    }

    let header = &manifest.header;
    println!(
        "Bundle {} (format {}.{})",
        header.bundle_id, header.major_version, header.minor_version
    );
    if let Some(flags) = header.flags {
        println!(
            "Flags: {:#x}{}",
            flags.bits(),
            if flags.is_compat_mode() {
                " (netcoreapp3 compat)"
            } else {
                ""
            }
        );
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:<17}  Name",
        "Length", "Size", "Cmpr", "Type"
    );
    println!("{}", "-".repeat(70));

    let mut total_size = 0u64;
    let mut total_stored = 0u64;

    for entry in &manifest.entries {
        let size = entry.size.max(0) as u64;
        let stored = entry.stored_size().max(0) as u64;
        println!(
            "{:>10}  {:>10}  {}  {:<17}  {}",
            size,
            stored,
            ratio(size, stored),
            entry.kind.to_string(),
            entry.relative_path
        );
        total_size += size;
        total_stored += stored;
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:<17}  {} files",
        total_size,
        total_stored,
        ratio(total_size, total_stored),
        "",
        manifest.entries.len()
    );
}

/// Compression ratio as percentage saved
fn ratio(size: u64, stored: u64) -> String {
    if size > 0 && stored <= size {
        format!("{:>4}%", 100 - (stored * 100 / size))
    } else {
        "  0%".to_string()
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Skip the star, or let it swallow one more character
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
