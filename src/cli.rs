use clap::Parser;

use crate::bundle::FailurePolicy;

#[derive(Parser, Debug)]
#[command(name = "unbundle")]
#[command(version)]
#[command(about = "Extract files from .NET single-file bundles", long_about = None)]
#[command(after_help = "Examples:\n  \
  unbundle app.exe                    extract everything into ./extracted\n  \
  unbundle app.exe -o out '*.dll'     extract only the assemblies into out\n  \
  unbundle -l https://example.com/app.exe   list files in a remote bundle")]
pub struct Cli {
    /// Bundle executable path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Output directory
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "extracted")]
    pub output_dir: String,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (header, sizes and types)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Log decoding and extraction details to stderr
    #[arg(long)]
    pub debug: bool,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Stop at the first entry that fails to extract
    #[arg(long)]
    pub fail_fast: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        }
    }

    /// Default log level for the tracing subscriber when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.debug {
            "debug"
        } else {
            "warn"
        }
    }
}
