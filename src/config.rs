//! Configuration for metaprobe.
//!
//! Two layers:
//! - [`ExtractOptions`]: library-level knobs for one extraction (read cap,
//!   oversize policy, IFD bound, sniff length)
//! - [`Config`]: command-line arguments via clap, with `METAPROBE_`
//!   environment variable fallbacks
//!
//! # Environment Variables
//!
//! - `METAPROBE_CATALOG` - Path to the JSON tag catalog (required)
//! - `METAPROBE_MAX_READ_BYTES` - Read cap in bytes (default: 50 MiB)
//! - `METAPROBE_OVERSIZE` - `truncate` or `reject` (default: truncate)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

// =============================================================================
// Default Values
// =============================================================================

/// Default read cap: inputs larger than this are truncated or rejected.
pub const DEFAULT_MAX_READ_BYTES: usize = 50 * 1024 * 1024;

/// Default number of IFDs followed per TIFF block.
pub const DEFAULT_MAX_IFDS: usize = 10;

/// Default number of header bytes handed to the format identifier.
pub const DEFAULT_SNIFF_LEN: usize = 1024;

// =============================================================================
// Library Options
// =============================================================================

/// What to do with inputs larger than the read cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OversizePolicy {
    /// Keep the first `max_read_bytes` bytes and scan those
    #[default]
    Truncate,
    /// Fail the extraction with `ExtractError::InputTooLarge`
    Reject,
}

/// Options for a single extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Maximum number of input bytes read into memory
    pub max_read_bytes: usize,

    /// Behavior when the input exceeds `max_read_bytes`
    pub oversize: OversizePolicy,

    /// Maximum number of IFDs decoded per TIFF block (chain plus sub-IFDs)
    pub max_ifds: usize,

    /// Number of leading bytes used for signature matching
    pub sniff_len: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            oversize: OversizePolicy::Truncate,
            max_ifds: DEFAULT_MAX_IFDS,
            sniff_len: DEFAULT_SNIFF_LEN,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// metaprobe - identify a file's format and extract its embedded metadata.
///
/// Tag definitions come from a pre-built JSON catalog. Results are written
/// to stdout as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "metaprobe")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// File to inspect.
    pub file: Option<PathBuf>,

    /// Path to the JSON tag catalog.
    #[arg(long, env = "METAPROBE_CATALOG")]
    pub catalog: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// List all catalog tables with their tag counts and exit.
    #[arg(long, default_value_t = false)]
    pub list_tables: bool,

    /// Maximum number of input bytes read into memory.
    #[arg(long, default_value_t = DEFAULT_MAX_READ_BYTES, env = "METAPROBE_MAX_READ_BYTES")]
    pub max_read_bytes: usize,

    /// What to do with inputs larger than --max-read-bytes.
    #[arg(long, value_enum, default_value_t = OversizePolicy::Truncate, env = "METAPROBE_OVERSIZE")]
    pub oversize: OversizePolicy,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.list_tables && self.file.is_none() {
            return Err("No input file given. Pass a file path or use --list-tables".to_string());
        }

        if self.max_read_bytes == 0 {
            return Err("max_read_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Build the library options from the command line.
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            max_read_bytes: self.max_read_bytes,
            oversize: self.oversize,
            ..ExtractOptions::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
