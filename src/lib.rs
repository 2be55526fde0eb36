//! # metaprobe
//!
//! File format identification and catalog-driven metadata extraction.
//!
//! Tag definitions are not compiled in. They come from a [`TagCatalog`], an
//! immutable data set loaded once (usually from JSON) and shared across any
//! number of extractions.
//!
//! ## Pipeline
//!
//! 1. [`FormatIdentifier`] matches the first bytes of the input against the
//!    catalog's ordered sniff patterns, falling back to the file extension.
//! 2. [`TableResolver`] selects the tag tables relevant to the identified
//!    format and expands them along sub-directory references.
//! 3. [`MetadataExtractor`] scans the buffer for TIFF, JPEG, PNG, IPTC and
//!    XMP blocks and decodes them into a [`Metadata`] bag, loading more
//!    tables when it meets a family the initial selection missed.
//!
//! [`probe`] runs all three steps over a reader.
//!
//! ## Modules
//!
//! - [`catalog`] - Tag catalog, tables and lookup indices
//! - [`mod@format`] - Sniff patterns and format identification
//! - [`tables`] - Per-scan table set and its resolver
//! - [`extract`] - The scan engine and per-format walkers
//! - [`metadata`] - Extracted values and JSON rendering
//! - [`config`] - Extraction options and CLI arguments
//! - [`io`] - Capped input reading and endian helpers
//!
//! ## Example
//!
//! ```rust,no_run
//! use metaprobe::{probe_path, ExtractOptions, TagCatalog};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = TagCatalog::from_path("tags.json")?;
//!     let metadata = probe_path(&catalog, "photo.jpg", &ExtractOptions::default())?;
//!
//!     for (key, field) in metadata.fields() {
//!         println!("{}: {}", key, field.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod io;
pub mod metadata;
pub mod tables;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

// Re-export commonly used types
pub use catalog::{CatalogBuilder, ExtensionInfo, MagicEntry, TagCatalog, TagDef, TagTable};
pub use config::{Config, ExtractOptions, OversizePolicy};
pub use error::{CatalogError, ExtractError, PatternError, RenderError, TiffError};
pub use extract::{capture_metadata, extract, MetadataExtractor};
pub use format::{extension_hint, resolve_base_type, FileType, FormatIdentifier, SniffPattern};
pub use metadata::{Field, Metadata, Record, ScanStats, Value};
pub use tables::{TableResolver, TableSet};

/// Identify and scan one input.
///
/// Reads `reader` into memory (subject to the read cap), identifies the
/// format from the leading bytes and `extension_hint`, selects the tag
/// tables for it and extracts every recognized metadata block.
///
/// # Errors
/// - `ExtractError::Io` if the reader fails
/// - `ExtractError::InputTooLarge` if the input exceeds the cap under
///   [`OversizePolicy::Reject`]
pub fn probe<R: Read>(
    catalog: &TagCatalog,
    reader: R,
    extension_hint: Option<&str>,
    options: &ExtractOptions,
) -> Result<Metadata, ExtractError> {
    let data = io::read_input(reader, options)?;

    let header = &data[..data.len().min(options.sniff_len)];
    let file_type = FormatIdentifier::new(catalog).identify(header, extension_hint);
    debug!(format = %file_type.format, module = %file_type.module, "identified input");

    let mut tables = TableResolver::new(catalog).select_and_expand(&file_type);
    debug!(tables = tables.len(), "selected tag tables");

    Ok(capture_metadata(catalog, &file_type, &mut tables, options, data))
}

/// [`probe`] a file on disk, using its extension as the hint.
///
/// # Errors
/// Same as [`probe`]; opening the file maps to `ExtractError::Io`.
pub fn probe_path(
    catalog: &TagCatalog,
    path: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<Metadata, ExtractError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let ext = extension_hint(path);
    probe(catalog, file, ext.as_deref(), options)
}

/// [`probe_path`] a file and render the result as a JSON report.
///
/// # Errors
/// Same as [`probe_path`], plus `ExtractError::Render` if the report cannot
/// be encoded.
pub fn report_path(
    catalog: &TagCatalog,
    path: impl AsRef<Path>,
    options: &ExtractOptions,
    pretty: bool,
) -> Result<String, ExtractError> {
    let path = path.as_ref();
    let metadata = probe_path(catalog, path, options)?;

    let stats = metadata.stats();
    debug!(
        fields = metadata.len(),
        blocks = stats.blocks_found,
        skipped = stats.skipped_tags,
        loaded = stats.tables_loaded,
        "extraction finished"
    );

    Ok(metadata.to_json(&path.display().to_string(), pretty)?)
}
