//! The metadata scan engine.
//!
//! [`MetadataExtractor`] walks one in-memory buffer and decodes every
//! metadata block it recognizes into a [`Metadata`] bag. Sub-scans run in a
//! fixed order:
//!
//! 1. TIFF byte-order markers anywhere in the buffer ([`tiff`])
//! 2. JPEG marker segments, if the buffer starts with SOI ([`jpeg`])
//! 3. PNG chunks, if the buffer starts with the PNG signature ([`png`])
//! 4. the first plausible IPTC-IIM block ([`iptc`])
//! 5. an XMP packet ([`xmp`])
//!
//! Every sub-scan is best-effort. Malformed lengths or out-of-range offsets
//! end that sub-scan only; the others still run.
//!
//! # Table Set
//!
//! The extractor borrows the scan's [`TableSet`] mutably. When a sub-scan
//! meets a metadata family the initial selection missed (IPTC inside a
//! Photoshop segment, Exif inside a PNG), it loads the matching tables
//! before decoding, and they stay loaded for the rest of the scan.

pub mod iptc;
pub mod jpeg;
pub mod png;
pub mod tiff;
pub mod values;
pub mod xmp;

use std::collections::HashSet;

use bytes::Bytes;
use tracing::debug;

use crate::catalog::TagCatalog;
use crate::config::ExtractOptions;
use crate::format::FileType;
use crate::metadata::{Field, Metadata, Value};
use crate::tables::{TableResolver, TableSet};

pub use tiff::{ByteOrder, IfdEntry, TiffHeader};
pub use values::FieldType;

/// Table name used for bookkeeping fields.
const FILE_TABLE: &str = "File";

// =============================================================================
// MetadataExtractor
// =============================================================================

/// Stateful scan over a single buffer.
pub struct MetadataExtractor<'a> {
    data: Bytes,
    resolver: TableResolver<'a>,
    tables: &'a mut TableSet,
    options: &'a ExtractOptions,
    metadata: Metadata,

    /// Absolute offsets of TIFF blocks already decoded
    tiff_seen: HashSet<usize>,

    /// Absolute offsets of IPTC blocks already decoded
    iptc_seen: HashSet<usize>,

    /// Module hints already passed to the dynamic loader
    loaded_hints: HashSet<String>,
}

impl<'a> MetadataExtractor<'a> {
    /// Create an extractor that writes into `metadata`.
    pub fn new(
        catalog: &'a TagCatalog,
        tables: &'a mut TableSet,
        options: &'a ExtractOptions,
        data: Bytes,
        metadata: Metadata,
    ) -> Self {
        Self {
            data,
            resolver: TableResolver::new(catalog),
            tables,
            options,
            metadata,
            tiff_seen: HashSet::new(),
            iptc_seen: HashSet::new(),
            loaded_hints: HashSet::new(),
        }
    }

    /// Run every sub-scan and return the filled bag.
    pub fn extract_all(mut self) -> Metadata {
        debug!(bytes = self.data.len(), tables = self.tables.len(), "scanning for metadata");

        self.detect_container();
        self.scan_tiff_headers();
        if jpeg::is_jpeg(&self.data) {
            debug!("detected JPEG structure");
            self.scan_jpeg_segments();
        }
        if png::is_png(&self.data) {
            debug!("detected PNG structure");
            self.scan_png_chunks();
        }
        self.scan_for_iptc();
        self.scan_for_xmp();

        let stats = self.metadata.stats();
        debug!(
            fields = self.metadata.len(),
            blocks = stats.blocks_found,
            skipped = stats.skipped_tags,
            "scan complete"
        );
        self.metadata
    }

    /// Load tables for a metadata family found mid-scan, once per hint.
    fn load_module(&mut self, hint: &str) {
        if !self.loaded_hints.insert(hint.to_uppercase()) {
            return;
        }
        let loaded = self.resolver.load_for_discovered_type(hint, self.tables);
        if loaded > 0 {
            debug!(hint, loaded, "dynamically loaded tables");
        }
        self.metadata.stats_mut().tables_loaded += loaded;
    }

    /// Note container formats whose structure is not parsed.
    fn detect_container(&mut self) {
        let data = &self.data;
        let container = if data.len() > 4 && data.starts_with(b"PK\x03\x04") {
            Some("ZIP")
        } else if data.len() > 5 && data.starts_with(b"%PDF") {
            Some("PDF")
        } else if data.len() > 12 && &data[4..8] == b"ftyp" {
            let size = crate::io::read_u32_be(&data[0..4]) as usize;
            (size > 8 && size < data.len()).then_some("QuickTime")
        } else {
            None
        };

        if let Some(kind) = container {
            debug!(container = kind, "detected container structure");
            self.metadata.stats_mut().container = Some(kind.to_string());
        }
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Scan `data` with the given table set.
///
/// The returned bag carries no bookkeeping keys; see [`capture_metadata`].
pub fn extract(
    catalog: &TagCatalog,
    tables: &mut TableSet,
    options: &ExtractOptions,
    data: Bytes,
) -> Metadata {
    let metadata = Metadata::new("", data.len());
    MetadataExtractor::new(catalog, tables, options, data, metadata).extract_all()
}

/// Write the bookkeeping keys for `file_type`, then scan `data`.
///
/// Bookkeeping keys: `FileType` always, `FileTypeDescription` when the type
/// has a description, `MIMEType` when the catalog maps the format to one.
pub fn capture_metadata(
    catalog: &TagCatalog,
    file_type: &FileType,
    tables: &mut TableSet,
    options: &ExtractOptions,
    data: Bytes,
) -> Metadata {
    let mut metadata = Metadata::new(file_type.format.as_str(), data.len());

    metadata.set(
        "FileType",
        Field::new(FILE_TABLE, "FileType", "FileType", Value::from(file_type.format.as_str())),
    );
    if !file_type.description.is_empty() {
        metadata.set(
            "FileTypeDescription",
            Field::new(
                FILE_TABLE,
                "FileTypeDescription",
                "FileTypeDescription",
                Value::from(file_type.description.as_str()),
            ),
        );
    }
    if let Some(mime) = catalog.mime_type(&file_type.format) {
        metadata.set(
            "MIMEType",
            Field::new(FILE_TABLE, "MIMEType", "MIMEType", Value::from(mime)),
        );
    }

    MetadataExtractor::new(catalog, tables, options, data, metadata).extract_all()
}

// =============================================================================
// Tests
// =============================================================================
