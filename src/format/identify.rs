//! Format identification.
//!
//! A header buffer is matched against the catalog's sniff patterns in
//! priority order. The first match wins. When nothing matches, the
//! extension hint is looked up instead. Identification never fails: an
//! unrecognized input yields [`FileType::unknown`].
//!
//! # Type Aliases
//!
//! Catalog type entries without a description are aliases for another
//! type (`NEF` -> `TIFF`). [`resolve_base_type`] follows those links to the
//! base type and stops early on cycles.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{normalize_extension, TagCatalog};

/// Format name used when nothing matches.
pub const UNKNOWN_FORMAT: &str = "UNKNOWN";

/// A type with more extensions than this is treated as a generic container,
/// and a consistent extension hint may refine it.
const GENERIC_VARIANT_THRESHOLD: usize = 3;

/// Number of header bytes shown in the debug hex dump.
const HEX_DUMP_LEN: usize = 16;

// =============================================================================
// FileType
// =============================================================================

/// The resolved identity of one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileType {
    /// Base format, e.g. `JPEG`, `TIFF`
    pub format: String,

    /// Module whose tables describe this format
    pub module: String,

    pub description: String,

    /// Normalized extension of the input, if it had one
    pub extension: String,
}

impl FileType {
    /// The result for inputs nothing recognizes.
    pub fn unknown() -> Self {
        Self {
            format: UNKNOWN_FORMAT.to_string(),
            module: String::new(),
            description: "Unknown format".to_string(),
            extension: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.format == UNKNOWN_FORMAT
    }
}

// =============================================================================
// FormatIdentifier
// =============================================================================

/// Matches header bytes against a catalog's sniff patterns.
#[derive(Debug, Clone, Copy)]
pub struct FormatIdentifier<'a> {
    catalog: &'a TagCatalog,
}

impl<'a> FormatIdentifier<'a> {
    pub fn new(catalog: &'a TagCatalog) -> Self {
        Self { catalog }
    }

    /// Identify a header buffer.
    ///
    /// # Arguments
    /// * `header` - Leading bytes of the input (usually the first 1024)
    /// * `extension_hint` - File extension, with or without a leading dot
    pub fn identify(&self, header: &[u8], extension_hint: Option<&str>) -> FileType {
        let dump_len = header.len().min(HEX_DUMP_LEN);
        debug!(header = %hex::encode(&header[..dump_len]), "identifying input");

        let ext = extension_hint
            .map(normalize_extension)
            .filter(|ext| !ext.is_empty());

        for entry in self.catalog.magic() {
            if !entry.pattern.matches(header) {
                continue;
            }
            debug!(file_type = %entry.file_type, "sniff pattern matched");

            if let Some(ext) = ext.as_deref() {
                if let Some(refined) = self.refine_with_extension(&entry.file_type, ext) {
                    debug!(extension = ext, file_type = %refined, "using extension for specific format");
                    return self.resolve_file_type(&refined, Some(ext));
                }
            }

            return self.resolve_file_type(&entry.file_type, ext.as_deref());
        }

        if let Some(ext) = ext.as_deref() {
            if let Some(info) = self.catalog.extension(ext) {
                debug!(extension = ext, "falling back to extension");
                return self.resolve_file_type(&info.file_type, Some(ext));
            }
        }

        FileType::unknown()
    }

    /// Pick the extension's more specific type for a generic container match.
    fn refine_with_extension(&self, matched: &str, ext: &str) -> Option<String> {
        if self.catalog.variant_count(matched) <= GENERIC_VARIANT_THRESHOLD {
            return None;
        }

        let info = self.catalog.extension(ext)?;
        let consistent = info.file_type == matched
            || resolve_base_type(self.catalog, &info.file_type) == matched;
        consistent.then(|| info.file_type.clone())
    }

    /// Build a [`FileType`] for a matched or looked-up type.
    ///
    /// Module precedence: the exact type's module, then the original
    /// extension's module, then the base type's module, then the base type
    /// name itself.
    pub fn resolve_file_type(&self, file_type: &str, original_ext: Option<&str>) -> FileType {
        let catalog = self.catalog;
        let resolved = resolve_base_type(catalog, file_type);

        let mut description = original_ext
            .and_then(|ext| catalog.extension(ext))
            .map(|info| info.description.clone())
            .unwrap_or_default();
        if description.is_empty() {
            if let Some(info) = catalog.extension(&resolved) {
                description = info.description.clone();
            }
        }

        let module = catalog
            .module_for(file_type)
            .or_else(|| original_ext.and_then(|ext| catalog.module_for(ext)))
            .or_else(|| catalog.module_for(&resolved))
            .map(str::to_string)
            .unwrap_or_else(|| resolved.clone());

        FileType {
            format: resolved,
            module,
            description,
            extension: original_ext.unwrap_or_default().to_string(),
        }
    }
}

/// Follow alias entries (entries with no description) to the base type.
pub fn resolve_base_type(catalog: &TagCatalog, file_type: &str) -> String {
    let mut seen = HashSet::new();
    let mut current = file_type.to_string();

    while seen.insert(current.clone()) {
        match catalog.extension(&current) {
            Some(info) if info.file_type != current && info.description.is_empty() => {
                current = info.file_type.clone();
            }
            _ => break,
        }
    }

    current
}

/// Extension of a path, suitable as an identification hint.
pub fn extension_hint(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .filter(|ext| !ext.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
