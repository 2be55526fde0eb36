//! Precomputed lookup indices over a catalog's tables.
//!
//! Table references in sub-directory pointers rarely spell a table name
//! exactly the way the catalog keys it, so lookups go through one typed
//! function, [`CatalogIndex::find_table_name`], with a fixed precedence:
//!
//! 1. exact table name
//! 2. table whose name ends with `::<key>`
//! 3. case-insensitive table name
//!
//! All indices are built once when the catalog is built; nothing here
//! re-scans the table map at query time.

use std::collections::{BTreeMap, HashMap};

/// Separator between segments of table names and sub-directory references.
pub const PATH_SEPARATOR: &str = "::";

/// Lookup indices keyed by module, name suffix and case-folded name.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    /// Upper-cased module name -> table names (sorted)
    by_module: BTreeMap<String, Vec<String>>,

    /// Every `::`-delimited tail of a table name -> table names (sorted)
    by_suffix: HashMap<String, Vec<String>>,

    /// Lower-cased table name -> table name
    by_lower: HashMap<String, String>,
}

impl CatalogIndex {
    /// Build the indices from `(table name, module name)` pairs.
    ///
    /// Pairs must arrive in table-name order so every index bucket is sorted
    /// and the "first" candidate is deterministic.
    pub fn build<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = CatalogIndex::default();

        for (name, module) in tables {
            index
                .by_module
                .entry(module.to_uppercase())
                .or_default()
                .push(name.to_string());

            let mut rest = name;
            while let Some(pos) = rest.find(PATH_SEPARATOR) {
                rest = &rest[pos + PATH_SEPARATOR.len()..];
                if rest.is_empty() {
                    break;
                }
                index
                    .by_suffix
                    .entry(rest.to_string())
                    .or_default()
                    .push(name.to_string());
            }

            index
                .by_lower
                .entry(name.to_lowercase())
                .or_insert_with(|| name.to_string());
        }

        index
    }

    /// Resolve a reference key to a table name.
    ///
    /// `exists` answers exact-name membership; the caller owns the table map.
    pub fn find_table_name<'a>(
        &'a self,
        key: &'a str,
        exists: impl Fn(&str) -> bool,
    ) -> Option<&'a str> {
        if exists(key) {
            return Some(key);
        }

        if let Some(name) = self.by_suffix.get(key).and_then(|names| names.first()) {
            return Some(name);
        }

        self.by_lower.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Tables whose module name equals `module`, ignoring case.
    pub fn tables_for_module(&self, module: &str) -> &[String] {
        self.by_module
            .get(&module.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Tables whose module name contains `hint`, ignoring case.
    ///
    /// Results are grouped by module name order, then table name order.
    pub fn tables_containing_module(&self, hint: &str) -> impl Iterator<Item = &str> {
        let hint = hint.to_uppercase();
        self.by_module
            .iter()
            .filter(move |(module, _)| module.contains(&hint))
            .flat_map(|(_, names)| names.iter().map(String::as_str))
    }
}

/// Reduce a multi-segment sub-directory reference to its lookup key.
///
/// `Image::ExifTool::Nikon::Main` becomes `Nikon::Main`; references with
/// fewer than two segments are returned unchanged.
pub fn reference_key(reference: &str) -> String {
    let parts: Vec<&str> = reference.split(PATH_SEPARATOR).collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2..].join(PATH_SEPARATOR)
    } else {
        reference.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
