//! The tag catalog: an immutable, externally supplied data set.
//!
//! A catalog holds:
//! - tag tables keyed by name (`Exif::Main`, `IPTC::ApplicationRecord`, ...)
//! - extension -> (type, description) entries
//! - type -> module and type -> MIME maps
//! - an ordered list of (type, sniff pattern) pairs
//!
//! Catalogs are built once, either from a JSON document produced offline
//! ([`TagCatalog::from_json_str`], [`TagCatalog::from_path`]) or
//! programmatically ([`TagCatalog::builder`]). They are never mutated
//! afterwards and can be shared behind an `Arc` across concurrent scans.

mod index;

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogError;
use crate::format::SniffPattern;

pub use index::{reference_key, CatalogIndex, PATH_SEPARATOR};

// =============================================================================
// TagDef
// =============================================================================

/// Definition of a single tag inside a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDef {
    /// Tag key as written in the catalog (`0x010F`, `271`, `2:25`, ...)
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Declared data format (`int16u`, `string`, ...); informational only
    #[serde(default)]
    pub format: String,

    /// Side-channel flags (writability, conditions); ignored by the scanner
    #[serde(default)]
    pub groups: BTreeMap<String, String>,

    /// Raw value -> human-readable label
    #[serde(default, rename = "values")]
    pub value_map: BTreeMap<String, String>,

    /// Reference to another table, e.g. `Image::ExifTool::Nikon::Main`
    #[serde(default, alias = "sub_ifd")]
    pub sub_directory: Option<String>,
}

impl TagDef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_value(mut self, raw: impl Into<String>, label: impl Into<String>) -> Self {
        self.value_map.insert(raw.into(), label.into());
        self
    }

    pub fn with_sub_directory(mut self, reference: impl Into<String>) -> Self {
        self.sub_directory = Some(reference.into());
        self
    }
}

// =============================================================================
// TagTable
// =============================================================================

/// A named table of tag definitions belonging to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    name: String,
    module: String,
    tags: BTreeMap<String, TagDef>,

    /// Numeric tag id -> key; hex keys take precedence over decimal keys
    numeric: HashMap<u32, String>,

    /// IPTC (record, dataset) -> key
    records: HashMap<(u8, u8), String>,
}

impl TagTable {
    fn new(name: String, module: String, tags: BTreeMap<String, TagDef>) -> Self {
        let mut numeric = HashMap::new();
        let mut records = HashMap::new();

        // Hex keys first so they win over decimal spellings of the same id
        for key in tags.keys() {
            if let Some(id) = parse_hex_key(key) {
                numeric.entry(id).or_insert_with(|| key.clone());
            }
        }
        for key in tags.keys() {
            if let Some(id) = parse_decimal_key(key) {
                numeric.entry(id).or_insert_with(|| key.clone());
            }
            if let Some(pair) = parse_record_key(key) {
                records.entry(pair).or_insert_with(|| key.clone());
            }
        }

        Self {
            name,
            module,
            tags,
            numeric,
            records,
        }
    }

    /// Table name, e.g. `Exif::Main`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module the table belongs to, e.g. `Exif`.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// All tags in key order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &TagDef)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Look up a tag by its exact catalog key.
    pub fn get(&self, key: &str) -> Option<&TagDef> {
        self.tags.get(key)
    }

    /// Look up a TIFF tag by numeric id (hex key, then decimal key).
    pub fn find_numeric(&self, id: u16) -> Option<&TagDef> {
        self.numeric
            .get(&u32::from(id))
            .and_then(|key| self.tags.get(key))
    }

    /// Look up an IPTC dataset by `record:dataset`.
    pub fn find_record(&self, record: u8, dataset: u8) -> Option<&TagDef> {
        self.records
            .get(&(record, dataset))
            .and_then(|key| self.tags.get(key))
    }
}

fn parse_hex_key(key: &str) -> Option<u32> {
    let digits = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}

fn parse_decimal_key(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn parse_record_key(key: &str) -> Option<(u8, u8)> {
    let (record, dataset) = key.split_once(':')?;
    Some((record.trim().parse().ok()?, dataset.trim().parse().ok()?))
}

// =============================================================================
// File Type Entries
// =============================================================================

/// Catalog entry for an extension or type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Type the extension maps to (may itself be an alias)
    #[serde(rename = "type")]
    pub file_type: String,

    /// Empty for pure aliases
    #[serde(default)]
    pub description: String,
}

/// One entry of the ordered sniff list.
#[derive(Debug, Clone)]
pub struct MagicEntry {
    pub file_type: String,
    pub pattern: SniffPattern,
}

// =============================================================================
// Catalog Document (serde interchange shape)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    tables: BTreeMap<String, TableDocument>,
    #[serde(default)]
    extensions: BTreeMap<String, ExtensionInfo>,
    #[serde(default)]
    modules: BTreeMap<String, String>,
    #[serde(default)]
    mime_types: BTreeMap<String, String>,
    #[serde(default)]
    magic: Vec<MagicDocument>,
}

#[derive(Debug, Deserialize)]
struct TableDocument {
    #[serde(default)]
    module: String,
    #[serde(default)]
    tags: BTreeMap<String, TagDef>,
}

#[derive(Debug, Deserialize)]
struct MagicDocument {
    #[serde(rename = "type")]
    file_type: String,
    pattern: String,
}

// =============================================================================
// TagCatalog
// =============================================================================

/// Immutable tag catalog with precomputed lookup indices.
#[derive(Debug, Clone)]
pub struct TagCatalog {
    tables: BTreeMap<String, Arc<TagTable>>,
    extensions: HashMap<String, ExtensionInfo>,
    modules: HashMap<String, String>,
    mime_types: HashMap<String, String>,
    magic: Vec<MagicEntry>,

    /// Type name -> number of extensions mapping to it
    variant_counts: HashMap<String, usize>,

    index: CatalogIndex,
}

impl TagCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Parse a catalog from its JSON interchange form.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Parse a catalog from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        Self::from_document(document)
    }

    /// Load a catalog from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let mut builder = CatalogBuilder::default();

        for (name, table) in document.tables {
            let tags = table.tags.into_iter().map(|(key, mut def)| {
                def.id = key;
                def
            });
            builder = builder.table(name, table.module, tags);
        }
        for (ext, info) in document.extensions {
            builder = builder.extension(ext, info.file_type, info.description);
        }
        for (file_type, module) in document.modules {
            builder = builder.module(file_type, module);
        }
        for (file_type, mime) in document.mime_types {
            builder = builder.mime_type(file_type, mime);
        }
        for magic in document.magic {
            builder = builder.magic(magic.file_type, magic.pattern);
        }

        builder.build()
    }

    // -------------------------------------------------------------------------
    // Tables
    // -------------------------------------------------------------------------

    /// All tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TagTable>> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TagTable>> {
        self.tables.get(name)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Resolve a sub-directory reference to a table.
    ///
    /// The reference is reduced to its last two segments, then looked up by
    /// exact name, `::` suffix and case-insensitive name, in that order.
    pub fn find_referenced_table(&self, reference: &str) -> Option<&Arc<TagTable>> {
        let key = reference_key(reference);
        let name = self
            .index
            .find_table_name(&key, |name| self.tables.contains_key(name))?;
        self.tables.get(name)
    }

    /// Tables whose module name equals `module`, ignoring case.
    pub fn tables_for_module<'a>(&'a self, module: &str) -> impl Iterator<Item = &'a Arc<TagTable>> {
        self.index
            .tables_for_module(module)
            .iter()
            .filter_map(|name| self.tables.get(name))
    }

    /// Tables whose module name contains `hint`, ignoring case.
    pub fn tables_containing_module<'a>(
        &'a self,
        hint: &str,
    ) -> impl Iterator<Item = &'a Arc<TagTable>> + 'a {
        self.index
            .tables_containing_module(hint)
            .filter_map(|name| self.tables.get(name))
    }

    // -------------------------------------------------------------------------
    // File types
    // -------------------------------------------------------------------------

    /// Extension or type entry, looked up case-insensitively.
    pub fn extension(&self, ext: &str) -> Option<&ExtensionInfo> {
        self.extensions.get(&normalize_extension(ext))
    }

    /// Module registered for a type or extension; `""` and `"0"` count as none.
    pub fn module_for(&self, file_type: &str) -> Option<&str> {
        self.modules
            .get(&normalize_extension(file_type))
            .map(String::as_str)
            .filter(|m| !m.is_empty() && *m != "0")
    }

    pub fn mime_type(&self, file_type: &str) -> Option<&str> {
        self.mime_types
            .get(&normalize_extension(file_type))
            .map(String::as_str)
    }

    /// Number of extensions whose entry maps directly to `file_type`.
    pub fn variant_count(&self, file_type: &str) -> usize {
        self.variant_counts.get(file_type).copied().unwrap_or(0)
    }

    /// Sniff patterns in priority order.
    pub fn magic(&self) -> &[MagicEntry] {
        &self.magic
    }
}

/// Upper-case an extension and strip any leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_uppercase()
}

// =============================================================================
// CatalogBuilder
// =============================================================================

/// Programmatic catalog construction.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    tables: Vec<(String, String, Vec<TagDef>)>,
    extensions: Vec<(String, ExtensionInfo)>,
    modules: Vec<(String, String)>,
    mime_types: Vec<(String, String)>,
    magic: Vec<(String, String)>,
}

impl CatalogBuilder {
    /// Add a table. Each tag's `id` is its key within the table.
    pub fn table(
        mut self,
        name: impl Into<String>,
        module: impl Into<String>,
        tags: impl IntoIterator<Item = TagDef>,
    ) -> Self {
        self.tables
            .push((name.into(), module.into(), tags.into_iter().collect()));
        self
    }

    pub fn extension(
        mut self,
        ext: impl Into<String>,
        file_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.extensions.push((
            ext.into(),
            ExtensionInfo {
                file_type: file_type.into(),
                description: description.into(),
            },
        ));
        self
    }

    pub fn module(mut self, file_type: impl Into<String>, module: impl Into<String>) -> Self {
        self.modules.push((file_type.into(), module.into()));
        self
    }

    pub fn mime_type(mut self, file_type: impl Into<String>, mime: impl Into<String>) -> Self {
        self.mime_types.push((file_type.into(), mime.into()));
        self
    }

    /// Append a sniff pattern; call order is priority order.
    pub fn magic(mut self, file_type: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.magic.push((file_type.into(), pattern.into()));
        self
    }

    /// Validate tables, compile sniff patterns and build the lookup indices.
    ///
    /// # Errors
    /// - `DuplicateTag` if a table lists the same tag key twice
    pub fn build(self) -> Result<TagCatalog, CatalogError> {
        let mut tables = BTreeMap::new();
        for (name, module, defs) in self.tables {
            let mut tags = BTreeMap::new();
            for def in defs {
                if tags.contains_key(&def.id) {
                    return Err(CatalogError::DuplicateTag {
                        table: name,
                        tag_id: def.id,
                    });
                }
                tags.insert(def.id.clone(), def);
            }
            let table = TagTable::new(name.clone(), module, tags);
            tables.insert(name, Arc::new(table));
        }

        let index = CatalogIndex::build(
            tables
                .values()
                .map(|table| (table.name(), table.module())),
        );

        let extensions: HashMap<String, ExtensionInfo> = self
            .extensions
            .into_iter()
            .map(|(ext, info)| (normalize_extension(&ext), info))
            .collect();

        // One count per normalized extension
        let mut variant_counts: HashMap<String, usize> = HashMap::new();
        for info in extensions.values() {
            *variant_counts.entry(info.file_type.clone()).or_default() += 1;
        }

        let modules = self
            .modules
            .into_iter()
            .map(|(t, m)| (normalize_extension(&t), m))
            .collect();
        let mime_types = self
            .mime_types
            .into_iter()
            .map(|(t, m)| (normalize_extension(&t), m))
            .collect();

        let mut magic = Vec::with_capacity(self.magic.len());
        for (file_type, source) in self.magic {
            match SniffPattern::compile(&source) {
                Ok(pattern) => magic.push(MagicEntry { file_type, pattern }),
                Err(e) => debug!(file_type = %file_type, "skipping sniff pattern: {}", e),
            }
        }

        Ok(TagCatalog {
            tables,
            extensions,
            modules,
            mime_types,
            magic,
            variant_counts,
            index,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
