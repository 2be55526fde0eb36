//! Tag-table selection and expansion.
//!
//! A [`TableSet`] is the working set of tag tables for one scan. It only
//! ever grows, and its insertion order is the lookup priority: the first
//! table that defines a tag wins.
//!
//! [`TableResolver`] builds the initial set for an identified format and
//! expands it by following sub-directory references. The scan engine calls
//! [`TableResolver::load_for_discovered_type`] when it finds a metadata
//! family the initial selection did not anticipate.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{TagCatalog, TagDef, TagTable};
use crate::format::FileType;

/// Maximum number of expansion passes; bounds reference cycles.
pub const MAX_EXPANSION_DEPTH: usize = 5;

/// Camera makers recognized in format descriptions.
const MANUFACTURERS: &[&str] = &[
    "Nikon",
    "Canon",
    "Sony",
    "Olympus",
    "Pentax",
    "Panasonic",
    "FujiFilm",
    "Kodak",
    "Minolta",
    "Samsung",
];

/// Suffix of the companion module for per-module settings tables.
const SETTINGS_SUFFIX: &str = "Settings";

// =============================================================================
// TableSet
// =============================================================================

/// Ordered, deduplicated set of tag tables owned by a single scan.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: Vec<Arc<TagTable>>,
    names: HashSet<String>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table. Returns false if a table of that name is already present.
    pub fn insert(&mut self, table: Arc<TagTable>) -> bool {
        if !self.names.insert(table.name().to_string()) {
            return false;
        }
        self.tables.push(table);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TagTable>> {
        self.tables.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name())
    }

    /// True when some table's module name contains `hint`, ignoring case.
    pub fn has_module_containing(&self, hint: &str) -> bool {
        let hint = hint.to_uppercase();
        self.tables
            .iter()
            .any(|t| t.module().to_uppercase().contains(&hint))
    }

    /// Resolve a TIFF tag id across the set.
    ///
    /// `preferred` names a table to consult before the priority order, used
    /// for entries of a sub-IFD reached through a reference.
    pub fn find_numeric(&self, id: u16, preferred: Option<&str>) -> Option<(&TagTable, &TagDef)> {
        if let Some(table) = preferred.and_then(|name| self.get(name)) {
            if let Some(def) = table.find_numeric(id) {
                return Some((table, def));
            }
        }

        self.tables
            .iter()
            .find_map(|t| t.find_numeric(id).map(|def| (t.as_ref(), def)))
    }

    /// Resolve an IPTC dataset, searching only IPTC-module tables.
    pub fn find_record(&self, record: u8, dataset: u8) -> Option<(&TagTable, &TagDef)> {
        self.tables
            .iter()
            .filter(|t| t.module().to_uppercase().contains("IPTC"))
            .find_map(|t| t.find_record(record, dataset).map(|def| (t.as_ref(), def)))
    }

    fn get(&self, name: &str) -> Option<&TagTable> {
        if !self.contains(name) {
            return None;
        }
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .map(Arc::as_ref)
    }
}

// =============================================================================
// TableResolver
// =============================================================================

/// Selects and expands tag tables from a catalog.
#[derive(Debug, Clone, Copy)]
pub struct TableResolver<'a> {
    catalog: &'a TagCatalog,
}

impl<'a> TableResolver<'a> {
    pub fn new(catalog: &'a TagCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a TagCatalog {
        self.catalog
    }

    /// Initial selection followed by expansion.
    pub fn select_and_expand(&self, file_type: &FileType) -> TableSet {
        let mut set = self.select_initial(file_type);
        let added = self.expand(&mut set);
        debug!(
            format = %file_type.format,
            tables = set.len(),
            via_references = added,
            "selected tag tables"
        );
        set
    }

    /// Tables for the format, its module and any related modules.
    ///
    /// Modules are tried in this order, each matched case-insensitively:
    /// 1. the resolved module, then the format name
    /// 2. the extension's module and its `Settings` companion
    /// 3. a camera maker named in the description, and its `Settings` companion
    /// 4. `Exif` for TIFF-based formats
    pub fn select_initial(&self, file_type: &FileType) -> TableSet {
        let mut modules: Vec<String> = Vec::new();
        let mut push = |module: &str| {
            if !module.is_empty() && !modules.iter().any(|m| m.eq_ignore_ascii_case(module)) {
                modules.push(module.to_string());
            }
        };

        push(file_type.module.as_str());
        push(file_type.format.as_str());

        if !file_type.extension.is_empty() {
            if let Some(module) = self.catalog.module_for(&file_type.extension) {
                push(module);
                push(format!("{}{}", module, SETTINGS_SUFFIX).as_str());
            }
        }

        if let Some(maker) = MANUFACTURERS
            .iter()
            .find(|maker| file_type.description.contains(*maker))
        {
            push(*maker);
            push(format!("{}{}", maker, SETTINGS_SUFFIX).as_str());
        }

        if file_type.format == "TIFF" || file_type.description.contains("TIFF") {
            push("Exif");
        }

        let mut set = TableSet::new();
        for module in &modules {
            for table in self.catalog.tables_for_module(module) {
                if set.insert(Arc::clone(table)) {
                    debug!(table = table.name(), module = %module, "loaded base table");
                }
            }
        }
        set
    }

    /// Follow sub-directory references until a pass adds nothing or the
    /// depth bound is reached. Returns the number of tables added.
    pub fn expand(&self, set: &mut TableSet) -> usize {
        let mut added = 0;

        for _ in 0..MAX_EXPANSION_DEPTH {
            let mut pending: Vec<Arc<TagTable>> = Vec::new();

            for table in set.iter() {
                for (_, def) in table.tags() {
                    let Some(reference) = def.sub_directory.as_deref() else {
                        continue;
                    };
                    let Some(target) = self.catalog.find_referenced_table(reference) else {
                        continue;
                    };
                    if set.contains(target.name()) || pending.iter().any(|t| t.name() == target.name()) {
                        continue;
                    }
                    debug!(reference, table = target.name(), "following sub-directory");
                    pending.push(Arc::clone(target));
                }
            }

            if pending.is_empty() {
                break;
            }
            for table in pending {
                if set.insert(table) {
                    added += 1;
                }
            }
        }

        added
    }

    /// Load tables for a metadata family discovered mid-scan.
    ///
    /// Adds every table whose module name contains `module_hint` (ignoring
    /// case), then re-runs expansion. Returns the number of tables added.
    pub fn load_for_discovered_type(&self, module_hint: &str, set: &mut TableSet) -> usize {
        let mut loaded = 0;
        for table in self.catalog.tables_containing_module(module_hint) {
            if set.insert(Arc::clone(table)) {
                debug!(table = table.name(), hint = module_hint, "loaded table for discovered metadata");
                loaded += 1;
            }
        }

        if loaded > 0 {
            loaded += self.expand(set);
        }
        loaded
    }
}

// =============================================================================
// Tests
// =============================================================================
