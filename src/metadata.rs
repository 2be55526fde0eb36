//! The extracted property bag.
//!
//! [`Metadata`] maps field keys to decoded [`Field`]s. Fields come from
//! three places: bookkeeping keys written before the scan (`FileType`,
//! `FileTypeDescription`, `MIMEType`), tag-table hits (TIFF entries, IPTC
//! datasets), and fixed-key text (JPEG comments, PNG text chunks, XMP).
//!
//! # Collisions
//!
//! A TIFF or PNG field whose key is already taken is stored under
//! `<key>_<offset>`, using the byte offset of its source entry. Repeated
//! IPTC datasets accumulate instead: the first occurrence is a scalar, later
//! ones turn the field into an ordered list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::RenderError;

// =============================================================================
// Value
// =============================================================================

/// A decoded metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    /// Raw bytes, rendered as a hex string
    Bytes(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// Integer value for an unsigned 64-bit quantity; falls back to text
    /// above `i64::MAX`.
    pub fn from_u64(v: u64) -> Self {
        i64::try_from(v)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(v.to_string()))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Key used to look the value up in a tag's value map.
    ///
    /// Only integers and strings have one.
    pub fn value_map_key(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&hex::encode(b)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

// =============================================================================
// Field
// =============================================================================

/// One extracted field and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Source table (`Exif::Main`) or block kind (`File`, `PNG`, `XMP`)
    pub table: String,

    /// Tag key within the source (`0x010F`, `2:25`, `tEXt`)
    pub tag_id: String,

    pub name: String,

    pub value: Value,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Field {
    pub fn new(
        table: impl Into<String>,
        tag_id: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            table: table.into(),
            tag_id: tag_id.into(),
            name: name.into(),
            value,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A rendered field: its key in the bag plus the field itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<'a> {
    pub key: &'a str,
    #[serde(flatten)]
    pub field: &'a Field,
}

// =============================================================================
// ScanStats
// =============================================================================

/// Counters collected during one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Metadata blocks decoded (TIFF, IPTC, XMP, JPEG/PNG text)
    pub blocks_found: usize,

    /// TIFF entries decoded into fields
    pub tiff_fields: usize,

    /// TIFF entries whose tag id no table resolved
    pub skipped_tags: usize,

    /// Tables added to the working set mid-scan
    pub tables_loaded: usize,

    /// Container structure noticed but not parsed (ZIP, PDF, QuickTime)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

// =============================================================================
// Metadata
// =============================================================================

/// The property bag produced by one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    format: String,
    size: usize,
    fields: BTreeMap<String, Field>,
    stats: ScanStats,
}

#[derive(Serialize)]
struct Report<'a> {
    file: &'a str,
    format: &'a str,
    size: usize,
    metadata: Vec<Record<'a>>,
}

impl Metadata {
    pub fn new(format: impl Into<String>, size: usize) -> Self {
        Self {
            format: format.into(),
            size,
            ..Self::default()
        }
    }

    /// Identified format of the scanned input.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Number of bytes scanned.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Shorthand for the value of a field.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).map(|f| &f.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ScanStats {
        &mut self.stats
    }

    /// Store a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, field: Field) {
        self.fields.insert(key.into(), field);
    }

    /// Store a field, suffixing the key with `offset` if it is taken.
    ///
    /// Returns the key the field was stored under.
    pub fn insert_unique(&mut self, key: &str, field: Field, offset: usize) -> String {
        let key = if self.fields.contains_key(key) {
            format!("{}_{}", key, offset)
        } else {
            key.to_string()
        };
        self.fields.insert(key.clone(), field);
        key
    }

    /// Store a field, turning repeats of the key into an ordered list.
    pub fn accumulate(&mut self, key: &str, field: Field) {
        match self.fields.get_mut(key) {
            Some(existing) => {
                let previous = std::mem::replace(&mut existing.value, Value::List(Vec::new()));
                let mut items = match previous {
                    Value::List(items) => items,
                    scalar => vec![scalar],
                };
                items.push(field.value);
                existing.value = Value::List(items);
            }
            None => {
                self.fields.insert(key.to_string(), field);
            }
        }
    }

    /// Structured records in key order.
    pub fn render(&self) -> Vec<Record<'_>> {
        self.fields
            .iter()
            .map(|(key, field)| Record { key, field })
            .collect()
    }

    /// Render as a JSON document `{file, format, size, metadata}`.
    ///
    /// # Errors
    /// Returns `RenderError::Json` if serialization fails.
    pub fn to_json(&self, file: &str, pretty: bool) -> Result<String, RenderError> {
        let report = Report {
            file,
            format: &self.format,
            size: self.size,
            metadata: self.render(),
        };
        let json = if pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        Ok(json)
    }
}

// =============================================================================
// Tests
// =============================================================================
