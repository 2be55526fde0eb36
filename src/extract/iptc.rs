//! IPTC-IIM dataset decoding.
//!
//! An IPTC block is a run of datasets, each introduced by a tag marker:
//! ```text
//! 0x1C | record: u8 | dataset: u8 | length: u16 BE | value
//! ```
//! If the high bit of the length is set, its low 15 bits give the number of
//! following bytes (1-4) that hold the real length, big-endian.
//!
//! Values are decoded as text; repeated datasets (keywords, for instance)
//! accumulate into a list.

use tracing::{debug, trace};

use crate::io::{decode_text, read_u16_be};
use crate::metadata::{Field, Value};

use super::MetadataExtractor;

/// Marker byte opening every dataset
pub const IPTC_TAG_MARKER: u8 = 0x1C;

/// Marker, record, dataset and length bytes
const DATASET_HEADER_SIZE: usize = 5;

/// Highest record number a plausible block starts with
const MAX_RECORD: u8 = 0x0F;

/// Width limit of an extended length field
const MAX_EXTENDED_LENGTH_BYTES: usize = 4;

// =============================================================================
// Dataset Iterator
// =============================================================================

/// One IPTC dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset<'a> {
    pub record: u8,
    pub dataset: u8,

    /// Offset of the dataset's marker, relative to the iterated slice
    pub offset: usize,

    pub value: &'a [u8],
}

impl Dataset<'_> {
    /// `record:dataset` as used for catalog keys.
    pub fn key(&self) -> String {
        format!("{}:{}", self.record, self.dataset)
    }
}

/// Iterates datasets until the first byte that is not a tag marker, or
/// the first length that runs past the slice.
#[derive(Debug, Clone)]
pub struct Datasets<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Datasets<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Datasets<'a> {
    type Item = Dataset<'a>;

    fn next(&mut self) -> Option<Dataset<'a>> {
        let data = self.data;
        let header = data.get(self.pos..self.pos + DATASET_HEADER_SIZE)?;
        if header[0] != IPTC_TAG_MARKER {
            return None;
        }

        let offset = self.pos;
        let record = header[1];
        let dataset = header[2];
        let mut len = read_u16_be(&header[3..5]) as usize;
        let mut value_start = self.pos + DATASET_HEADER_SIZE;

        if len & 0x8000 != 0 {
            let width = len & 0x7FFF;
            if width == 0 || width > MAX_EXTENDED_LENGTH_BYTES {
                self.pos = data.len();
                return None;
            }
            let Some(bytes) = data.get(value_start..value_start + width) else {
                self.pos = data.len();
                return None;
            };
            len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
            value_start += width;
        }

        let Some(value) = value_start
            .checked_add(len)
            .and_then(|end| data.get(value_start..end))
        else {
            self.pos = data.len();
            return None;
        };

        self.pos = value_start + len;
        Some(Dataset {
            record,
            dataset,
            offset,
            value,
        })
    }
}

/// Offset of the first byte that plausibly starts an IPTC block.
///
/// A candidate is a tag marker with a record number of at most 15 whose
/// short length fits inside the buffer.
pub fn find_iptc_block(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(DATASET_HEADER_SIZE)).find(|&i| {
        data[i] == IPTC_TAG_MARKER
            && data[i + 1] <= MAX_RECORD
            && i + DATASET_HEADER_SIZE + read_u16_be(&data[i + 3..]) as usize <= data.len()
    })
}

// =============================================================================
// Block Decoding
// =============================================================================

impl<'a> MetadataExtractor<'a> {
    /// Decode the first plausible IPTC block anywhere in the buffer.
    pub(super) fn scan_for_iptc(&mut self) {
        let Some(start) = find_iptc_block(&self.data) else {
            return;
        };
        if self.iptc_seen.contains(&start) {
            return;
        }
        debug!(offset = start, "found IPTC candidate");
        self.load_module("IPTC");
        self.decode_iptc(start, self.data.len());
    }

    /// Decode the IPTC datasets in `start..end` of the buffer.
    ///
    /// Each block is decoded at most once per scan. Returns true when at
    /// least one field was decoded.
    pub(super) fn decode_iptc(&mut self, start: usize, end: usize) -> bool {
        if start >= end || end > self.data.len() || !self.iptc_seen.insert(start) {
            return false;
        }

        let data = self.data.clone();
        let mut decoded = 0;

        for ds in Datasets::new(&data[start..end]) {
            let Some((table, def)) = self.tables.find_record(ds.record, ds.dataset) else {
                trace!(record = ds.record, dataset = ds.dataset, "unresolved IPTC dataset");
                continue;
            };

            let name = if def.name.is_empty() {
                format!("IPTC_{}", ds.key())
            } else {
                def.name.clone()
            };
            let value = Value::from(decode_text(ds.value));
            let field = Field::new(table.name(), ds.key(), name.as_str(), value)
                .with_description(def.description.as_str());

            self.metadata.accumulate(&name, field);
            decoded += 1;
        }

        if decoded > 0 {
            self.metadata.stats_mut().blocks_found += 1;
        }
        debug!(offset = start, decoded, "IPTC block done");
        decoded > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
