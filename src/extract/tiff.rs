//! TIFF header and IFD chain decoding.
//!
//! TIFF blocks appear as whole files (TIFF, most camera RAW formats) and
//! embedded in other containers (JPEG APP1 Exif, PNG eXIf). All offsets
//! inside a block are relative to the block's first byte.
//!
//! # TIFF Header Structure
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Magic (42)
//! Bytes 4-7: Offset to first IFD
//! ```
//!
//! # IFD Structure
//! ```text
//! 2 bytes          entry count N
//! N * 12 bytes     entries: tag u16, type u16, count u32, value/offset u32
//! 4 bytes          offset of the next IFD (0 = end of chain)
//! ```

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace};

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};
use crate::metadata::Field;

use super::values::{decode_value, FieldType};
use super::MetadataExtractor;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Magic number following the byte-order marker
const TIFF_MAGIC: u16 = 42;

/// Size of the TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one IFD entry in bytes
pub const IFD_ENTRY_SIZE: usize = 12;

/// Little-endian header prefix
pub const TIFF_MARKER_LE: [u8; 4] = [b'I', b'I', 0x2A, 0x00];

/// Big-endian header prefix
pub const TIFF_MARKER_BE: [u8; 4] = [b'M', b'M', 0x00, 0x2A];

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// Offset of the first IFD, relative to the block start
    pub first_ifd_offset: u32,
}

impl TiffHeader {
    /// Parse a TIFF header from the start of a block.
    ///
    /// # Errors
    /// - `TooSmall` if the block is shorter than 8 bytes
    /// - `InvalidByteOrder` if bytes 0-1 are not II or MM
    /// - `InvalidMagic` if the magic is not 42
    /// - `InvalidIfdOffset` if the first IFD lies outside the block
    pub fn parse(block: &[u8]) -> Result<Self, TiffError> {
        if block.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::TooSmall {
                required: TIFF_HEADER_SIZE,
                actual: block.len(),
            });
        }

        // Read as little-endian; we are matching fixed byte patterns
        let marker = u16::from_le_bytes([block[0], block[1]]);
        let byte_order = match marker {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidByteOrder(marker)),
        };

        let magic = byte_order.read_u16(&block[2..4]);
        if magic != TIFF_MAGIC {
            return Err(TiffError::InvalidMagic(magic));
        }

        let first_ifd_offset = byte_order.read_u32(&block[4..8]);
        if first_ifd_offset as usize >= block.len() {
            return Err(TiffError::InvalidIfdOffset(u64::from(first_ifd_offset)));
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }
}

/// True if `bytes` starts with either TIFF header prefix.
pub fn has_tiff_marker(bytes: &[u8]) -> bool {
    bytes.starts_with(&TIFF_MARKER_LE) || bytes.starts_with(&TIFF_MARKER_BE)
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One 12-byte IFD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,

    /// Declared type as stored; kept for unknown types
    pub field_type_raw: u16,

    /// `None` for unknown types
    pub field_type: Option<FieldType>,

    pub count: u32,

    /// Inline value or offset, as raw bytes in block byte order
    pub value_offset_bytes: [u8; 4],
}

impl IfdEntry {
    /// Parse an entry from exactly [`IFD_ENTRY_SIZE`] bytes.
    pub fn parse(bytes: &[u8], byte_order: ByteOrder) -> Self {
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        Self {
            tag: byte_order.read_u16(&bytes[0..2]),
            field_type_raw,
            field_type: FieldType::from_u16(field_type_raw),
            count: byte_order.read_u32(&bytes[4..8]),
            value_offset_bytes: [bytes[8], bytes[9], bytes[10], bytes[11]],
        }
    }

    /// Total value size in bytes, if the type is known.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * u64::from(self.count))
    }

    /// The value's bytes: inline when they fit, otherwise at the offset.
    ///
    /// Returns `None` for unknown types and out-of-range offsets.
    pub fn value_bytes<'b>(&'b self, block: &'b [u8], byte_order: ByteOrder) -> Option<&'b [u8]> {
        let size = usize::try_from(self.value_byte_size()?).ok()?;
        if size <= FieldType::INLINE_THRESHOLD {
            return Some(&self.value_offset_bytes[..size]);
        }

        let offset = byte_order.read_u32(&self.value_offset_bytes) as usize;
        let end = offset.checked_add(size)?;
        block.get(offset..end)
    }

    /// The value field read as a u32 offset.
    pub fn offset(&self, byte_order: ByteOrder) -> u32 {
        byte_order.read_u32(&self.value_offset_bytes)
    }

    /// True for single LONG/IFD entries, the shape of a sub-IFD pointer.
    pub fn is_ifd_pointer(&self) -> bool {
        self.count == 1 && matches!(self.field_type, Some(FieldType::Long | FieldType::Ifd))
    }
}

// =============================================================================
// IFD Chain Decoding
// =============================================================================

/// An IFD waiting to be decoded.
struct PendingIfd {
    offset: u32,

    /// Table consulted first for this IFD's entries
    preferred: Option<String>,
}

impl<'a> MetadataExtractor<'a> {
    /// Scan the whole buffer for TIFF byte-order markers.
    pub(super) fn scan_tiff_headers(&mut self) {
        let data = self.data.clone();
        let limit = data.len().saturating_sub(TIFF_HEADER_SIZE);
        for i in 0..limit {
            if has_tiff_marker(&data[i..]) {
                debug!(offset = i, "found TIFF header");
                self.decode_tiff(i, data.len());
            }
        }
    }

    /// Decode the TIFF block spanning `start..end` of the buffer.
    ///
    /// Each block is decoded at most once per scan. Returns true when at
    /// least one field was decoded.
    pub(super) fn decode_tiff(&mut self, start: usize, end: usize) -> bool {
        if start >= end || end > self.data.len() || !self.tiff_seen.insert(start) {
            return false;
        }

        let data = self.data.clone();
        let block = &data[start..end];

        let header = match TiffHeader::parse(block) {
            Ok(header) => header,
            Err(e) => {
                debug!(offset = start, "skipping TIFF block: {}", e);
                return false;
            }
        };
        let bo = header.byte_order;
        debug!(offset = start, byte_order = ?bo, first_ifd = header.first_ifd_offset, "decoding TIFF block");

        if !self.tables.has_module_containing("Exif") {
            self.load_module("Exif");
        }

        let mut queue = VecDeque::from([PendingIfd {
            offset: header.first_ifd_offset,
            preferred: None,
        }]);
        let mut visited: HashSet<u32> = HashSet::new();
        let mut decoded = 0;
        let mut ifd_count = 0;

        while let Some(pending) = queue.pop_front() {
            if ifd_count >= self.options.max_ifds {
                debug!(offset = start, max_ifds = self.options.max_ifds, "IFD limit reached");
                break;
            }
            let ifd_offset = pending.offset as usize;
            if pending.offset == 0 || !visited.insert(pending.offset) {
                continue;
            }
            if ifd_offset + 2 > block.len() {
                debug!("{}", TiffError::InvalidIfdOffset(u64::from(pending.offset)));
                continue;
            }
            ifd_count += 1;

            let entry_count = bo.read_u16(&block[ifd_offset..]) as usize;
            trace!(ifd = ifd_count - 1, entries = entry_count, offset = ifd_offset, "reading IFD");

            let mut entry_offset = ifd_offset + 2;
            for _ in 0..entry_count {
                let Some(raw) = block.get(entry_offset..entry_offset + IFD_ENTRY_SIZE) else {
                    break;
                };
                let entry = IfdEntry::parse(raw, bo);
                let absolute = start + entry_offset;
                entry_offset += IFD_ENTRY_SIZE;

                let Some((table, def)) = self.tables.find_numeric(entry.tag, pending.preferred.as_deref())
                else {
                    trace!(tag = entry.tag, "unresolved tag");
                    self.metadata.stats_mut().skipped_tags += 1;
                    continue;
                };

                if let Some(reference) = def.sub_directory.as_deref() {
                    let target = entry.offset(bo);
                    if entry.is_ifd_pointer() && target > 0 && (target as usize) < block.len() {
                        let preferred = self
                            .resolver
                            .catalog()
                            .find_referenced_table(reference)
                            .map(|t| t.name().to_string());
                        trace!(tag = entry.tag, target, reference, "queueing sub-IFD");
                        queue.push_back(PendingIfd {
                            offset: target,
                            preferred,
                        });
                    }
                }

                let Some(mut value) = decode_value(block, &entry, bo) else {
                    trace!(tag = entry.tag, field_type = entry.field_type_raw, "no value");
                    continue;
                };
                if let Some(label) = value
                    .value_map_key()
                    .and_then(|key| def.value_map.get(&key))
                {
                    value = label.as_str().into();
                }

                let name = if def.name.is_empty() {
                    format!("Tag_{:04X}", entry.tag)
                } else {
                    def.name.clone()
                };
                let field = Field::new(table.name(), def.id.as_str(), name.as_str(), value)
                    .with_description(def.description.as_str());

                self.metadata.insert_unique(&name, field, absolute);
                self.metadata.stats_mut().tiff_fields += 1;
                decoded += 1;
            }

            let next_at = ifd_offset + 2 + entry_count * IFD_ENTRY_SIZE;
            if let Some(next) = block.get(next_at..next_at + 4) {
                queue.push_back(PendingIfd {
                    offset: bo.read_u32(next),
                    preferred: pending.preferred.clone(),
                });
            }
        }

        if decoded > 0 {
            self.metadata.stats_mut().blocks_found += 1;
        }
        debug!(offset = start, decoded, ifds = ifd_count, "TIFF block done");
        decoded > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
