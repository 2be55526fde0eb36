//! TIFF field types and typed value decoding.
//!
//! Every IFD entry declares a field type and a count. The type fixes the
//! element size; `size * count <= 4` means the value is stored inline in
//! the entry, otherwise the entry holds an offset into the TIFF block.
//!
//! # Decode Rules
//!
//! | Type                 | Size | Value                                  |
//! |----------------------|------|----------------------------------------|
//! | BYTE                 | 1    | integer, or raw bytes when count > 1  |
//! | ASCII                | 1    | string up to the first NUL             |
//! | UNDEFINED            | 1    | raw bytes                              |
//! | SBYTE/SHORT/SSHORT   | 1/2  | integer                                |
//! | LONG/SLONG/IFD       | 4    | integer                                |
//! | RATIONAL/SRATIONAL   | 8    | integer, `"num/den"` or `"inf"`        |
//! | FLOAT/DOUBLE         | 4/8  | float                                  |
//! | LONG8/SLONG8/IFD8    | 8    | integer                                |
//!
//! A count of 1 gives a scalar; any other count gives a list with exactly
//! `count` elements.

use crate::io::decode_text;
use crate::metadata::Value;

use super::tiff::{ByteOrder, IfdEntry};

// =============================================================================
// Field Types
// =============================================================================

/// TIFF field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
    Long8 = 16,
    SLong8 = 17,
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Byte => "BYTE",
            FieldType::Ascii => "ASCII",
            FieldType::Short => "SHORT",
            FieldType::Long => "LONG",
            FieldType::Rational => "RATIONAL",
            FieldType::SByte => "SBYTE",
            FieldType::Undefined => "UNDEFINED",
            FieldType::SShort => "SSHORT",
            FieldType::SLong => "SLONG",
            FieldType::SRational => "SRATIONAL",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Ifd => "IFD",
            FieldType::Long8 => "LONG8",
            FieldType::SLong8 => "SLONG8",
            FieldType::Ifd8 => "IFD8",
        }
    }

    /// Maximum bytes stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Check if `count` values of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u32) -> bool {
        (self.size_in_bytes() as u64) * u64::from(count) <= Self::INLINE_THRESHOLD as u64
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Decode an entry's value.
///
/// # Arguments
/// * `block` - The whole TIFF block; offsets are relative to its start
/// * `entry` - The parsed IFD entry
/// * `byte_order` - Byte order declared by the block's header
///
/// # Returns
/// `None` for unknown field types and for out-of-range value offsets.
pub fn decode_value(block: &[u8], entry: &IfdEntry, byte_order: ByteOrder) -> Option<Value> {
    let field_type = entry.field_type?;
    let bytes = entry.value_bytes(block, byte_order)?;
    Some(decode_typed(bytes, field_type, entry.count as usize, byte_order))
}

/// Decode `count` elements of `field_type` from `bytes`.
///
/// `bytes` must hold at least `count * size_in_bytes()` bytes.
pub fn decode_typed(bytes: &[u8], field_type: FieldType, count: usize, bo: ByteOrder) -> Value {
    let size = field_type.size_in_bytes();

    match field_type {
        FieldType::Ascii => Value::Text(decode_ascii(&bytes[..count])),
        FieldType::Undefined => Value::Bytes(bytes[..count].to_vec()),
        FieldType::Byte if count != 1 => Value::Bytes(bytes[..count].to_vec()),
        _ => {
            let element = |i: usize| decode_element(&bytes[i * size..(i + 1) * size], field_type, bo);
            if count == 1 {
                element(0)
            } else {
                Value::List((0..count).map(element).collect())
            }
        }
    }
}

/// Decode a single numeric element.
fn decode_element(bytes: &[u8], field_type: FieldType, bo: ByteOrder) -> Value {
    match field_type {
        FieldType::Byte | FieldType::Ascii | FieldType::Undefined => Value::Int(i64::from(bytes[0])),
        FieldType::SByte => Value::Int(i64::from(bytes[0] as i8)),
        FieldType::Short => Value::Int(i64::from(bo.read_u16(bytes))),
        FieldType::SShort => Value::Int(i64::from(bo.read_u16(bytes) as i16)),
        FieldType::Long | FieldType::Ifd => Value::Int(i64::from(bo.read_u32(bytes))),
        FieldType::SLong => Value::Int(i64::from(bo.read_u32(bytes) as i32)),
        FieldType::Rational => rational(
            i64::from(bo.read_u32(&bytes[0..4])),
            i64::from(bo.read_u32(&bytes[4..8])),
        ),
        FieldType::SRational => rational(
            i64::from(bo.read_u32(&bytes[0..4]) as i32),
            i64::from(bo.read_u32(&bytes[4..8]) as i32),
        ),
        FieldType::Float => Value::Float(f64::from(f32::from_bits(bo.read_u32(bytes)))),
        FieldType::Double => Value::Float(f64::from_bits(bo.read_u64(bytes))),
        FieldType::Long8 | FieldType::Ifd8 => Value::from_u64(bo.read_u64(bytes)),
        FieldType::SLong8 => Value::Int(bo.read_u64(bytes) as i64),
    }
}

/// Integer when the division is exact, `"num/den"` otherwise, `"inf"` for a
/// zero denominator.
pub fn rational(num: i64, den: i64) -> Value {
    if den == 0 {
        Value::Text("inf".to_string())
    } else if num % den == 0 {
        Value::Int(num / den)
    } else {
        Value::Text(format!("{}/{}", num, den))
    }
}

fn decode_ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    decode_text(&bytes[..end])
}

// =============================================================================
// Tests
// =============================================================================
