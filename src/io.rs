//! Input reading and endian helpers.
//!
//! Every input is read fully into memory once, up to a configurable cap.
//! The scan engine then works on an immutable [`Bytes`] buffer.

use std::io::Read;

use bytes::Bytes;
use tracing::warn;

use crate::config::{ExtractOptions, OversizePolicy};
use crate::error::ExtractError;

// =============================================================================
// Capped Reading
// =============================================================================

/// Read an input stream into memory, honoring the configured read cap.
///
/// At most `max_read_bytes + 1` bytes are pulled from the reader so an
/// oversized input can be detected without reading all of it.
///
/// # Errors
/// - `Io` if the reader fails
/// - `InputTooLarge` if the input exceeds the cap and the policy is `Reject`
pub fn read_input<R: Read>(reader: R, options: &ExtractOptions) -> Result<Bytes, ExtractError> {
    let limit = options.max_read_bytes;
    let mut data = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut data)?;

    if data.len() > limit {
        match options.oversize {
            OversizePolicy::Truncate => {
                warn!(limit, "input exceeds read cap, truncating");
                data.truncate(limit);
            }
            OversizePolicy::Reject => {
                return Err(ExtractError::InputTooLarge {
                    limit,
                    actual: data.len(),
                });
            }
        }
    }

    Ok(Bytes::from(data))
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF blocks can be either byte order; JPEG, PNG and IPTC lengths are
// always big-endian.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a big-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a big-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

// =============================================================================
// Text Decoding
// =============================================================================

/// Decode ISO-8859-1 bytes; every byte maps to the code point of its value.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decode text stored without a declared charset.
///
/// Valid UTF-8 is taken as is. Anything else is read as Latin-1, so no
/// byte is replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => latin1(bytes),
    }
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
