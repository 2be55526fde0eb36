//! PNG chunk walking.
//!
//! After the 8-byte signature a PNG file is a sequence of chunks:
//! ```text
//! length: u32 BE | type: 4 ASCII bytes | data: length bytes | CRC: u32
//! ```
//!
//! Text lives in `tEXt` (Latin-1), `zTXt` (deflate-compressed) and `iTXt`
//! (UTF-8, optionally compressed) chunks; `eXIf` carries a TIFF block.
//! Compressed text is not inflated; it is reported by size.

use tracing::debug;

use crate::io::{latin1, read_u32_be};
use crate::metadata::{Field, Value};

use super::MetadataExtractor;

// =============================================================================
// Constants
// =============================================================================

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Length, type and CRC fields around each chunk's data
const CHUNK_OVERHEAD: usize = 12;

pub fn is_png(data: &[u8]) -> bool {
    data.len() > PNG_SIGNATURE.len() && data.starts_with(&PNG_SIGNATURE)
}

// =============================================================================
// Chunk Iterator
// =============================================================================

/// One PNG chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],

    /// Absolute offset of the chunk data in the buffer
    pub offset: usize,

    pub data: &'a [u8],
}

impl Chunk<'_> {
    pub fn kind_str(&self) -> &str {
        std::str::from_utf8(&self.kind).unwrap_or("????")
    }
}

/// Iterates chunks after the signature, through `IEND`.
///
/// Stops at the first chunk whose declared length runs past the buffer.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: PNG_SIGNATURE.len(),
            done: false,
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let data = self.data;
        if self.done || self.pos + CHUNK_OVERHEAD > data.len() {
            self.done = true;
            return None;
        }

        let len = read_u32_be(&data[self.pos..]) as usize;
        let start = self.pos + 8;
        let end = match start.checked_add(len) {
            Some(end) if end + 4 <= data.len() => end,
            _ => {
                self.done = true;
                return None;
            }
        };

        let kind = [data[self.pos + 4], data[self.pos + 5], data[self.pos + 6], data[self.pos + 7]];
        self.pos = end + 4;
        if &kind == b"IEND" {
            self.done = true;
        }

        Some(Chunk {
            kind,
            offset: start,
            data: &data[start..end],
        })
    }
}

// =============================================================================
// Text Chunks
// =============================================================================

/// Keyword and text of a `tEXt`, `zTXt` or `iTXt` chunk.
///
/// Returns `None` for other chunk types and for chunks without a keyword.
pub fn parse_text_chunk(kind: &[u8; 4], data: &[u8]) -> Option<(String, String)> {
    let nul = data.iter().position(|&b| b == 0)?;
    if nul == 0 {
        return None;
    }
    let keyword = latin1(&data[..nul]);
    let rest = &data[nul + 1..];

    let text = match kind {
        b"tEXt" => latin1(rest),
        // Compression method byte, then the deflate stream
        b"zTXt" => compressed(rest.len().saturating_sub(1)),
        b"iTXt" => {
            let (&flag, rest) = rest.split_first()?;
            let (_method, rest) = rest.split_first()?;
            let lang_end = rest.iter().position(|&b| b == 0)?;
            let rest = &rest[lang_end + 1..];
            let translated_end = rest.iter().position(|&b| b == 0)?;
            let text = &rest[translated_end + 1..];
            if flag == 1 {
                compressed(text.len())
            } else {
                String::from_utf8_lossy(text).into_owned()
            }
        }
        _ => return None,
    };

    Some((keyword, text))
}

fn compressed(len: usize) -> String {
    format!("[compressed, {} bytes]", len)
}

// =============================================================================
// Chunk Scanning
// =============================================================================

impl<'a> MetadataExtractor<'a> {
    /// Walk the PNG chunks and decode text and Exif chunks.
    pub(super) fn scan_png_chunks(&mut self) {
        let data = self.data.clone();

        for chunk in Chunks::new(&data) {
            match &chunk.kind {
                b"eXIf" => {
                    debug!(offset = chunk.offset, "eXIf chunk");
                    self.decode_tiff(chunk.offset, chunk.offset + chunk.data.len());
                }
                kind @ (b"tEXt" | b"zTXt" | b"iTXt") => {
                    let Some((keyword, text)) = parse_text_chunk(kind, chunk.data) else {
                        continue;
                    };
                    debug!(offset = chunk.offset, chunk = chunk.kind_str(), keyword = %keyword, "text chunk");
                    let field = Field::new("PNG", chunk.kind_str(), keyword.as_str(), Value::from(text));
                    self.metadata.insert_unique(&keyword, field, chunk.offset);
                    self.metadata.stats_mut().blocks_found += 1;
                }
                _ => {}
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
