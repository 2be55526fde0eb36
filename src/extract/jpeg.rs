//! JPEG marker segment walking.
//!
//! A JPEG stream is a sequence of marker segments:
//! ```text
//! FF <marker> <length: u16 BE, includes itself> <payload>
//! ```
//! Metadata lives in segments before the first SOS (Start Of Scan); image
//! data follows SOS, so the walk stops there.
//!
//! Segments of interest:
//! - APP1 with an `Exif\0\0` payload: a TIFF block at payload + 6
//! - APP13 with a `Photoshop 3.0\0` payload: image resources holding IPTC
//! - COM: a free-text comment

use tracing::debug;

use crate::io::{decode_text, read_u16_be};
use crate::metadata::{Field, Value};

use super::MetadataExtractor;

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// Start Of Scan marker byte
pub const SOS: u8 = 0xDA;

/// Application segment 1 (Exif, XMP)
pub const APP1: u8 = 0xE1;

/// Application segment 13 (Photoshop image resources)
pub const APP13: u8 = 0xED;

/// Comment
pub const COM: u8 = 0xFE;

/// Restart markers RST0-RST7 and SOI, which carry no length
const STANDALONE_MARKERS: std::ops::RangeInclusive<u8> = 0xD0..=0xD8;

/// Payload prefix of an Exif APP1 segment
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Payload prefix of a Photoshop APP13 segment
pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";

/// IPTC-IIM tag marker
const IPTC_MARKER: u8 = 0x1C;

pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() > 2 && data.starts_with(&SOI)
}

// =============================================================================
// Segment Iterator
// =============================================================================

/// A marker segment and its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub marker: u8,

    /// Absolute offset of the payload in the buffer
    pub offset: usize,

    pub payload: &'a [u8],
}

/// Iterates marker segments from just after SOI up to SOS.
///
/// Stops at the first truncated or malformed segment.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Segments<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: SOI.len(),
            done: false,
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let data = self.data;

        while !self.done && self.pos + 4 < data.len() {
            if data[self.pos] != 0xFF {
                self.pos += 1;
                continue;
            }

            let marker = data[self.pos + 1];
            if marker == 0xFF {
                // Fill byte; the next 0xFF may start the marker
                self.pos += 1;
                continue;
            }
            self.pos += 2;

            if marker == 0x00 || marker == 0x01 || STANDALONE_MARKERS.contains(&marker) {
                continue;
            }
            if marker == SOS {
                break;
            }

            let Some(len_bytes) = data.get(self.pos..self.pos + 2) else {
                break;
            };
            let seg_len = read_u16_be(len_bytes) as usize;
            if seg_len < 2 {
                break;
            }
            let start = self.pos + 2;
            let end = start + seg_len - 2;
            if end > data.len() {
                break;
            }

            self.pos = end;
            return Some(Segment {
                marker,
                offset: start,
                payload: &data[start..end],
            });
        }

        self.done = true;
        None
    }
}

// =============================================================================
// Segment Scanning
// =============================================================================

impl<'a> MetadataExtractor<'a> {
    /// Walk the JPEG segments and decode the metadata ones.
    pub(super) fn scan_jpeg_segments(&mut self) {
        let data = self.data.clone();

        for segment in Segments::new(&data) {
            let payload = segment.payload;
            match segment.marker {
                APP1 if payload.starts_with(EXIF_HEADER) => {
                    debug!(offset = segment.offset, "APP1/Exif segment");
                    let start = segment.offset + EXIF_HEADER.len();
                    self.decode_tiff(start, segment.offset + payload.len());
                }
                APP13 if payload.starts_with(PHOTOSHOP_HEADER) => {
                    debug!(offset = segment.offset, "APP13/Photoshop segment");
                    self.load_module("Photoshop");

                    let search_end = payload.len().saturating_sub(5);
                    let marker = (PHOTOSHOP_HEADER.len()..search_end).find(|&i| payload[i] == IPTC_MARKER);
                    if let Some(i) = marker {
                        self.load_module("IPTC");
                        self.decode_iptc(segment.offset + i, segment.offset + payload.len());
                    }
                }
                COM => {
                    let comment = decode_text(payload);
                    let comment = comment.trim();
                    if !comment.is_empty() {
                        self.metadata.set(
                            "Comment",
                            Field::new("JPEG", "COM", "Comment", Value::from(comment)),
                        );
                        self.metadata.stats_mut().blocks_found += 1;
                    }
                }
                _ => {}
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
