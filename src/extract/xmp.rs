//! XMP packet detection.
//!
//! XMP is RDF/XML wrapped in `<?xpacket begin=... ?>` and
//! `<?xpacket end=... ?>` processing instructions. The packet is located by
//! those markers anywhere in the buffer, and a fixed roster of simple
//! elements is pulled out by text matching. There is no XML parser here;
//! elements whose content holds markup (`rdf:Alt`, `rdf:Seq`) are skipped.

use tracing::debug;

use crate::io::find_bytes;
use crate::metadata::{Field, Value};

use super::MetadataExtractor;

/// Start of the opening processing instruction
pub const XPACKET_BEGIN: &[u8] = b"<?xpacket begin=";

/// Start of the closing processing instruction
pub const XPACKET_END: &[u8] = b"<?xpacket end=";

/// Elements extracted from a packet, with the field name each maps to.
///
/// Fields are stored as `XMP:<name>`.
pub const XMP_ROSTER: &[(&str, &str)] = &[
    ("dc:creator", "Creator"),
    ("dc:description", "Description"),
    ("dc:title", "Title"),
    ("dc:subject", "Subject"),
    ("photoshop:Credit", "Credit"),
    ("photoshop:DateCreated", "DateCreated"),
];

/// Byte range of the first packet, from the begin marker to the start of
/// the end marker.
pub fn find_packet(data: &[u8]) -> Option<(usize, usize)> {
    let begin = find_bytes(data, XPACKET_BEGIN)?;
    let end = begin + find_bytes(&data[begin..], XPACKET_END)?;
    Some((begin, end))
}

/// Text content of the first `<element>...</element>` in `packet`.
///
/// The content is trimmed; an empty element gives an empty string. Returns
/// `None` when the element is missing or unterminated, or when its content
/// contains markup.
pub fn element_text(packet: &str, element: &str) -> Option<String> {
    let open = format!("<{}>", element);
    let close = format!("</{}>", element);

    let start = packet.find(&open)? + open.len();
    let len = packet[start..].find(&close)?;
    let text = packet[start..start + len].trim();

    if text.contains('<') {
        return None;
    }
    Some(text.to_string())
}

/// Roster elements present in `packet`, as `(element, name, text)`.
pub fn extract_simple_tags(packet: &str) -> Vec<(&'static str, &'static str, String)> {
    XMP_ROSTER
        .iter()
        .filter_map(|&(element, name)| element_text(packet, element).map(|text| (element, name, text)))
        .collect()
}

impl<'a> MetadataExtractor<'a> {
    /// Find an XMP packet and record its simple elements.
    pub(super) fn scan_for_xmp(&mut self) {
        let Some((begin, end)) = find_packet(&self.data) else {
            return;
        };
        let size = end - begin;
        debug!(offset = begin, size, "found XMP packet");

        self.load_module("XMP");

        let packet = String::from_utf8_lossy(&self.data[begin..end]).into_owned();
        for (element, name, text) in extract_simple_tags(&packet) {
            self.metadata.set(
                format!("XMP:{}", name),
                Field::new("XMP", element, name, Value::from(text)),
            );
        }

        self.metadata.set(
            "XMPPacket",
            Field::new("XMP", "xpacket", "XMPPacket", Value::from(format!("[{} bytes]", size))),
        );
        self.metadata.stats_mut().blocks_found += 1;
    }
}

// =============================================================================
// Tests
// =============================================================================
