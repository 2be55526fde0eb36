//! Test utilities for integration tests.
//!
//! Builders for synthetic TIFF, JPEG, PNG, IPTC and XMP buffers, plus a
//! small tag catalog that covers the tables those buffers exercise.

use metaprobe::{TagCatalog, TagDef};

// =============================================================================
// Sample Catalog
// =============================================================================

/// Catalog with Exif, IPTC, Photoshop, XMP, PNG, JPEG and Nikon tables.
pub fn sample_catalog() -> TagCatalog {
    TagCatalog::builder()
        .table(
            "Exif::Main",
            "Exif",
            [
                TagDef::new("0x010F", "Make").with_description("Camera make"),
                TagDef::new("0x0110", "Model"),
                TagDef::new("0x0112", "Orientation")
                    .with_value("1", "Horizontal (normal)")
                    .with_value("6", "Rotate 90 CW"),
                TagDef::new("0x011A", "XResolution"),
                TagDef::new("0x0132", "ModifyDate"),
                TagDef::new("0x8769", "ExifOffset")
                    .with_sub_directory("Image::ExifTool::Exif::SubIFD"),
            ],
        )
        .table(
            "Exif::SubIFD",
            "Exif",
            [
                TagDef::new("0x829A", "ExposureTime"),
                TagDef::new("0x9003", "DateTimeOriginal"),
            ],
        )
        .table(
            "IPTC::ApplicationRecord",
            "IPTC",
            [
                TagDef::new("2:5", "ObjectName"),
                TagDef::new("2:25", "Keywords"),
                TagDef::new("2:80", "By-line"),
                TagDef::new("2:101", ""),
            ],
        )
        .table("Photoshop::Main", "Photoshop", [TagDef::new("0x0404", "IPTCData")])
        .table("XMP::dc", "XMP", [TagDef::new("creator", "Creator")])
        .table("PNG::Main", "PNG", [TagDef::new("IHDR", "ImageHeader")])
        .table("JPEG::Main", "JPEG", [TagDef::new("COM", "Comment")])
        .table("Nikon::Main", "Nikon", [TagDef::new("0x0002", "ISO")])
        .extension("JPG", "JPEG", "JPEG image")
        .extension("JPEG", "JPEG", "JPEG image")
        .extension("JPE", "JPEG", "")
        .extension("TIF", "TIFF", "Tagged Image File Format")
        .extension("TIFF", "TIFF", "Tagged Image File Format")
        .extension("NEF", "TIFF", "Nikon (RAW) Electronic Format")
        .extension("DNG", "TIFF", "Digital Negative")
        .extension("PNG", "PNG", "Portable Network Graphics")
        .module("JPEG", "JPEG")
        .module("PNG", "PNG")
        .module("NEF", "Nikon")
        .mime_type("JPEG", "image/jpeg")
        .mime_type("TIFF", "image/tiff")
        .mime_type("PNG", "image/png")
        .magic("JPEG", r"\xff\xd8\xff")
        .magic("TIFF", r"(II\x2a\x00|MM\x00\x2a)")
        .magic("PNG", r"\x89PNG\r\n\x1a\n")
        .build()
        .unwrap()
}

/// The same kind of catalog in its JSON interchange form.
pub const SAMPLE_CATALOG_JSON: &str = r#"{
    "tables": {
        "Exif::Main": {
            "module": "Exif",
            "tags": {
                "0x010F": { "name": "Make", "description": "Camera make" },
                "0x0112": { "name": "Orientation", "values": { "1": "Horizontal (normal)" } }
            }
        },
        "IPTC::ApplicationRecord": {
            "module": "IPTC",
            "tags": { "2:25": { "name": "Keywords" } }
        }
    },
    "extensions": {
        "JPG": { "type": "JPEG", "description": "JPEG image" },
        "TIF": { "type": "TIFF", "description": "Tagged Image File Format" }
    },
    "modules": { "JPEG": "JPEG" },
    "mime_types": { "JPEG": "image/jpeg", "TIFF": "image/tiff" },
    "magic": [
        { "type": "JPEG", "pattern": "\\xff\\xd8\\xff" },
        { "type": "TIFF", "pattern": "(II\\x2a\\x00|MM\\x00\\x2a)" }
    ]
}"#;

// =============================================================================
// TIFF Builders
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Value of one IFD entry, encoded at build time in the file's byte order.
#[derive(Clone, Debug)]
enum EntryValue {
    Ascii(String),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    Rationals(Vec<(u32, u32)>),
    Raw { field_type: u16, count: u32, bytes: Vec<u8> },
    /// LONG pointer to the IFD at this index in the builder
    SubIfd(usize),
}

#[derive(Clone, Debug)]
struct EntrySpec {
    tag: u16,
    value: EntryValue,
}

/// Builder for one IFD.
#[derive(Clone, Debug, Default)]
pub struct IfdBuilder {
    entries: Vec<EntrySpec>,
    detached: bool,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::Ascii(value.to_string()),
        });
        self
    }

    pub fn short(self, tag: u16, value: u16) -> Self {
        self.shorts(tag, &[value])
    }

    pub fn shorts(mut self, tag: u16, values: &[u16]) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::Shorts(values.to_vec()),
        });
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::Longs(vec![value]),
        });
        self
    }

    pub fn rational(mut self, tag: u16, num: u32, den: u32) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::Rationals(vec![(num, den)]),
        });
        self
    }

    /// Entry with a raw type code and pre-encoded value bytes.
    pub fn raw(mut self, tag: u16, field_type: u16, count: u32, bytes: &[u8]) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::Raw {
                field_type,
                count,
                bytes: bytes.to_vec(),
            },
        });
        self
    }

    /// LONG entry pointing at another IFD of the same builder.
    pub fn sub_ifd(mut self, tag: u16, ifd_index: usize) -> Self {
        self.entries.push(EntrySpec {
            tag,
            value: EntryValue::SubIfd(ifd_index),
        });
        self
    }

    /// Keep this IFD out of the next-IFD chain (reachable only by pointer).
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    fn size(&self) -> usize {
        2 + self.entries.len() * 12 + 4
    }
}

/// Builder for a complete TIFF block.
///
/// IFDs are laid out right after the header in the order they were added,
/// followed by the out-of-line value area. Non-detached IFDs are linked
/// into the next-IFD chain in order.
#[derive(Clone, Debug)]
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    ifds: Vec<IfdBuilder>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            ifds: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    /// Build the TIFF block.
    pub fn build(self) -> Vec<u8> {
        let mut ifd_offsets = Vec::with_capacity(self.ifds.len());
        let mut offset = 8;
        for ifd in &self.ifds {
            ifd_offsets.push(offset);
            offset += ifd.size();
        }
        let mut external_offset = offset;

        let mut data = Vec::new();
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        self.put_u16(&mut data, 42);
        self.put_u32(&mut data, ifd_offsets.first().copied().unwrap_or(0) as u32);

        let chained: Vec<usize> = (0..self.ifds.len())
            .filter(|&i| !self.ifds[i].detached)
            .collect();

        let mut external = Vec::new();
        for (idx, ifd) in self.ifds.iter().enumerate() {
            self.put_u16(&mut data, ifd.entries.len() as u16);

            for entry in &ifd.entries {
                let (field_type, count, bytes) = self.encode(&entry.value, &ifd_offsets);
                self.put_u16(&mut data, entry.tag);
                self.put_u16(&mut data, field_type);
                self.put_u32(&mut data, count);

                if bytes.len() <= 4 {
                    let mut inline = bytes.clone();
                    inline.resize(4, 0);
                    data.extend_from_slice(&inline);
                } else {
                    self.put_u32(&mut data, external_offset as u32);
                    external_offset += bytes.len();
                    external.extend_from_slice(&bytes);
                }
            }

            let next = chained
                .iter()
                .position(|&i| i == idx)
                .and_then(|pos| chained.get(pos + 1))
                .map(|&n| ifd_offsets[n] as u32)
                .unwrap_or(0);
            self.put_u32(&mut data, next);
        }

        data.extend_from_slice(&external);
        data
    }

    fn encode(&self, value: &EntryValue, ifd_offsets: &[usize]) -> (u16, u32, Vec<u8>) {
        let mut bytes = Vec::new();
        match value {
            EntryValue::Ascii(s) => {
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
                (2, bytes.len() as u32, bytes)
            }
            EntryValue::Shorts(values) => {
                for &v in values {
                    self.put_u16(&mut bytes, v);
                }
                (3, values.len() as u32, bytes)
            }
            EntryValue::Longs(values) => {
                for &v in values {
                    self.put_u32(&mut bytes, v);
                }
                (4, values.len() as u32, bytes)
            }
            EntryValue::Rationals(values) => {
                for &(num, den) in values {
                    self.put_u32(&mut bytes, num);
                    self.put_u32(&mut bytes, den);
                }
                (5, values.len() as u32, bytes)
            }
            EntryValue::Raw {
                field_type,
                count,
                bytes: raw,
            } => (*field_type, *count, raw.clone()),
            EntryValue::SubIfd(index) => {
                self.put_u32(&mut bytes, ifd_offsets[*index] as u32);
                (4, 1, bytes)
            }
        }
    }

    fn put_u16(&self, data: &mut Vec<u8>, value: u16) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put_u32(&self, data: &mut Vec<u8>, value: u32) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A camera-style TIFF: Make, Model, Orientation and XResolution in IFD0.
pub fn camera_tiff(byte_order: ByteOrderType) -> Vec<u8> {
    TiffBuilder::new()
        .with_byte_order(byte_order)
        .add_ifd(
            IfdBuilder::new()
                .ascii(0x010F, "ACME")
                .ascii(0x0110, "Model X")
                .short(0x0112, 6)
                .rational(0x011A, 300, 1),
        )
        .build()
}

// =============================================================================
// JPEG Builders
// =============================================================================

pub const APP1: u8 = 0xE1;
pub const APP13: u8 = 0xED;
pub const COM: u8 = 0xFE;

/// A single marker segment with its length field.
pub fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// SOI, the given segments, a short scan and EOI.
pub fn jpeg_with_segments(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend(jpeg_segment(0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0"));
    for segment in segments {
        data.extend_from_slice(segment);
    }
    data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0x56, 0x78]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// APP1 segment wrapping a TIFF block as Exif.
pub fn exif_segment(tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    jpeg_segment(APP1, &payload)
}

/// APP13 segment wrapping an IPTC block in a Photoshop 0x0404 resource.
pub fn photoshop_segment(iptc: &[u8]) -> Vec<u8> {
    let size = iptc.len() as u32;
    // The resource size must not contain the IPTC tag marker byte
    assert!(size.to_be_bytes().iter().all(|&b| b != 0x1C));

    let mut payload = b"Photoshop 3.0\0".to_vec();
    payload.extend_from_slice(b"8BIM");
    payload.extend_from_slice(&[0x04, 0x04, 0x00, 0x00]);
    payload.extend_from_slice(&size.to_be_bytes());
    payload.extend_from_slice(iptc);
    if payload.len() % 2 == 1 {
        payload.push(0);
    }
    jpeg_segment(APP13, &payload)
}

// =============================================================================
// IPTC Builders
// =============================================================================

/// One IPTC dataset with a short length.
pub fn iptc_dataset(record: u8, dataset: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1C, record, dataset];
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    out
}

/// Concatenate datasets into one block.
pub fn iptc_block(datasets: &[(u8, u8, &[u8])]) -> Vec<u8> {
    datasets
        .iter()
        .flat_map(|&(record, dataset, value)| iptc_dataset(record, dataset, value))
        .collect()
}

// =============================================================================
// PNG Builders
// =============================================================================

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One PNG chunk; the CRC is left zero.
pub fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

/// Signature, IHDR, the given chunks and IEND.
pub fn png_with_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut data = PNG_SIGNATURE.to_vec();
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
    data.extend(png_chunk(b"IHDR", &ihdr));
    for chunk in chunks {
        data.extend_from_slice(chunk);
    }
    data.extend(png_chunk(b"IEND", &[]));
    data
}

// =============================================================================
// XMP Builders
// =============================================================================

/// A minimal packet with the given `<name>value</name>` elements.
pub fn xmp_packet(elements: &[(&str, &str)]) -> Vec<u8> {
    let mut packet = String::from("<?xpacket begin='' id='W5M0MpCehiHzreSzNTczkc9d'?>");
    packet.push_str("<x:xmpmeta xmlns:x='adobe:ns:meta/'><rdf:RDF><rdf:Description>");
    for (name, value) in elements {
        packet.push_str(&format!("<{}>{}</{}>", name, value, name));
    }
    packet.push_str("</rdf:Description></rdf:RDF></x:xmpmeta>");
    packet.push_str("<?xpacket end='w'?>");
    packet.into_bytes()
}
