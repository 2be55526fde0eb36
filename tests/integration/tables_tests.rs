//! Table selection for identified inputs and mid-scan loading.

use std::io::Cursor;

use metaprobe::{probe, ExtractOptions, FormatIdentifier, TableResolver, TagCatalog, TagDef};

use super::test_utils::{
    camera_tiff, exif_segment, iptc_block, jpeg_segment, jpeg_with_segments, photoshop_segment,
    png_chunk, png_with_chunks, sample_catalog, ByteOrderType, COM,
};

fn selected_tables(catalog: &TagCatalog, data: &[u8], ext: Option<&str>) -> Vec<String> {
    let file_type = FormatIdentifier::new(catalog).identify(data, ext);
    TableResolver::new(catalog)
        .select_and_expand(&file_type)
        .names()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Initial Selection
// =============================================================================

#[test]
fn test_jpeg_selects_jpeg_tables_only() {
    let catalog = sample_catalog();
    let names = selected_tables(&catalog, &jpeg_with_segments(&[]), Some("jpg"));
    assert_eq!(names, vec!["JPEG::Main"]);
}

#[test]
fn test_tiff_selects_exif() {
    let catalog = sample_catalog();
    let names = selected_tables(&catalog, &camera_tiff(ByteOrderType::LittleEndian), None);
    assert_eq!(names, vec!["Exif::Main", "Exif::SubIFD"]);
}

#[test]
fn test_nikon_raw_selects_maker_and_exif() {
    let catalog = sample_catalog();
    let names = selected_tables(&catalog, &camera_tiff(ByteOrderType::LittleEndian), Some("NEF"));
    assert_eq!(names, vec!["Nikon::Main", "Exif::Main", "Exif::SubIFD"]);
}

#[test]
fn test_unknown_selects_nothing() {
    let catalog = sample_catalog();
    assert!(selected_tables(&catalog, &[0u8; 16], None).is_empty());
}

#[test]
fn test_reference_cycle_is_bounded() {
    let catalog = TagCatalog::builder()
        .table(
            "Loop::Main",
            "Loop",
            [TagDef::new("0x0001", "Again").with_sub_directory("Image::ExifTool::Loop::Main")],
        )
        .table(
            "Loop::Ping",
            "Loop",
            [TagDef::new("0x0001", "Pong").with_sub_directory("Image::ExifTool::Loop::Pong")],
        )
        .table(
            "Loop::Pong",
            "Pong",
            [TagDef::new("0x0001", "Ping").with_sub_directory("Image::ExifTool::Loop::Ping")],
        )
        .extension("LOOP", "Loop", "Looping format")
        .build()
        .unwrap();

    let names = selected_tables(&catalog, &[0u8; 16], Some("loop"));
    assert_eq!(names, vec!["Loop::Main", "Loop::Ping", "Loop::Pong"]);
}

// =============================================================================
// Dynamic Loading
// =============================================================================

#[test]
fn test_jpeg_exif_loads_exif_tables() {
    let catalog = sample_catalog();
    let data = jpeg_with_segments(&[
        exif_segment(&camera_tiff(ByteOrderType::LittleEndian)),
        jpeg_segment(COM, b"  Hello world  "),
    ]);

    let md = probe(&catalog, Cursor::new(data), None, &ExtractOptions::default()).unwrap();
    assert_eq!(md.stats().tables_loaded, 2);
    assert_eq!(md.get("Make").unwrap().table, "Exif::Main");
}

#[test]
fn test_photoshop_segment_loads_iptc_tables() {
    let catalog = sample_catalog();
    let iptc = iptc_block(&[(2, 25, b"sunset")]);
    let data = jpeg_with_segments(&[photoshop_segment(&iptc)]);

    let md = probe(&catalog, Cursor::new(data), None, &ExtractOptions::default()).unwrap();
    let keywords = md.get("Keywords").unwrap();
    assert_eq!(keywords.table, "IPTC::ApplicationRecord");
    assert_eq!(keywords.value.as_text(), Some("sunset"));
    // Photoshop::Main and IPTC::ApplicationRecord
    assert_eq!(md.stats().tables_loaded, 2);
}

#[test]
fn test_png_exif_chunk_loads_exif_tables() {
    let catalog = sample_catalog();
    let data = png_with_chunks(&[png_chunk(b"eXIf", &camera_tiff(ByteOrderType::BigEndian))]);

    let md = probe(&catalog, Cursor::new(data), Some("png"), &ExtractOptions::default()).unwrap();
    assert_eq!(md.value("Make").and_then(|v| v.as_text()), Some("ACME"));
    assert!(md.stats().tables_loaded >= 2);
}

#[test]
fn test_preselected_exif_is_not_reloaded() {
    let catalog = sample_catalog();
    let md = probe(
        &catalog,
        Cursor::new(camera_tiff(ByteOrderType::LittleEndian)),
        Some("tif"),
        &ExtractOptions::default(),
    )
    .unwrap();
    assert_eq!(md.stats().tables_loaded, 0);
}
