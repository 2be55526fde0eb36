//! Format identification against the sample catalog.

use std::io::Write;

use metaprobe::{extension_hint, FormatIdentifier, TagCatalog};

use super::test_utils::{
    camera_tiff, jpeg_with_segments, png_with_chunks, sample_catalog, ByteOrderType,
    SAMPLE_CATALOG_JSON,
};

// =============================================================================
// Sniffing
// =============================================================================

#[test]
fn test_identify_jpeg_by_signature() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&jpeg_with_segments(&[]), None);

    assert_eq!(ft.format, "JPEG");
    assert_eq!(ft.module, "JPEG");
    assert_eq!(ft.description, "JPEG image");
    assert!(ft.extension.is_empty());
}

#[test]
fn test_identify_tiff_both_byte_orders() {
    let catalog = sample_catalog();
    let identifier = FormatIdentifier::new(&catalog);

    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let ft = identifier.identify(&camera_tiff(order), None);
        assert_eq!(ft.format, "TIFF", "{:?}", order);
        assert_eq!(ft.description, "Tagged Image File Format");
        assert_eq!(ft.module, "TIFF");
    }
}

#[test]
fn test_identify_png() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&png_with_chunks(&[]), Some("png"));
    assert_eq!(ft.format, "PNG");
    assert_eq!(ft.module, "PNG");
    assert_eq!(ft.extension, "PNG");
}

#[test]
fn test_signature_must_be_at_offset_zero() {
    let catalog = sample_catalog();
    let mut data = vec![0x00];
    data.extend(jpeg_with_segments(&[]));

    let ft = FormatIdentifier::new(&catalog).identify(&data, None);
    assert!(ft.is_unknown());
}

#[test]
fn test_zero_buffer_without_hint_is_unknown() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&[0u8; 16], None);
    assert_eq!(ft.format, "UNKNOWN");
}

// =============================================================================
// Extensions
// =============================================================================

#[test]
fn test_raw_extension_refines_generic_tiff() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog)
        .identify(&camera_tiff(ByteOrderType::LittleEndian), Some(".nef"));

    assert_eq!(ft.format, "TIFF");
    assert_eq!(ft.description, "Nikon (RAW) Electronic Format");
    assert_eq!(ft.module, "Nikon");
    assert_eq!(ft.extension, "NEF");
}

#[test]
fn test_extension_fallback_without_signature() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&[0u8; 16], Some("JPG"));
    assert_eq!(ft.format, "JPEG");
    assert_eq!(ft.description, "JPEG image");
}

#[test]
fn test_alias_extension_resolves_to_base() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&[0u8; 16], Some("jpe"));
    assert_eq!(ft.format, "JPEG");
    assert_eq!(ft.description, "JPEG image");
    assert_eq!(ft.extension, "JPE");
}

#[test]
fn test_unknown_extension_stays_unknown() {
    let catalog = sample_catalog();
    let ft = FormatIdentifier::new(&catalog).identify(&[0u8; 16], Some("xyz"));
    assert!(ft.is_unknown());
}

#[test]
fn test_extension_hint_from_path() {
    assert_eq!(
        extension_hint(std::path::Path::new("/photos/DSC_0001.nef")).as_deref(),
        Some("NEF")
    );
    assert_eq!(extension_hint(std::path::Path::new("README")), None);
}

// =============================================================================
// Catalog Files
// =============================================================================

#[test]
fn test_identify_with_catalog_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CATALOG_JSON.as_bytes()).unwrap();

    let catalog = TagCatalog::from_path(file.path()).unwrap();
    assert_eq!(catalog.table_count(), 2);

    let identifier = FormatIdentifier::new(&catalog);
    assert_eq!(identifier.identify(&jpeg_with_segments(&[]), None).format, "JPEG");
    assert_eq!(
        identifier
            .identify(&camera_tiff(ByteOrderType::BigEndian), None)
            .format,
        "TIFF"
    );
}

#[test]
fn test_missing_catalog_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = TagCatalog::from_path(dir.path().join("missing.json"));
    assert!(matches!(result, Err(metaprobe::CatalogError::Io(_))));
}

#[test]
fn test_malformed_catalog_file_is_json_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ \"tables\": [ }").unwrap();

    let result = TagCatalog::from_path(file.path());
    assert!(matches!(result, Err(metaprobe::CatalogError::Json(_))));
}
