use thiserror::Error;

/// Errors raised while loading or building a tag catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read
    #[error("Cannot read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog document is not valid JSON or has the wrong shape
    #[error("Invalid catalog document: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entries in the same table share a tag key
    #[error("Duplicate tag id {tag_id} in table {table}")]
    DuplicateTag { table: String, tag_id: String },
}

/// Hard failures returned to callers of the extraction pipeline.
///
/// Everything else (unknown formats, malformed segments, unresolved tags)
/// is soft and never reaches this type.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The input stream could not be read
    #[error("Cannot read input: {0}")]
    Io(#[from] std::io::Error),

    /// Input exceeds the configured read cap and the policy is to reject
    #[error("Input too large: limit is {limit} bytes, input has at least {actual}")]
    InputTooLarge { limit: usize, actual: usize },

    /// The final result could not be rendered
    #[error("Cannot render result: {0}")]
    Render(#[from] RenderError),
}

/// Errors that can occur when rendering extracted metadata
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a single TIFF/IFD sub-scan.
///
/// These are logged and swallowed by the scan engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TiffError {
    /// Block is too small to contain a TIFF header
    #[error("TIFF block too small: need at least {required} bytes, got {actual}")]
    TooSmall { required: usize, actual: usize },

    /// Byte-order marker is neither II nor MM
    #[error("Invalid TIFF byte order: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidByteOrder(u16),

    /// Magic value after the byte-order marker is not 42
    #[error("Invalid TIFF magic: expected 42, got {0}")]
    InvalidMagic(u16),

    /// IFD offset points outside the block
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),
}

/// A sniff pattern that could not be compiled
#[derive(Debug, Clone, Error)]
#[error("Cannot compile sniff pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}
