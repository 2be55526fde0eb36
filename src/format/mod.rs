//! Format identification from header bytes.
//!
//! - [`pattern`]: compiles the catalog's sniff patterns once
//! - [`identify`]: matches a header against them in priority order, with
//!   extension-based refinement and fallback

pub mod identify;
pub mod pattern;

pub use identify::{extension_hint, resolve_base_type, FileType, FormatIdentifier, UNKNOWN_FORMAT};
pub use pattern::{Node, SniffPattern};
