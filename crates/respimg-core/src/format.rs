//! Supported output formats and their MIME mappings.
//!
//! These are process-wide immutable tables: the format set accepted in
//! request query strings, the `jpg` → `jpeg` alias, and the MIME types
//! emitted into the synthesized module's `sources` export.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format tokens accepted in `inputFormat`/`outputFormats`, in the order
/// quoted by validation error messages.
pub const SUPPORTED_NAMES: &[&str] = &["jpeg", "jpg", "webp", "avif", "png"];

/// An image format the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl ImageFormat {
    /// Parse a format token. `jpg` is an alias of `jpeg`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Canonical name, also used as the generated asset's file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    /// MIME type for `<source type="...">` attributes.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
