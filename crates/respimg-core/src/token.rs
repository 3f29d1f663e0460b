//! Variant token encoding.
//!
//! The synthesized module references each generated variant through an
//! opaque import specifier of four `.`-joined fields:
//!
//! ```text
//! <base64(source path)>.<variant index>.<escaped size text>.<format>
//! ```
//!
//! The base64 alphabet contains no `.`, and the size field percent-escapes
//! `.` and `%`, so splitting on `.` is unambiguous and decoding recovers
//! the exact inputs — including descriptor texts like `0.25x`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::TokenError;
use crate::format::ImageFormat;

/// Bytes that must not appear literally in the size field.
const SIZE_FIELD: &AsciiSet = &CONTROLS.add(b'%').add(b'.');

/// Round-trippable reference to one generated variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantToken {
    /// Path of the source image as seen by the descriptor loader.
    pub path: String,

    /// Index into the request's variant list.
    pub index: usize,

    /// Descriptor text, e.g. `200w` or `0.25x`.
    pub size: String,

    /// Output format of the variant.
    pub format: ImageFormat,
}

impl VariantToken {
    /// Encode into an import specifier.
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            BASE64.encode(self.path.as_bytes()),
            self.index,
            utf8_percent_encode(&self.size, SIZE_FIELD),
            self.format.as_str(),
        )
    }

    /// Decode an import specifier produced by [`VariantToken::encode`].
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let malformed = |reason: &str| TokenError::Malformed {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = token.split('.').collect();
        let (path_field, index_field, size_field, format_field) = match parts.as_slice() {
            [p, i, s, f] => (*p, *i, *s, *f),
            _ => return Err(malformed("expected four dot-separated fields")),
        };

        let path_bytes = BASE64
            .decode(path_field)
            .map_err(|_| malformed("path field is not valid base64"))?;
        let path = String::from_utf8(path_bytes)
            .map_err(|_| malformed("path field is not valid UTF-8"))?;

        let index: usize = index_field
            .parse()
            .map_err(|_| malformed("index field is not an integer"))?;

        let size = percent_decode_str(size_field)
            .decode_utf8()
            .map_err(|_| malformed("size field is not valid UTF-8"))?
            .into_owned();

        let format =
            ImageFormat::parse(format_field).ok_or_else(|| malformed("unknown format field"))?;

        Ok(Self {
            path,
            index,
            size,
            format,
        })
    }
}
