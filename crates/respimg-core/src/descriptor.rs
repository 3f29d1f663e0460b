//! Size descriptor grammar and request validation.
//!
//! A request's `sizes` parameter carries either width descriptors (`480w`)
//! or density descriptors (`1.5x`), never both. Parsing collects every
//! validation failure before reporting, so one bad request surfaces all of
//! its problems at once.

use std::cmp::Ordering;

use crate::error::ValidationError;
use crate::format::ImageFormat;

/// The kind of a size descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorKind {
    /// `###w`: an exact target width in pixels.
    Width(u32),
    /// `###x`: a density multiplier against the display width.
    Density(f64),
}

/// A parsed size descriptor, retaining its original token text.
///
/// The text is load-bearing: it reappears verbatim in srcset entries, in
/// variant tokens and in the generated asset names.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeDescriptor {
    text: String,
    kind: DescriptorKind,
}

impl SizeDescriptor {
    /// Parse one descriptor token. Zero-valued sizes are rejected.
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(body) = token.strip_suffix('w') {
            if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let pixels: u32 = body.parse().ok()?;
            if pixels == 0 {
                return None;
            }
            return Some(Self {
                text: token.to_string(),
                kind: DescriptorKind::Width(pixels),
            });
        }

        if let Some(body) = token.strip_suffix('x') {
            if !is_decimal(body) {
                return None;
            }
            let factor: f64 = body.parse().ok()?;
            if !(factor > 0.0 && factor.is_finite()) {
                return None;
            }
            return Some(Self {
                text: token.to_string(),
                kind: DescriptorKind::Density(factor),
            });
        }

        None
    }

    /// The original token text, e.g. `200w` or `0.25x`.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// Numeric magnitude used for the ascending sort: the pixel value for
    /// width descriptors, the factor for density descriptors.
    pub fn magnitude(&self) -> f64 {
        match self.kind {
            DescriptorKind::Width(pixels) => f64::from(pixels),
            DescriptorKind::Density(factor) => factor,
        }
    }

    pub fn is_width(&self) -> bool {
        matches!(self.kind, DescriptorKind::Width(_))
    }
}

/// `\d+`, `\d+.\d+` or `.\d+` — no signs, no exponents.
fn is_decimal(body: &str) -> bool {
    match body.split_once('.') {
        Some((int_part, frac_part)) => {
            int_part.bytes().all(|b| b.is_ascii_digit())
                && !frac_part.is_empty()
                && frac_part.bytes().all(|b| b.is_ascii_digit())
        }
        None => !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// A validated variant request, built once from the import query string
/// and read-only thereafter.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Declared input format, if any. Informational: the decoder sniffs
    /// the actual container from the bytes.
    pub input_format: Option<ImageFormat>,

    /// Requested output formats in first-seen order; empty means "derive
    /// from the source format".
    pub output_formats: Vec<ImageFormat>,

    /// Size descriptors, sorted ascending by magnitude.
    pub sizes: Vec<SizeDescriptor>,

    /// Display width used to resolve density descriptors.
    pub display_width: u32,
}

impl RequestSpec {
    /// Parse and validate query parameters.
    ///
    /// Every check runs; failures are collected and returned together.
    /// `default_display_width` applies when `displayWidth` is absent,
    /// unparsable or non-positive.
    pub fn from_query(
        params: &[(String, String)],
        default_display_width: u32,
    ) -> Result<Self, Vec<ValidationError>> {
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let mut errors = Vec::new();

        let input_format = match get("inputFormat") {
            Some(raw) if !raw.is_empty() => match ImageFormat::parse(raw) {
                Some(format) => Some(format),
                None => {
                    errors.push(ValidationError::UnsupportedInputFormat(raw.to_string()));
                    None
                }
            },
            _ => None,
        };

        let mut output_formats: Vec<ImageFormat> = Vec::new();
        if let Some(raw) = get("outputFormats") {
            let mut reported: Vec<&str> = Vec::new();
            for token in raw.split(',').map(str::trim) {
                match ImageFormat::parse(token) {
                    Some(format) => {
                        if !output_formats.contains(&format) {
                            output_formats.push(format);
                        }
                    }
                    None => {
                        if !reported.contains(&token) {
                            reported.push(token);
                            errors.push(ValidationError::UnsupportedOutputFormat(
                                token.to_string(),
                            ));
                        }
                    }
                }
            }
        }

        // Dedup tokens first: `200w,200w` is one descriptor, and a repeated
        // invalid token is reported once.
        let mut size_tokens: Vec<&str> = Vec::new();
        if let Some(raw) = get("sizes") {
            for token in raw.split(',').map(str::trim) {
                if !size_tokens.contains(&token) {
                    size_tokens.push(token);
                }
            }
        }

        if size_tokens.is_empty() {
            errors.push(ValidationError::NoSizes);
        }

        let mut sizes: Vec<SizeDescriptor> = Vec::new();
        let mut has_width = false;
        let mut has_density = false;
        for token in &size_tokens {
            match SizeDescriptor::parse(token) {
                Some(descriptor) => {
                    if descriptor.is_width() {
                        has_width = true;
                    } else {
                        has_density = true;
                    }
                    sizes.push(descriptor);
                }
                None => errors.push(ValidationError::InvalidSizeToken(token.to_string())),
            }
        }

        if has_width && has_density {
            errors.push(ValidationError::MixedDescriptors);
        }

        // Ascending by magnitude; stable, so equal magnitudes keep their
        // first-seen order. This order carries through to deduplication,
        // srcset candidates and fallback selection.
        sizes.sort_by(|a, b| {
            a.magnitude()
                .partial_cmp(&b.magnitude())
                .unwrap_or(Ordering::Equal)
        });

        let display_width = get("displayWidth")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .map(f64::round)
            .filter(|n| n.is_finite() && *n >= 1.0 && *n <= f64::from(u32::MAX))
            .map(|n| n as u32)
            .unwrap_or(default_display_width);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            input_format,
            output_formats,
            sizes,
            display_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_width_descriptor() {
        let descriptor = SizeDescriptor::parse("480w").unwrap();
        assert_eq!(descriptor.kind(), DescriptorKind::Width(480));
        assert_eq!(descriptor.text(), "480w");
    }

    #[test]
    fn test_parse_density_descriptors() {
        assert_eq!(
            SizeDescriptor::parse("2x").unwrap().kind(),
            DescriptorKind::Density(2.0)
        );
        assert_eq!(
            SizeDescriptor::parse("0.25x").unwrap().kind(),
            DescriptorKind::Density(0.25)
        );
        assert_eq!(
            SizeDescriptor::parse(".5x").unwrap().kind(),
            DescriptorKind::Density(0.5)
        );
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        for token in [
            "", "w", "x", "480", "480W", "1.5w", "2.x", "1..5x", "-2x", "0w", "0x", "0.0x",
            "4 80w", "480wx",
        ] {
            assert!(SizeDescriptor::parse(token).is_none(), "token: {token:?}");
        }
    }

    #[test]
    fn test_from_query_sorts_sizes_ascending() {
        let params = query(&[("sizes", "800w,200w,400w")]);
        let spec = RequestSpec::from_query(&params, 1024).unwrap();
        let texts: Vec<&str> = spec.sizes.iter().map(|s| s.text()).collect();
        assert_eq!(texts, vec!["200w", "400w", "800w"]);
    }

    #[test]
    fn test_from_query_dedups_preserving_first_seen() {
        let params = query(&[
            ("sizes", "200w, 200w,400w"),
            ("outputFormats", "jpg,jpeg,webp"),
        ]);
        let spec = RequestSpec::from_query(&params, 1024).unwrap();
        assert_eq!(spec.sizes.len(), 2);
        assert_eq!(
            spec.output_formats,
            vec![ImageFormat::Jpeg, ImageFormat::Webp]
        );
    }

    #[test]
    fn test_from_query_mixed_descriptors_is_one_error() {
        let params = query(&[("sizes", "200w,2x,bogus")]);
        let errors = RequestSpec::from_query(&params, 1024).unwrap_err();
        let mixed = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::MixedDescriptors))
            .count();
        assert_eq!(mixed, 1);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidSizeToken(t) if t == "bogus")));
    }

    #[test]
    fn test_from_query_empty_sizes_is_an_error() {
        let errors = RequestSpec::from_query(&query(&[]), 1024).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoSizes]);
    }

    #[test]
    fn test_from_query_collects_all_errors() {
        let params = query(&[
            ("inputFormat", "bmp"),
            ("outputFormats", "tiff,webp"),
            ("sizes", "nope"),
        ]);
        let errors = RequestSpec::from_query(&params, 1024).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedInputFormat(t) if t == "bmp")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedOutputFormat(t) if t == "tiff")));
    }

    #[test]
    fn test_from_query_display_width_defaults() {
        for raw in ["", "abc", "0", "-200", "0.2"] {
            let params = query(&[("sizes", "1x"), ("displayWidth", raw)]);
            let spec = RequestSpec::from_query(&params, 1024).unwrap();
            assert_eq!(spec.display_width, 1024, "raw: {raw:?}");
        }
    }

    #[test]
    fn test_from_query_display_width_rounds() {
        let params = query(&[("sizes", "1x"), ("displayWidth", "1279.6")]);
        let spec = RequestSpec::from_query(&params, 1024).unwrap();
        assert_eq!(spec.display_width, 1280);
    }

    #[test]
    fn test_from_query_empty_input_format_is_ignored() {
        let params = query(&[("sizes", "1x"), ("inputFormat", "")]);
        let spec = RequestSpec::from_query(&params, 1024).unwrap();
        assert_eq!(spec.input_format, None);
    }
}
