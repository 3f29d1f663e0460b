//! Error types for the respimg pipeline.
//!
//! The taxonomy follows the protocol boundaries: request-validation
//! failures are collected into a `Vec<ValidationError>` and reported
//! together, token/bounds failures (`TokenError`) are terminal for one
//! import only, and `PipelineError` is fatal for the whole request. All of
//! them cross the host boundary as protocol messages, never as panics.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::{ImageFormat, SUPPORTED_NAMES};

/// Top-level error type for respimg operations.
#[derive(Error, Debug)]
pub enum RespimgError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request-processing errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Variant token errors
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// General I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the options file from disk
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML options
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Option values are invalid
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// One request-validation failure.
///
/// Validation never short-circuits: every check runs and all failures are
/// returned together, so a request with a bad format and a bad size sees
/// both messages at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `inputFormat` is not a supported format token
    #[error("unsupported input format '{0}'; must be one of {names}", names = SUPPORTED_NAMES.join(", "))]
    UnsupportedInputFormat(String),

    /// An `outputFormats` entry is not a supported format token
    #[error("unsupported output format '{0}'; must be one of {names}", names = SUPPORTED_NAMES.join(", "))]
    UnsupportedOutputFormat(String),

    /// A `sizes` entry matches neither descriptor grammar
    #[error("invalid size descriptor '{0}'; only width (###w) and pixel density (###x) descriptors are supported")]
    InvalidSizeToken(String),

    /// The `sizes` set mixes width and density descriptors
    #[error("invalid size set: mixed width descriptors (###w) and pixel density descriptors (###x)")]
    MixedDescriptors,

    /// The `sizes` list is empty
    #[error("at least one output size must be specified")]
    NoSizes,
}

/// Request-processing errors, fatal for the whole request.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A density computation produced a width that is not a positive integer
    #[error("size descriptor '{token}' does not resolve to a usable pixel width")]
    InvalidWidth { token: String },

    /// Output formats were left empty and the source format is not one the
    /// pipeline can emit
    #[error("no output format specified, and unable to identify the source image format")]
    UnknownSourceFormat,

    /// Source file exceeds the configured size limit
    #[error("source file too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Source dimensions exceed the configured limit
    #[error("source image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Reading the source image failed
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The image backend failed
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures inside the image-processing capability.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Decoding the input bytes failed
    #[error("decode failed: {0}")]
    Decode(String),

    /// Encoding to the target format failed
    #[error("encoding to {format} failed: {message}")]
    Encode {
        format: ImageFormat,
        message: String,
    },

    /// The blocking image task died
    #[error("image task failed: {0}")]
    Task(String),
}

/// Variant token failures, terminal for the failing import only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The import specifier is not a well-formed variant token
    #[error("malformed variant token '{token}': {reason}")]
    Malformed { token: String, reason: String },

    /// The token's index does not address the attached variant list
    #[error("variant index {index} out of bounds ({len} variants)")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Convenience type alias for respimg results.
pub type Result<T> = std::result::Result<T, RespimgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_allowed_set() {
        let message = ValidationError::UnsupportedInputFormat("bmp".to_string()).to_string();
        assert!(message.contains("'bmp'"));
        assert!(message.contains("jpeg, jpg, webp, avif, png"));
    }

    #[test]
    fn test_token_error_messages() {
        let message = TokenError::IndexOutOfBounds { index: 9, len: 4 }.to_string();
        assert!(message.contains("index 9"));
        assert!(message.contains("4 variants"));
    }
}
