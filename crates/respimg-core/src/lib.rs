//! respimg-core — build-time responsive image bundles.
//!
//! Given a source raster image and a size/format request carried in an
//! import query string, the pipeline renders every requested
//! (size × format) variant in memory and synthesizes a virtual module
//! exporting their metadata and `srcset` groupings. A three-namespace
//! resolve/load protocol threads the generated buffers through the host
//! build tool's module graph without writing intermediate files.
//!
//! # Architecture
//!
//! ```text
//! respimg+file:img.png?sizes=… ─▶ entry resolve (host path lookup)
//!   ─▶ descriptor load (validate ─▶ widths ─▶ variants ─▶ module source)
//!     ─▶ variant resolve (token ─▶ asset name) ─▶ asset load (bytes)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use respimg_core::{Options, ResponsiveImages, ResolveArgs};
//!
//! let plugin = ResponsiveImages::new(Options::default());
//! // hand plugin.resolve / plugin.load to the host bundler's hook system
//! ```

pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod host;
pub mod pipeline;
pub mod plugin;
pub mod token;
pub mod widths;

// Re-exports for convenient access
pub use codec::{EncodedImage, ImageCodec, RasterCodec, SourceMetadata};
pub use config::{EncoderConfig, LimitsConfig, Options};
pub use descriptor::{DescriptorKind, RequestSpec, SizeDescriptor};
pub use error::{
    CodecError, ConfigError, PipelineError, RespimgError, Result, TokenError, ValidationError,
};
pub use format::ImageFormat;
pub use host::{
    DescriptorRequest, HostResolver, LoadArgs, LoadOutcome, LoadedModule, Loader, Message,
    PluginData, Resolution, ResolveArgs, ResolveOutcome, NAMESPACE_ASSET, NAMESPACE_DESCRIPTOR,
};
pub use pipeline::{FormatGroup, FormattedVariant, VariantGenerator, VariantSet};
pub use plugin::{ResponsiveImages, SCHEME};
pub use token::VariantToken;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
