//! The variant pipeline: generation and virtual module synthesis.

pub mod module;
pub mod variants;

pub use module::synthesize_module;
pub use variants::{FormatGroup, FormattedVariant, VariantGenerator, VariantSet};
