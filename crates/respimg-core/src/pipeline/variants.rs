//! Variant generation: the (size × format) cross product.
//!
//! Each surviving size is resized once into a PNG intermediate and then
//! fanned out into every requested output format. Sizes run concurrently
//! and independently of each other; the joins fail fast, and a size's
//! intermediate drops as soon as its format conversions finish.

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::codec::{EncodedImage, ImageCodec, SourceMetadata};
use crate::descriptor::RequestSpec;
use crate::error::{CodecError, PipelineError};
use crate::format::ImageFormat;
use crate::widths::{plan_widths, PlannedWidth};

/// One terminal output image.
#[derive(Debug, Clone)]
pub struct FormattedVariant {
    /// Descriptor text this variant was rendered for, e.g. `200w`.
    pub size: String,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The variants of one output format, ascending by size.
#[derive(Debug, Clone)]
pub struct FormatGroup {
    pub format: ImageFormat,
    /// Indices into [`VariantSet::variants`].
    pub members: Vec<usize>,
}

/// Everything the module synthesizer and the asset stages need.
#[derive(Debug, Clone)]
pub struct VariantSet {
    /// All variants, size-major then format-minor, matching the token
    /// indices embedded in the synthesized module.
    pub variants: Vec<FormattedVariant>,

    /// Per-format groups in requested (first-seen) format order.
    pub groups: Vec<FormatGroup>,

    /// Index of the default/fallback variant bound to the `src` export.
    pub fallback: usize,

    pub source: SourceMetadata,
}

impl VariantSet {
    pub fn fallback_variant(&self) -> &FormattedVariant {
        &self.variants[self.fallback]
    }
}

/// Drives the codec to produce all requested variants.
pub struct VariantGenerator {
    codec: Arc<dyn ImageCodec>,
}

impl VariantGenerator {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Generate the full variant set for one request.
    pub async fn generate(
        &self,
        source: &[u8],
        metadata: SourceMetadata,
        spec: &RequestSpec,
    ) -> Result<VariantSet, PipelineError> {
        let formats = resolve_output_formats(spec, metadata)?;
        let plan = plan_widths(&spec.sizes, spec.display_width, metadata.width)?;

        let per_size = try_join_all(
            plan.iter()
                .map(|target| self.render_size(source, target, &formats)),
        )
        .await?;

        let variants: Vec<FormattedVariant> = per_size.into_iter().flatten().collect();
        let groups = group_by_format(&variants);
        let fallback = select_fallback(&variants, &groups);

        tracing::debug!(
            sizes = plan.len(),
            formats = formats.len(),
            variants = variants.len(),
            "generated variant set"
        );

        Ok(VariantSet {
            variants,
            groups,
            fallback,
            source: metadata,
        })
    }

    /// Resize one target, then encode the intermediate into every
    /// requested format. The intermediate never outlives this call.
    async fn render_size(
        &self,
        source: &[u8],
        target: &PlannedWidth,
        formats: &[ImageFormat],
    ) -> Result<Vec<FormattedVariant>, PipelineError> {
        let resized = self.codec.resize(source, target.width).await?;
        tracing::trace!(
            size = target.descriptor.text(),
            width = resized.width,
            height = resized.height,
            "resized"
        );

        let encoded: Vec<EncodedImage> = try_join_all(formats.iter().map(|&format| {
            let resized = &resized;
            async move {
                if resized.format == format {
                    // The intermediate already is the requested format;
                    // reuse its buffer instead of re-encoding.
                    return Ok::<EncodedImage, CodecError>(resized.clone());
                }
                self.codec.encode(&resized.bytes, format).await
            }
        }))
        .await?;

        Ok(encoded
            .into_iter()
            .map(|image| FormattedVariant {
                size: target.descriptor.text().to_string(),
                format: image.format,
                bytes: image.bytes,
                width: image.width,
                height: image.height,
            })
            .collect())
    }
}

fn resolve_output_formats(
    spec: &RequestSpec,
    metadata: SourceMetadata,
) -> Result<Vec<ImageFormat>, PipelineError> {
    if !spec.output_formats.is_empty() {
        return Ok(spec.output_formats.clone());
    }
    metadata
        .format
        .map(|format| vec![format])
        .ok_or(PipelineError::UnknownSourceFormat)
}

/// Group variant indices by format, preserving first-seen format order.
fn group_by_format(variants: &[FormattedVariant]) -> Vec<FormatGroup> {
    let mut groups: Vec<FormatGroup> = Vec::new();
    for (index, variant) in variants.iter().enumerate() {
        match groups.iter_mut().find(|g| g.format == variant.format) {
            Some(group) => group.members.push(index),
            None => groups.push(FormatGroup {
                format: variant.format,
                members: vec![index],
            }),
        }
    }
    groups
}

/// Pick the variant exported as `src`.
///
/// When both png and jpeg are present the smaller first-variant encoding
/// wins (png on a tie). Without that pair the preference order is png,
/// jpeg, webp, then whatever format came first.
fn select_fallback(variants: &[FormattedVariant], groups: &[FormatGroup]) -> usize {
    let first_of = |format: ImageFormat| {
        groups
            .iter()
            .find(|g| g.format == format)
            .map(|g| g.members[0])
    };

    match (first_of(ImageFormat::Png), first_of(ImageFormat::Jpeg)) {
        (Some(png), Some(jpeg)) => {
            if variants[png].bytes.len() > variants[jpeg].bytes.len() {
                jpeg
            } else {
                png
            }
        }
        (Some(png), None) => png,
        (None, Some(jpeg)) => jpeg,
        (None, None) => first_of(ImageFormat::Webp)
            .or_else(|| groups.first().map(|g| g.members[0]))
            .unwrap_or(0),
    }
}
