//! The image-processing seam: probe, resize, encode.
//!
//! The variant generator only ever talks to the [`ImageCodec`] trait.
//! [`RasterCodec`] is the default backend built on the `image` crate;
//! decode, resample and encode are CPU-bound, so every call moves onto the
//! blocking pool.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::config::EncoderConfig;
use crate::error::CodecError;
use crate::format::ImageFormat;

/// Dimensions and detected container format of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// `None` when the container is not a format the pipeline can emit.
    pub format: Option<ImageFormat>,
}

/// One encoded image buffer with its measured dimensions.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Opaque image-processing capability used by the variant generator.
///
/// Implementations must be safe to share (`Arc`) and to call concurrently;
/// every method is a suspend point.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Read dimensions and container format without producing pixels.
    async fn probe(&self, bytes: &[u8]) -> Result<SourceMetadata, CodecError>;

    /// Resize to `target_width`, never enlarging, and return a PNG
    /// intermediate with its measured output dimensions.
    async fn resize(&self, bytes: &[u8], target_width: u32) -> Result<EncodedImage, CodecError>;

    /// Re-encode a buffer into `format`.
    async fn encode(&self, bytes: &[u8], format: ImageFormat) -> Result<EncodedImage, CodecError>;
}

/// Default `ImageCodec` backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct RasterCodec {
    encoder: EncoderConfig,
}

impl RasterCodec {
    pub fn new(encoder: EncoderConfig) -> Self {
        Self { encoder }
    }
}

#[async_trait]
impl ImageCodec for RasterCodec {
    async fn probe(&self, bytes: &[u8]) -> Result<SourceMetadata, CodecError> {
        let bytes = bytes.to_vec();
        run_blocking(move || probe_sync(&bytes)).await
    }

    async fn resize(&self, bytes: &[u8], target_width: u32) -> Result<EncodedImage, CodecError> {
        let bytes = bytes.to_vec();
        run_blocking(move || resize_sync(&bytes, target_width)).await
    }

    async fn encode(&self, bytes: &[u8], format: ImageFormat) -> Result<EncodedImage, CodecError> {
        let bytes = bytes.to_vec();
        let jpeg_quality = self.encoder.jpeg_quality;
        run_blocking(move || encode_sync(&bytes, format, jpeg_quality)).await
    }
}

async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, CodecError> + Send + 'static,
) -> Result<T, CodecError> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| CodecError::Task(e.to_string()))?
}

fn probe_sync(bytes: &[u8]) -> Result<SourceMetadata, CodecError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(format!("cannot sniff image format: {e}")))?;

    let format = reader.format().and_then(|f| match f {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::WebP => Some(ImageFormat::Webp),
        image::ImageFormat::Avif => Some(ImageFormat::Avif),
        _ => None,
    });

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    Ok(SourceMetadata {
        width,
        height,
        format,
    })
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(format!("cannot sniff image format: {e}")))?
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))
}

/// Output height preserving aspect ratio. Ceiling division keeps the last
/// partial row instead of cropping it away, and never returns 0.
fn scaled_height(src_w: u32, src_h: u32, out_w: u32) -> u32 {
    let h = (u64::from(src_h) * u64::from(out_w)).div_ceil(u64::from(src_w));
    h.max(1) as u32
}

fn resize_sync(bytes: &[u8], target_width: u32) -> Result<EncodedImage, CodecError> {
    let image = decode(bytes)?;
    let (src_w, src_h) = image.dimensions();

    let out_w = target_width.clamp(1, src_w);
    let resized = if out_w == src_w {
        image
    } else {
        let out_h = scaled_height(src_w, src_h, out_w);
        image.resize_exact(out_w, out_h, FilterType::Lanczos3)
    };

    let (width, height) = resized.dimensions();
    let mut buffer = Cursor::new(Vec::new());
    resized
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| CodecError::Encode {
            format: ImageFormat::Png,
            message: e.to_string(),
        })?;

    Ok(EncodedImage {
        bytes: buffer.into_inner(),
        width,
        height,
        format: ImageFormat::Png,
    })
}

fn encode_sync(
    bytes: &[u8],
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<EncodedImage, CodecError> {
    let image = decode(bytes)?;
    let (width, height) = image.dimensions();

    let encode_err = |e: image::ImageError| CodecError::Encode {
        format,
        message: e.to_string(),
    };

    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            // Baseline RGB keeps every downstream decoder happy; alpha is
            // flattened rather than rejected by the encoder.
            let rgb = image.to_rgb8();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            rgb.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::Png => image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(encode_err)?,
        ImageFormat::Webp => image
            .write_to(&mut buffer, image::ImageFormat::WebP)
            .map_err(encode_err)?,
        ImageFormat::Avif => image
            .write_to(&mut buffer, image::ImageFormat::Avif)
            .map_err(encode_err)?,
    }

    Ok(EncodedImage {
        bytes: buffer.into_inner(),
        width,
        height,
        format,
    })
}
