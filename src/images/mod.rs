//! Image fetching, downscaling and re-encoding.

mod processor;

pub use processor::ImageProcessor;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::http_client::FetchError;
use crate::rate_limit::Retryable;

/// Errors from the image pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unrecognized image format")]
    UnsupportedFormat,

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode {format} image: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
}

impl Retryable for ImageError {
    fn status(&self) -> Option<u16> {
        match self {
            ImageError::Fetch(e) => e.status(),
            _ => None,
        }
    }

    fn retry_after_header(&self) -> Option<&str> {
        match self {
            ImageError::Fetch(e) => e.retry_after_header(),
            _ => None,
        }
    }
}

/// Encoding for mirrored images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// File extension used in object keys.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Resize and re-encode options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Wider images are downscaled to this width; narrower ones are kept.
    pub max_width: u32,
    pub format: OutputFormat,
    /// JPEG quality (1-100). PNG and WebP output is lossless.
    pub quality: u8,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            max_width: 800,
            format: OutputFormat::Png,
            quality: 85,
        }
    }
}

/// A re-encoded image ready for upload.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// Where the image was fetched from, if it came over the network.
    pub source_url: Option<String>,
}

/// Sniff the container format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Short name for a sniffed format (`"png"`, `"jpeg"`, ...).
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        _ => "other",
    }
}

/// Resize and re-encode an in-memory image.
pub fn optimize(bytes: &[u8], options: &ProcessOptions) -> Result<ProcessedImage, ImageError> {
    let format = detect_format(bytes).ok_or(ImageError::UnsupportedFormat)?;
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(ImageError::Decode)?;
    let resized = fit_width(decoded, options.max_width);

    let (width, height) = (resized.width(), resized.height());
    let encoded = encode(&resized, options)?;

    Ok(ProcessedImage {
        bytes: encoded,
        width,
        height,
        format: options.format,
        source_url: None,
    })
}

/// Downscale to `max_width` preserving aspect ratio. Never enlarges.
fn fit_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if max_width == 0 || width <= max_width {
        return img;
    }
    let new_height = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1) as u32;
    img.resize_exact(max_width, new_height, FilterType::Lanczos3)
}

fn encode(img: &DynamicImage, options: &ProcessOptions) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    let format = options.format;
    let result = match format {
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::Jpeg => {
            let quality = options.quality.clamp(1, 100);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        }
        OutputFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
    };
    result.map_err(|source| ImageError::Encode {
        format: format.as_str(),
        source,
    })?;
    Ok(buf.into_inner())
}
