use crate::admission::AdmissionTicket;
use crate::domain::{Preview, PreviewFormat, StoredObject};
use crate::ports::PreviewRenderer;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use shared::{Error, Result};
use std::io::Cursor;
use tracing::debug;

/// Longest preview edge in pixels unless configured otherwise
pub const DEFAULT_MAX_EDGE: u32 = 1024;

/// Decodes originals with the `image` crate and downsizes them to `max_edge`
#[derive(Clone, Copy, Debug)]
pub struct ImagePreviewRenderer {
    max_edge: u32,
}

impl ImagePreviewRenderer {
    pub fn new(max_edge: u32) -> Self {
        Self {
            max_edge: max_edge.max(1),
        }
    }

    pub fn max_edge(&self) -> u32 {
        self.max_edge
    }
}

impl Default for ImagePreviewRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EDGE)
    }
}

#[async_trait]
impl PreviewRenderer for ImagePreviewRenderer {
    async fn render(&self, original: StoredObject, ticket: AdmissionTicket) -> Result<Preview> {
        let max_edge = self.max_edge;
        // The decode keeps running if this future is dropped, so it owns the ticket
        tokio::task::spawn_blocking(move || {
            let _ticket = ticket;
            render_blocking(&original, max_edge)
        })
        .await
        .map_err(|e| Error::Internal(format!("preview task panicked: {}", e)))?
    }
}

/// Hands the stored bytes back unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughRenderer;

#[async_trait]
impl PreviewRenderer for PassthroughRenderer {
    async fn render(&self, original: StoredObject, _ticket: AdmissionTicket) -> Result<Preview> {
        Ok(Preview::new(original.bytes, original.content_type))
    }
}

fn render_blocking(original: &StoredObject, max_edge: u32) -> Result<Preview> {
    let source = detect_format(original)?;
    let decoded = image::load_from_memory_with_format(&original.bytes, to_image_format(source))
        .map_err(|e| Error::Format(format!("failed to decode image: {}", e)))?;

    let (width, height) = (decoded.width(), decoded.height());
    let resized = if width.max(height) > max_edge {
        decoded.thumbnail(max_edge, max_edge)
    } else {
        decoded
    };

    let target = PreviewFormat::negotiate(source);
    let bytes = encode(resized, target)?;
    debug!(
        source = source.mime_type(),
        target = target.mime_type(),
        width,
        height,
        size = bytes.len(),
        "Rendered preview"
    );
    Ok(Preview::new(bytes, target.mime_type()))
}

/// Magic bytes win over the declared content type
fn detect_format(original: &StoredObject) -> Result<PreviewFormat> {
    if let Ok(format) = image::guess_format(&original.bytes) {
        if let Some(known) = from_image_format(format) {
            return Ok(known);
        }
    }
    PreviewFormat::from_mime(&original.content_type).ok_or_else(|| {
        Error::Format(format!(
            "unsupported image format (declared '{}')",
            original.content_type
        ))
    })
}

fn encode(image: DynamicImage, format: PreviewFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let image = match format {
        PreviewFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, to_image_format(format))
        .map_err(|e| Error::Format(format!("failed to encode preview: {}", e)))?;
    Ok(out.into_inner())
}

fn to_image_format(format: PreviewFormat) -> ImageFormat {
    match format {
        PreviewFormat::Png => ImageFormat::Png,
        PreviewFormat::Jpeg => ImageFormat::Jpeg,
        PreviewFormat::WebP => ImageFormat::WebP,
        PreviewFormat::Gif => ImageFormat::Gif,
    }
}

fn from_image_format(format: ImageFormat) -> Option<PreviewFormat> {
    match format {
        ImageFormat::Png => Some(PreviewFormat::Png),
        ImageFormat::Jpeg => Some(PreviewFormat::Jpeg),
        ImageFormat::WebP => Some(PreviewFormat::WebP),
        ImageFormat::Gif => Some(PreviewFormat::Gif),
        _ => None,
    }
}
