use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod response {
    use super::Preview;
    use serde::Serialize;

    #[derive(Clone, Debug)]
    pub struct GetPreviewResponse {
        pub preview: Preview,
        /// true when served without rendering
        pub from_cache: bool,
    }

    impl GetPreviewResponse {
        pub fn new(preview: Preview, from_cache: bool) -> Self {
            Self {
                preview,
                from_cache,
            }
        }
    }

    #[derive(Clone, Debug, Serialize)]
    pub struct InvalidateResponse {
        pub removed: bool,
    }

    impl InvalidateResponse {
        pub fn new(removed: bool) -> Self {
            Self { removed }
        }
    }

    #[derive(Clone, Debug, Serialize)]
    pub struct PreviewStats {
        pub entries: u64,
        pub admission_capacity: usize,
        pub admission_available: usize,
        pub admission_in_flight: usize,
    }
}

/// Identifier of a stored image (film scan, contact sheet, ...)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ImageId {
    type Err = shared::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| shared::Error::InvalidInput(format!("invalid image id '{}': {}", s, e)))
    }
}

/// A ready-to-serve preview. Bytes and content type always travel together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    bytes: Bytes,
    content_type: String,
}

impl Preview {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_parts(self) -> (Bytes, String) {
        (self.bytes, self.content_type)
    }
}

/// Original object as held by the backing store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

impl StoredObject {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl PreviewFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            PreviewFormat::Png => "image/png",
            PreviewFormat::Jpeg => "image/jpeg",
            PreviewFormat::WebP => "image/webp",
            PreviewFormat::Gif => "image/gif",
        }
    }

    /// Parse a MIME type, ignoring parameters such as `; charset=...`
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(PreviewFormat::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(PreviewFormat::Jpeg),
            "image/webp" => Some(PreviewFormat::WebP),
            "image/gif" => Some(PreviewFormat::Gif),
            _ => None,
        }
    }

    /// Encoding a preview is produced in for a given source format.
    /// JPEG stays JPEG; everything else becomes PNG to keep alpha lossless.
    pub fn negotiate(source: PreviewFormat) -> PreviewFormat {
        match source {
            PreviewFormat::Jpeg => PreviewFormat::Jpeg,
            _ => PreviewFormat::Png,
        }
    }
}
