#![deny(clippy::all)]

use crate::admission::AdmissionTicket;
use crate::domain::{ImageId, Preview, StoredObject};
use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;

// Ports are the pluggable extension points for cache, storage and rendering backends

/// Settings a cache backend is built from
#[derive(Clone, Debug, Default)]
pub struct CacheSettings {
    pub name: String,
    /// `None` keeps every entry until it is removed or cleared
    pub max_entries: Option<u64>,
}

impl CacheSettings {
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_entries: None,
        }
    }

    pub fn bounded(name: impl Into<String>, max_entries: u64) -> Self {
        Self {
            name: name.into(),
            max_entries: Some(max_entries),
        }
    }
}

/// Port for building an image cache from settings
pub trait CacheFactory: Send + Sync + 'static {
    fn create_from_settings(&self, settings: &CacheSettings) -> Arc<dyn ImageCache>;
}

/// Process-wide store of decoded previews keyed by image id.
///
/// Operations never suspend. A value is replaced as a whole, so readers see
/// either the previous preview or the new one, never bytes of one paired with
/// the content type of another.
pub trait ImageCache: Send + Sync + 'static {
    fn try_get(&self, id: &ImageId) -> Option<Preview>;

    fn set(&self, id: ImageId, preview: Preview);

    /// Returns whether an entry was present
    fn remove(&self, id: &ImageId) -> bool;

    fn clear_all(&self);

    fn entry_count(&self) -> u64;
}

/// Port for the durable store holding original image bytes
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fails with `Error::NotFound` when nothing is stored under `id`
    async fn fetch(&self, id: &ImageId) -> Result<StoredObject>;

    async fn put(&self, id: ImageId, object: StoredObject) -> Result<()>;

    async fn delete(&self, id: &ImageId) -> Result<bool>;
}

/// Port for turning an original into a preview.
///
/// The admission ticket must stay alive until all rendering work is done,
/// including work that keeps running after the calling future is dropped.
#[async_trait]
pub trait PreviewRenderer: Send + Sync + 'static {
    async fn render(&self, original: StoredObject, ticket: AdmissionTicket) -> Result<Preview>;
}
