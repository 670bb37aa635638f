use darkroom::ports::ImageCache;
use darkroom::{ImageId, Preview};
use dashmap::DashMap;
use tracing::trace;

/// Unbounded preview cache. Entries stay until removed or cleared.
///
/// Sharded locking keeps operations on different keys from contending, and
/// each entry is swapped as a whole under its shard lock.
pub struct DashMapImageCache {
    name: String,
    entries: DashMap<ImageId, Preview>,
}

impl DashMapImageCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ImageCache for DashMapImageCache {
    fn try_get(&self, id: &ImageId) -> Option<Preview> {
        let found = self.entries.get(id).map(|entry| entry.value().clone());
        trace!(cache = %self.name, image_id = %id, hit = found.is_some(), "get");
        found
    }

    fn set(&self, id: ImageId, preview: Preview) {
        trace!(cache = %self.name, image_id = %id, size = preview.len(), "set");
        self.entries.insert(id, preview);
    }

    fn remove(&self, id: &ImageId) -> bool {
        self.entries.remove(id).is_some()
    }

    fn clear_all(&self) {
        self.entries.clear();
    }

    fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }
}

impl std::fmt::Debug for DashMapImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashMapImageCache")
            .field("name", &self.name)
            .field("entry_count", &self.entries.len())
            .finish()
    }
}
