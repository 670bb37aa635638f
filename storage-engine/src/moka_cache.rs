use darkroom::ports::ImageCache;
use darkroom::{ImageId, Preview};
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::sync::Arc;
use tracing::debug;

/// Moka-backed preview cache with a maximum entry count.
/// Opt-in: once full, Moka's TinyLFU policy decides which previews to drop.
pub struct MokaImageCache {
    cache: Cache<ImageId, Preview>,
}

impl MokaImageCache {
    pub fn new(name: String, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .name(&name)
            .max_capacity(max_entries)
            .eviction_listener(|id: Arc<ImageId>, _preview: Preview, cause: RemovalCause| {
                if cause.was_evicted() {
                    debug!(image_id = %id, ?cause, "Preview evicted from bounded cache");
                }
            })
            .build();

        Self { cache }
    }
}

impl ImageCache for MokaImageCache {
    fn try_get(&self, id: &ImageId) -> Option<Preview> {
        self.cache.get(id)
    }

    fn set(&self, id: ImageId, preview: Preview) {
        self.cache.insert(id, preview);
    }

    fn remove(&self, id: &ImageId) -> bool {
        self.cache.remove(id).is_some()
    }

    fn clear_all(&self) {
        // Invalidated entries are invisible to readers right away
        self.cache.invalidate_all();
    }

    fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for MokaImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaImageCache")
            .field("name", &self.cache.name())
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
