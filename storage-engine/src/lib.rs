use darkroom::ports::{CacheFactory, CacheSettings, ImageCache};
use std::sync::Arc;
use tracing::info;

pub mod dashmap_cache;
pub mod fs_store;
pub mod memory_store;
pub mod moka_cache;

pub use dashmap_cache::DashMapImageCache;
pub use fs_store::FsObjectStore;
pub use memory_store::MemoryObjectStore;
pub use moka_cache::MokaImageCache;

/// Picks the cache backend from settings: unbounded settings get the
/// retain-until-removed DashMap cache, a max entry count gets Moka.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnifiedStorageFactory;

impl CacheFactory for UnifiedStorageFactory {
    fn create_from_settings(&self, settings: &CacheSettings) -> Arc<dyn ImageCache> {
        match settings.max_entries {
            Some(max_entries) => {
                info!(
                    "Creating bounded preview cache '{}' (max {} entries)",
                    settings.name, max_entries
                );
                Arc::new(MokaImageCache::new(settings.name.clone(), max_entries))
            }
            None => {
                info!("Creating unbounded preview cache '{}'", settings.name);
                Arc::new(DashMapImageCache::new(settings.name.clone()))
            }
        }
    }
}
