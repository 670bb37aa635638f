use darkroom::events::PreviewCacheEvent;
use darkroom::ports::{CacheFactory, CacheSettings, ObjectStore, PreviewRenderer};
use darkroom::render::{ImagePreviewRenderer, PassthroughRenderer};
use darkroom::{AdmissionLimiter, PreviewService};
use shared::config::Config;
use std::path::Path;
use std::sync::Arc;
use storage_engine::{FsObjectStore, UnifiedStorageFactory};
use tokio::sync::broadcast;

const PREVIEW_CACHE_NAME: &str = "previews";

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub previews: Arc<PreviewService>,
    pub event_channel: broadcast::Sender<PreviewCacheEvent>,
}

impl AppState {
    /// Wire the preview service from configuration, with originals kept under `data_dir`
    pub async fn new(config: &Config) -> shared::Result<Self> {
        let originals = Path::new(&config.data_dir).join("originals");
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(originals).await?);

        let renderer: Arc<dyn PreviewRenderer> = if config.preview_max_edge == 0 {
            tracing::info!("Preview resizing disabled, serving originals as previews");
            Arc::new(PassthroughRenderer)
        } else {
            Arc::new(ImagePreviewRenderer::new(config.preview_max_edge))
        };

        Ok(Self::from_parts(
            store,
            renderer,
            config.preview_concurrency,
            config.preview_cache_max_entries,
        ))
    }

    pub fn from_parts(
        store: Arc<dyn ObjectStore>,
        renderer: Arc<dyn PreviewRenderer>,
        concurrency: usize,
        cache_max_entries: Option<u64>,
    ) -> Self {
        let settings = match cache_max_entries {
            Some(max) => CacheSettings::bounded(PREVIEW_CACHE_NAME, max),
            None => CacheSettings::unbounded(PREVIEW_CACHE_NAME),
        };
        let cache = UnifiedStorageFactory.create_from_settings(&settings);

        // Create broadcast channel for SSE events (1000 event buffer capacity)
        let (event_tx, _event_rx) = broadcast::channel(1000);

        let limiter = AdmissionLimiter::new(concurrency);
        tracing::info!(
            "Preview admission limited to {} concurrent generation(s)",
            limiter.capacity()
        );

        let previews = Arc::new(
            PreviewService::new(cache, limiter, store, renderer)
                .with_event_broadcaster(event_tx.clone()),
        );

        Self {
            previews,
            event_channel: event_tx,
        }
    }
}
