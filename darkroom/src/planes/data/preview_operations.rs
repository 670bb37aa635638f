use crate::admission::AdmissionLimiter;
use crate::domain::response::{GetPreviewResponse, InvalidateResponse};
use crate::domain::{ImageId, StoredObject};
use crate::events::PreviewCacheEvent;
use crate::planes::data::operation::PreviewOperations;
use crate::ports::{ImageCache, ObjectStore, PreviewRenderer};
use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Number of write-generation counters ids are hashed onto
const GENERATION_STRIPES: usize = 64;

/// Application service composing the preview cache, the admission limiter,
/// the backing object store and the renderer.
///
/// Built once at startup and shared by handle; the cache and the limiter it
/// owns are the only shared mutable state on the preview path.
#[derive(Clone)]
pub struct PreviewService {
    pub(crate) cache: Arc<dyn ImageCache>,
    pub(crate) limiter: AdmissionLimiter,
    store: Arc<dyn ObjectStore>,
    renderer: Arc<dyn PreviewRenderer>,
    event_broadcaster: Option<broadcast::Sender<PreviewCacheEvent>>,
    // Bumped whenever an original changes. A render only stays cached if the
    // generation of its id is the same after `set` as it was before the fetch.
    generations: Arc<[AtomicU64; GENERATION_STRIPES]>,
}

impl PreviewService {
    pub fn new(
        cache: Arc<dyn ImageCache>,
        limiter: AdmissionLimiter,
        store: Arc<dyn ObjectStore>,
        renderer: Arc<dyn PreviewRenderer>,
    ) -> Self {
        Self {
            cache,
            limiter,
            store,
            renderer,
            event_broadcaster: None,
            generations: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    pub fn with_event_broadcaster(mut self, broadcaster: broadcast::Sender<PreviewCacheEvent>) -> Self {
        self.event_broadcaster = Some(broadcaster);
        self
    }

    pub fn limiter(&self) -> &AdmissionLimiter {
        &self.limiter
    }

    pub(crate) fn emit(&self, event: PreviewCacheEvent) {
        if let Some(ref broadcaster) = self.event_broadcaster {
            let kind = event.kind();
            match broadcaster.send(event) {
                Ok(subscriber_count) => {
                    debug!(
                        "Broadcasted {} event to {} subscriber(s)",
                        kind, subscriber_count
                    );
                }
                Err(_) => {
                    debug!("No subscribers for {} event", kind);
                }
            }
        }
    }

    fn generation(&self, id: &ImageId) -> &AtomicU64 {
        let stripe = (id.as_uuid().as_u128() % GENERATION_STRIPES as u128) as usize;
        &self.generations[stripe]
    }

    /// Mark the original behind `id` as changed, then drop its preview
    fn original_changed(&self, id: &ImageId) {
        self.generation(id).fetch_add(1, Ordering::SeqCst);
        self.evict(id);
    }

    fn evict(&self, id: &ImageId) -> bool {
        let removed = self.cache.remove(id);
        if removed {
            self.emit(PreviewCacheEvent::evicted(*id));
        }
        removed
    }
}

impl std::fmt::Debug for PreviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewService")
            .field("entries", &self.cache.entry_count())
            .field("limiter", &self.limiter)
            .finish()
    }
}

#[async_trait]
impl PreviewOperations for PreviewService {
    async fn get_preview(&self, id: &ImageId) -> Result<GetPreviewResponse> {
        if let Some(preview) = self.cache.try_get(id) {
            debug!(image_id = %id, "Preview cache hit");
            self.emit(PreviewCacheEvent::hit(*id));
            return Ok(GetPreviewResponse::new(preview, true));
        }

        debug!(image_id = %id, "Preview cache miss");
        self.emit(PreviewCacheEvent::miss(*id));

        let generation = self.generation(id).load(Ordering::SeqCst);
        let preview = self
            .limiter
            .run_with_ticket(|ticket| async move {
                let original = self.store.fetch(id).await?;
                self.renderer.render(original, ticket).await
            })
            .await?;

        if preview.is_empty() {
            debug!(image_id = %id, "Rendered an empty preview, not caching it");
        } else {
            self.cache.set(*id, preview.clone());
            if self.generation(id).load(Ordering::SeqCst) == generation {
                self.emit(PreviewCacheEvent::stored(
                    *id,
                    preview.len(),
                    preview.content_type(),
                ));
            } else {
                // The original changed while rendering; this preview may be stale
                debug!(image_id = %id, "Original changed during render, dropping preview");
                self.cache.remove(id);
            }
        }

        Ok(GetPreviewResponse::new(preview, false))
    }

    async fn store_original(&self, id: ImageId, original: StoredObject) -> Result<()> {
        let size = original.bytes.len();
        self.store.put(id, original).await?;
        self.original_changed(&id);
        info!(image_id = %id, size, "Stored original image");
        Ok(())
    }

    async fn invalidate(&self, id: &ImageId) -> Result<InvalidateResponse> {
        Ok(InvalidateResponse::new(self.evict(id)))
    }

    async fn delete_image(&self, id: &ImageId) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        self.original_changed(id);
        if deleted {
            info!(image_id = %id, "Deleted original image");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::Preview;
    use crate::render::PassthroughRenderer;
    use dashmap::DashMap;
    use shared::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct TestCache {
        entries: DashMap<ImageId, Preview>,
    }

    impl ImageCache for TestCache {
        fn try_get(&self, id: &ImageId) -> Option<Preview> {
            self.entries.get(id).map(|e| e.value().clone())
        }

        fn set(&self, id: ImageId, preview: Preview) {
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

    /// Records how many tickets were free while each fetch ran
    #[derive(Default)]
    pub(crate) struct TestStore {
        objects: DashMap<ImageId, StoredObject>,
        fetches: AtomicUsize,
        observed_available: Mutex<Vec<usize>>,
        limiter: Mutex<Option<AdmissionLimiter>>,
    }

    impl TestStore {
        fn watch(&self, limiter: &AdmissionLimiter) {
            *self.limiter.lock().unwrap() = Some(limiter.clone());
        }
    }

    #[async_trait]
    impl ObjectStore for TestStore {
        async fn fetch(&self, id: &ImageId) -> Result<StoredObject> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(limiter) = self.limiter.lock().unwrap().as_ref() {
                self.observed_available
                    .lock()
                    .unwrap()
                    .push(limiter.available());
            }
            self.objects
                .get(id)
                .map(|e| e.value().clone())
                .ok_or_else(|| Error::NotFound(format!("image {}", id)))
        }

        async fn put(&self, id: ImageId, object: StoredObject) -> Result<()> {
            self.objects.insert(id, object);
            Ok(())
        }

        async fn delete(&self, id: &ImageId) -> Result<bool> {
            Ok(self.objects.remove(id).is_some())
        }
    }

    fn service() -> (PreviewService, Arc<TestCache>, Arc<TestStore>) {
        let cache = Arc::new(TestCache::default());
        let store = Arc::new(TestStore::default());
        let limiter = AdmissionLimiter::new(2);
        store.watch(&limiter);
        let service = PreviewService::new(
            cache.clone(),
            limiter,
            store.clone(),
            Arc::new(PassthroughRenderer),
        );
        (service, cache, store)
    }

    #[tokio::test]
    async fn test_miss_renders_then_hit_serves_from_cache() {
        let (service, cache, store) = service();
        let id = ImageId::new();
        store
            .put(id, StoredObject::new(vec![0x01, 0x02], "image/png"))
            .await
            .unwrap();

        let first = service.get_preview(&id).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.preview.bytes().as_ref(), &[0x01, 0x02]);
        assert_eq!(cache.entry_count(), 1);

        let second = service.get_preview(&id).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.preview, first.preview);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_releases_ticket_and_leaves_cache_empty() {
        let (service, cache, store) = service();
        let id = ImageId::new();

        let result = service.get_preview(&id).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // One ticket was in use while fetching, both are free afterwards
        assert_eq!(*store.observed_available.lock().unwrap(), vec![1]);
        assert_eq!(service.limiter().available(), 2);
        assert!(cache.try_get(&id).is_none());
    }

    #[tokio::test]
    async fn test_empty_render_is_not_cached() {
        let (service, cache, store) = service();
        let id = ImageId::new();
        store
            .put(id, StoredObject::new(Vec::new(), "image/png"))
            .await
            .unwrap();

        let response = service.get_preview(&id).await.unwrap();
        assert!(response.preview.is_empty());
        assert!(cache.try_get(&id).is_none());
    }

    #[tokio::test]
    async fn test_store_original_drops_stale_preview() {
        let (service, cache, _store) = service();
        let id = ImageId::new();
        service
            .store_original(id, StoredObject::new(vec![0x01], "image/png"))
            .await
            .unwrap();
        service.get_preview(&id).await.unwrap();
        assert!(cache.try_get(&id).is_some());

        service
            .store_original(id, StoredObject::new(vec![0x09], "image/jpeg"))
            .await
            .unwrap();
        assert!(cache.try_get(&id).is_none());

        let fresh = service.get_preview(&id).await.unwrap();
        assert_eq!(fresh.preview.bytes().as_ref(), &[0x09]);
        assert_eq!(fresh.preview.content_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (service, cache, _store) = service();
        let id = ImageId::new();
        cache.set(id, Preview::new(vec![1], "image/png"));

        assert!(service.invalidate(&id).await.unwrap().removed);
        assert!(!service.invalidate(&id).await.unwrap().removed);
        assert!(cache.try_get(&id).is_none());
    }

    #[tokio::test]
    async fn test_delete_image_removes_original_and_preview() {
        let (service, cache, _store) = service();
        let id = ImageId::new();
        service
            .store_original(id, StoredObject::new(vec![7], "image/png"))
            .await
            .unwrap();
        service.get_preview(&id).await.unwrap();

        assert!(service.delete_image(&id).await.unwrap());
        assert!(cache.try_get(&id).is_none());
        assert!(matches!(
            service.get_preview(&id).await,
            Err(Error::NotFound(_))
        ));
        assert!(!service.delete_image(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (service, _cache, store) = service();
        let (tx, mut rx) = broadcast::channel(16);
        let service = service.with_event_broadcaster(tx);
        let id = ImageId::new();
        store
            .put(id, StoredObject::new(vec![5], "image/png"))
            .await
            .unwrap();

        service.get_preview(&id).await.unwrap();
        service.get_preview(&id).await.unwrap();
        service.invalidate(&id).await.unwrap();

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["miss", "stored", "hit", "evicted"]);
    }

    /// Passthrough renderer that can hold its next render until released
    #[derive(Default)]
    struct GatedRenderer {
        hold_next: std::sync::atomic::AtomicBool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl PreviewRenderer for GatedRenderer {
        async fn render(
            &self,
            original: StoredObject,
            _ticket: crate::admission::AdmissionTicket,
        ) -> Result<Preview> {
            if self.hold_next.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(Preview::new(original.bytes, original.content_type))
        }
    }

    fn gated_service() -> (PreviewService, Arc<TestCache>, Arc<GatedRenderer>) {
        let cache = Arc::new(TestCache::default());
        let renderer = Arc::new(GatedRenderer::default());
        let service = PreviewService::new(
            cache.clone(),
            AdmissionLimiter::new(2),
            Arc::new(TestStore::default()),
            renderer.clone(),
        );
        (service, cache, renderer)
    }

    #[tokio::test]
    async fn test_reupload_during_render_does_not_leave_stale_preview() {
        let (service, cache, renderer) = gated_service();
        let id = ImageId::new();
        service
            .store_original(id, StoredObject::new(vec![0x01], "image/png"))
            .await
            .unwrap();

        renderer.hold_next.store(true, Ordering::SeqCst);
        let in_flight = {
            let service = service.clone();
            tokio::spawn(async move { service.get_preview(&id).await })
        };
        renderer.entered.notified().await;

        service
            .store_original(id, StoredObject::new(vec![0x09], "image/jpeg"))
            .await
            .unwrap();
        renderer.release.notify_one();

        // The in-flight request still answers with what it fetched
        let old = in_flight.await.unwrap().unwrap();
        assert_eq!(old.preview.bytes().as_ref(), &[0x01]);
        assert!(cache.try_get(&id).is_none());

        let fresh = service.get_preview(&id).await.unwrap();
        assert!(!fresh.from_cache);
        assert_eq!(fresh.preview.bytes().as_ref(), &[0x09]);
        assert_eq!(fresh.preview.content_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_delete_during_render_does_not_cache_deleted_image() {
        let (service, cache, renderer) = gated_service();
        let id = ImageId::new();
        service
            .store_original(id, StoredObject::new(vec![0x01], "image/png"))
            .await
            .unwrap();

        renderer.hold_next.store(true, Ordering::SeqCst);
        let in_flight = {
            let service = service.clone();
            tokio::spawn(async move { service.get_preview(&id).await })
        };
        renderer.entered.notified().await;

        assert!(service.delete_image(&id).await.unwrap());
        renderer.release.notify_one();
        in_flight.await.unwrap().unwrap();

        assert!(cache.try_get(&id).is_none());
        assert!(matches!(
            service.get_preview(&id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unrelated_write_during_render_still_caches() {
        let (service, cache, renderer) = gated_service();
        let id = ImageId::new();
        service
            .store_original(id, StoredObject::new(vec![0x01], "image/png"))
            .await
            .unwrap();

        renderer.hold_next.store(true, Ordering::SeqCst);
        let in_flight = {
            let service = service.clone();
            tokio::spawn(async move { service.get_preview(&id).await })
        };
        renderer.entered.notified().await;

        // Pick an id hashed onto a different generation counter
        let other = std::iter::repeat_with(ImageId::new)
            .find(|other| {
                other.as_uuid().as_u128() % GENERATION_STRIPES as u128
                    != id.as_uuid().as_u128() % GENERATION_STRIPES as u128
            })
            .unwrap();
        service
            .store_original(other, StoredObject::new(vec![0x02], "image/png"))
            .await
            .unwrap();
        renderer.release.notify_one();
        in_flight.await.unwrap().unwrap();

        assert_eq!(
            cache.try_get(&id),
            Some(Preview::new(vec![0x01], "image/png"))
        );
    }
}
