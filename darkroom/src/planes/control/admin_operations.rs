use crate::domain::response::PreviewStats;
use crate::events::PreviewCacheEvent;
use crate::planes::control::operation::PreviewAdmin;
use crate::planes::data::PreviewService;
use async_trait::async_trait;
use shared::Result;
use tracing::info;

#[async_trait]
impl PreviewAdmin for PreviewService {
    async fn clear_cache(&self) -> Result<()> {
        let entries = self.cache.entry_count();
        self.cache.clear_all();
        info!(entries, "Cleared preview cache");
        self.emit(PreviewCacheEvent::cleared(entries));
        Ok(())
    }

    async fn stats(&self) -> Result<PreviewStats> {
        Ok(PreviewStats {
            entries: self.cache.entry_count(),
            admission_capacity: self.limiter.capacity(),
            admission_available: self.limiter.available(),
            admission_in_flight: self.limiter.in_flight(),
        })
    }
}
