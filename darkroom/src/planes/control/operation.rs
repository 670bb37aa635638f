use crate::domain::response::PreviewStats;
use async_trait::async_trait;
use shared::Result;

#[async_trait]
pub trait PreviewAdmin: Send + Sync + 'static {
    /// Drop every cached preview
    async fn clear_cache(&self) -> Result<()>;
    async fn stats(&self) -> Result<PreviewStats>;
}
