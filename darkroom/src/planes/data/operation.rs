use crate::domain::response::{GetPreviewResponse, InvalidateResponse};
use crate::domain::{ImageId, StoredObject};
use async_trait::async_trait;
use shared::Result;

/// Request-facing preview operations
#[async_trait]
pub trait PreviewOperations: Send + Sync + 'static {
    /// Serve from cache, or render under admission control and cache the result
    async fn get_preview(&self, id: &ImageId) -> Result<GetPreviewResponse>;

    /// Replace the original and drop any stale preview for it
    async fn store_original(&self, id: ImageId, original: StoredObject) -> Result<()>;

    async fn invalidate(&self, id: &ImageId) -> Result<InvalidateResponse>;

    async fn delete_image(&self, id: &ImageId) -> Result<bool>;
}
