use crate::domain::ImageId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Diagnostic events emitted around the preview cache. Purely observational.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewCacheEvent {
    Hit(PreviewKeyEvent),
    Miss(PreviewKeyEvent),
    Stored(PreviewStoredEvent),
    Evicted(PreviewKeyEvent),
    Cleared(CacheClearedEvent),
}

impl PreviewCacheEvent {
    pub fn hit(image_id: ImageId) -> Self {
        PreviewCacheEvent::Hit(PreviewKeyEvent::now(image_id))
    }

    pub fn miss(image_id: ImageId) -> Self {
        PreviewCacheEvent::Miss(PreviewKeyEvent::now(image_id))
    }

    pub fn evicted(image_id: ImageId) -> Self {
        PreviewCacheEvent::Evicted(PreviewKeyEvent::now(image_id))
    }

    pub fn stored(image_id: ImageId, size: usize, content_type: impl Into<String>) -> Self {
        PreviewCacheEvent::Stored(PreviewStoredEvent {
            image_id,
            size,
            content_type: content_type.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn cleared(entries: u64) -> Self {
        PreviewCacheEvent::Cleared(CacheClearedEvent {
            entries,
            timestamp: Utc::now(),
        })
    }

    /// Short name used for filtering and as the SSE event name suffix
    pub fn kind(&self) -> &'static str {
        match self {
            PreviewCacheEvent::Hit(_) => "hit",
            PreviewCacheEvent::Miss(_) => "miss",
            PreviewCacheEvent::Stored(_) => "stored",
            PreviewCacheEvent::Evicted(_) => "evicted",
            PreviewCacheEvent::Cleared(_) => "cleared",
        }
    }

    pub fn image_id(&self) -> Option<&ImageId> {
        match self {
            PreviewCacheEvent::Hit(e) | PreviewCacheEvent::Miss(e) | PreviewCacheEvent::Evicted(e) => {
                Some(&e.image_id)
            }
            PreviewCacheEvent::Stored(e) => Some(&e.image_id),
            PreviewCacheEvent::Cleared(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewKeyEvent {
    pub image_id: ImageId,
    pub timestamp: DateTime<Utc>,
}

impl PreviewKeyEvent {
    fn now(image_id: ImageId) -> Self {
        Self {
            image_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewStoredEvent {
    pub image_id: ImageId,
    pub size: usize,
    pub content_type: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheClearedEvent {
    /// Entries present just before the clear
    pub entries: u64,
    pub timestamp: DateTime<Utc>,
}
