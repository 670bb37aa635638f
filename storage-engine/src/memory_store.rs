use async_trait::async_trait;
use darkroom::ports::ObjectStore;
use darkroom::{ImageId, StoredObject};
use dashmap::DashMap;
use shared::{Error, Result};

/// In-process object store, for development and tests
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<ImageId, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, id: &ImageId) -> Result<StoredObject> {
        self.objects
            .get(id)
            .map(|entry| entry.value().clone())
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
