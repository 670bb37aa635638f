use async_trait::async_trait;
use bytes::Bytes;
use darkroom::ports::ObjectStore;
use darkroom::{ImageId, StoredObject};
use shared::{Error, Result};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Object store keeping each original as a single `<id>.obj` file: the
/// content type on the first line, the raw bytes after it.
///
/// Every put writes its own uniquely named temp file in the store directory
/// and renames it over the object, so concurrent writers to one id never share
/// a temp path and a reader always sees bytes and content type from the same put.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            Error::Io(format!(
                "failed to create object store dir {}: {}",
                root.display(),
                e
            ))
        })?;
        debug!(root = %root.display(), "Opened filesystem object store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ImageId) -> PathBuf {
        self.root.join(format!("{}.obj", id))
    }
}

fn write_object(root: &Path, path: &Path, object: &StoredObject) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(root)?;
    tmp.write_all(object.content_type.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.write_all(&object.bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::from(e.error))?;
    Ok(())
}

fn decode_object(id: &ImageId, mut raw: Vec<u8>) -> Result<StoredObject> {
    let split = raw
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| Error::Format(format!("object {} has no content type header", id)))?;
    let bytes = Bytes::from(raw.split_off(split + 1));
    raw.truncate(split);

    let declared = String::from_utf8(raw)
        .map_err(|_| Error::Format(format!("object {} has a non-utf8 content type", id)))?;
    let content_type = if declared.trim().is_empty() {
        let guessed = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| FALLBACK_CONTENT_TYPE.to_string());
        warn!(image_id = %id, content_type = %guessed, "Object has no content type, guessed from bytes");
        guessed
    } else {
        declared.trim().to_string()
    };
    Ok(StoredObject::new(bytes, content_type))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn fetch(&self, id: &ImageId) -> Result<StoredObject> {
        let raw = match fs::read(self.object_path(id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("image {}", id)));
            }
            Err(e) => return Err(e.into()),
        };
        decode_object(id, raw)
    }

    async fn put(&self, id: ImageId, object: StoredObject) -> Result<()> {
        if object.content_type.contains(['\n', '\r']) {
            return Err(Error::InvalidInput(
                "content type must not contain line breaks".to_string(),
            ));
        }
        let root = self.root.clone();
        let path = self.object_path(&id);
        let size = object.bytes.len();
        tokio::task::spawn_blocking(move || write_object(&root, &path, &object))
            .await
            .map_err(|e| Error::Internal(format!("object write task failed: {}", e)))??;
        debug!(image_id = %id, size, "Wrote object");
        Ok(())
    }

    async fn delete(&self, id: &ImageId) -> Result<bool> {
        match fs::remove_file(self.object_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
