use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key {0:?}")]
    InvalidKey(String),
    #[error("object store io: {0}")]
    Io(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Write-once-by-key blob storage for staged media.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
}

/// Stores objects as files under a root directory, one file per key,
/// with the content type kept in a `<key>.content-type` sidecar.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(relative_key_path(key)?))
    }
}

/// Keys are `/`-separated relative paths; anything that could escape the
/// root is rejected.
fn relative_key_path(key: &str) -> Result<PathBuf, StoreError> {
    let path = Path::new(key);
    let is_plain = !key.is_empty()
        && !key.ends_with('/')
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !is_plain {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(path.to_path_buf())
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || path.try_exists())
            .await
            .map_err(|err| StoreError::Io(err.to_string()))?
            .map_err(|err| StoreError::Io(err.to_string()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let relative = relative_key_path(key)?;
        let mut sidecar = relative.clone().into_os_string();
        sidecar.push(CONTENT_TYPE_SUFFIX);
        let sidecar = PathBuf::from(sidecar);

        let writer = AtomicFileWriter::new(self.root.clone());
        let content_type = content_type.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            writer.write(&sidecar, content_type.as_bytes())?;
            writer.write(&relative, &bytes)?;
            Ok(())
        })
        .await
        .map_err(|err| StoreError::Io(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::relative_key_path;

    #[test]
    fn rejects_keys_escaping_the_root() {
        assert!(relative_key_path("musinsa/snaps/1/a.jpg").is_ok());
        assert!(relative_key_path("../etc/passwd").is_err());
        assert!(relative_key_path("/abs/key").is_err());
        assert!(relative_key_path("musinsa/").is_err());
        assert!(relative_key_path("").is_err());
    }
}
