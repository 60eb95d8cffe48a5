//! Public artifact hosting for QR banners and contracts.

pub mod s3;

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

pub use s3::S3ArtifactStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact upload failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("artifact store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("artifact request could not be signed")]
    Signing,
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
}

/// Bytes to publish under a random key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
}

impl Artifact {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            extension: "png",
            content_type: "image/png",
        }
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            extension: "pdf",
            content_type: "application/pdf",
        }
    }

    /// `uploads/<uuid>.<ext>`
    pub fn object_key(&self, folder: &str) -> String {
        let name = format!("{}.{}", crate::domain::new_id(), self.extension);
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            name
        } else {
            format!("{folder}/{name}")
        }
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the artifact and returns its public URL.
    async fn upload(&self, artifact: Artifact) -> Result<String, StorageError>;
}

/// Keeps uploads in memory and hands out `memory://` URLs.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    objects: Mutex<Vec<(String, Artifact)>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<(String, Artifact)> {
        self.lock().map(|objects| objects.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<(String, Artifact)>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("artifact mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn upload(&self, artifact: Artifact) -> Result<String, StorageError> {
        let url = format!("memory://{}", artifact.object_key("uploads"));
        self.lock()?.push((url.clone(), artifact));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_joins_folder_and_extension() {
        let key = Artifact::png(Vec::new()).object_key("/uploads/");
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with(".png"));
        assert!(!Artifact::pdf(Vec::new()).object_key("").contains('/'));
    }

    #[tokio::test]
    async fn in_memory_store_keeps_uploads() {
        let store = InMemoryArtifactStore::new();
        let url = store
            .upload(Artifact::pdf(b"%PDF".to_vec()))
            .await
            .expect("upload succeeds");
        assert!(url.starts_with("memory://uploads/"));
        let uploads = store.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1.content_type, "application/pdf");
    }
}
