use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs::{create_dir_all, remove_file, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

use crate::err::Error;

/// Opaque key/value storage for uploaded photos and PDFs.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), Error>;

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Returns whether something was deleted.
    async fn delete(&self, key: &str) -> Result<bool, Error>;
}

/// Derives a key such as `photos/<owner>/<sha256>.png`, content-addressed within one owner.
pub fn blob_key(prefix: &str, owner: &Uuid, bytes: &[u8], extension: &str) -> String {
    let mut hasher: Sha256 = Digest::new();
    hasher.update(bytes);
    format!(
        "{}/{}/{}.{}",
        prefix,
        owner,
        hex::encode(hasher.finalize()),
        extension
    )
}

/// Blobs laid out as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn prepare<P: Into<PathBuf>>(root: P) -> Result<Self, Error> {
        let root = root.into();
        create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(Error::invalid_payload(format!("Invalid blob key `{}`", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        let mut writer = BufWriter::new(File::create(&path).await?);
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        BufReader::new(File::open(path).await?)
            .read_to_end(&mut bytes)
            .await?;
        Ok(Some(bytes))
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let path = self.path_for(key)?;
        match remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn store_retrieve_delete() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::prepare(dir.path()).await.unwrap();
        let key = blob_key("pdfs", &Uuid::new_v4(), b"%PDF-1.4", "pdf");

        blobs.store(&key, b"%PDF-1.4").await.unwrap();
        assert_eq!(blobs.retrieve(&key).await.unwrap().unwrap(), b"%PDF-1.4");
        assert!(blobs.delete(&key).await.unwrap());
        assert!(!blobs.delete(&key).await.unwrap());
        assert!(blobs.retrieve(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::prepare(dir.path()).await.unwrap();
        for key in ["../etc/passwd", "/etc/passwd", "photos/../../x", ""] {
            assert!(blobs.retrieve(key).await.is_err(), "{}", key);
        }
    }

    #[test]
    fn keys_are_content_addressed_per_owner() {
        let owner = Uuid::new_v4();
        let a = blob_key("photos", &owner, b"one", "png");
        assert_eq!(a, blob_key("photos", &owner, b"one", "png"));
        assert_ne!(a, blob_key("photos", &owner, b"two", "png"));
        assert_ne!(a, blob_key("photos", &Uuid::new_v4(), b"one", "png"));
        assert!(a.starts_with(&format!("photos/{}/", owner)) && a.ends_with(".png"));
    }
}
