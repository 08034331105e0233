use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

/// Local-disk object store rooted at the configured upload directory.
/// Keys are relative paths like `<user_id>/<uuid>.png` and are served back
/// through the `/uploads` static route.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(key);
        // Keys come from our own handlers, but never join anything that
        // could escape the root.
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("invalid storage key: {key}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("create upload directory")?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write object {key}"))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting an already-missing object is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("delete object {key}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_traversal() {
        let storage = LocalStorage::new("/tmp/uploads");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("7/avatar.png").is_ok());
    }

    #[tokio::test]
    async fn put_and_delete_roundtrip() {
        let dir = std::env::temp_dir().join("eternia-storage-test");
        let storage = LocalStorage::new(&dir);
        storage
            .put_object("1/a.png", Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .expect("put");
        let on_disk = tokio::fs::read(dir.join("1/a.png")).await.expect("read");
        assert_eq!(on_disk, b"png-bytes");
        storage.delete_object("1/a.png").await.expect("delete");
        assert!(tokio::fs::read(dir.join("1/a.png")).await.is_err());
        // second delete is a no-op
        storage.delete_object("1/a.png").await.expect("idempotent");
    }
}
