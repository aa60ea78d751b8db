use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

/// Object storage for processed avatars.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Stores objects as files under a root directory that is also served at
/// the public media URL.
pub struct FsAvatarStore {
    root: PathBuf,
}

impl FsAvatarStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are relative paths without `..` or absolute components.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Invalid object key: {key}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AvatarStore for FsAvatarStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write then rename so readers never see a partial file.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        debug!(key, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_put_and_delete() {
        let root = std::env::temp_dir().join(format!("kappalib-store-{}", Uuid::new_v4()));
        let store = FsAvatarStore::new(&root);

        store.put("avatars/p1.jpg", vec![1, 2, 3]).await.unwrap();
        let written = tokio::fs::read(root.join("avatars/p1.jpg")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);

        store.delete("avatars/p1.jpg").await.unwrap();
        assert!(!root.join("avatars/p1.jpg").exists());
        store.delete("avatars/p1.jpg").await.unwrap();

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let store = FsAvatarStore::new(std::env::temp_dir());
        assert!(store.put("../etc/passwd", vec![]).await.is_err());
        assert!(store.put("/abs/path", vec![]).await.is_err());
        assert!(store.put("", vec![]).await.is_err());
    }
}
