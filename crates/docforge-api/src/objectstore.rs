//! Object store port (spec §4.4.1) — an external collaborator (spec.md
//! §1), here only its upload + URL contract is fixed, mirroring the
//! `ObjectStore` port shape in `sem_os_core::ports`.

use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Public URL for a previously-`put` object. `secure` selects the
    /// scheme (`https` vs `http`), per spec §4.4.1.
    fn url(&self, bucket: &str, key: &str, secure: bool) -> String;
}

/// Filesystem-backed stand-in for a real MinIO/S3 client. Writes under
/// `<root>/<bucket>/<key>` and synthesizes a URL against `endpoint`.
pub struct LocalObjectStore {
    root: std::path::PathBuf,
    endpoint: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<std::path::PathBuf>, endpoint: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> anyhow::Result<()> {
        let path = self.root.join(bucket).join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    fn url(&self, bucket: &str, key: &str, secure: bool) -> String {
        let scheme = if secure { "https" } else { "http" };
        format!("{scheme}://{}/{bucket}/{key}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_url_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "minio.local:9000");
        store.put("docs", "images/a.png", b"x").await.unwrap();

        assert!(dir.path().join("docs/images/a.png").exists());
        assert_eq!(
            store.url("docs", "images/a.png", true),
            "https://minio.local:9000/docs/images/a.png"
        );
        assert_eq!(
            store.url("docs", "images/a.png", false),
            "http://minio.local:9000/docs/images/a.png"
        );
    }
}
