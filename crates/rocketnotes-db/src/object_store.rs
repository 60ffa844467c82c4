//! Filesystem object store.
//!
//! Objects live at `{base_path}/{bucket}/{key}`. Writes go to a uniquely
//! named temp file in the same directory and are renamed into place, so a
//! reader sees either the previous object or the new one.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use rocketnotes_core::{Error, ObjectStore, Result};

/// Object store over a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    base_path: PathBuf,
}

/// Reject names that would escape the bucket directory.
fn check_segment(kind: &str, value: &str) -> Result<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');
    if bad {
        return Err(Error::InvalidInput(format!("invalid {kind} name: {value:?}")));
    }
    Ok(())
}

impl FilesystemObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        check_segment("bucket", bucket)?;
        check_segment("key", key)?;
        Ok(self.base_path.join(bucket).join(key))
    }

    /// Write, read back and remove a health-check object under `bucket`.
    ///
    /// Run at start-up to surface permission or mount problems before the
    /// first reindex does.
    pub async fn validate(&self, bucket: &str) -> Result<()> {
        let key = ".health-check";
        let data = b"object-store-health-check";
        self.put(bucket, key, data).await?;
        let read_back = self.get(bucket, key).await?;
        if read_back.as_deref() != Some(&data[..]) {
            return Err(Error::ObjectStore("read-back mismatch".to_string()));
        }
        self.delete(bucket, key).await
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.object_path(bucket, key)?;
        debug!(
            subsystem = "db",
            component = "object_store",
            op = "put",
            bucket,
            key,
            size = data.len(),
            "Writing object"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "object_store: create_dir_all failed");
                e
            })?;
        }

        let temp_path = full_path.with_file_name(format!(".{}.{}.tmp", key, Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            warn!(path = %temp_path.display(), error = %e, "object_store: write failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            warn!(
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "object_store: rename failed"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::ObjectStore(format!("rename into {key} failed: {e}")));
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.object_path(bucket, key)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let full_path = self.object_path(bucket, key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
