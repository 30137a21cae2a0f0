//! File-per-key cache backend.

use super::backend::{Cache, StreamCache};
use super::key::hashed_key;
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Stores every key in its own file under `base_dir`, named by the hex
/// SHA-256 of the key. Values are written to a uniquely named temporary file
/// in the same directory and renamed into place, so readers never observe a
/// partial entry, even with several caches sharing one directory.
pub struct DiskCache {
    base_dir: PathBuf,
}

impl DiskCache {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(hashed_key(key))
    }

    async fn write_atomically(
        &self,
        key: &str,
        mut stream: BoxStream<'static, Bytes>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.base_dir)?;
        // The temp path removes the file on drop unless it is persisted.
        let (file, tmp_path) = tmp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tmp_path
            .persist(self.path_for(key))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &str) -> Option<Bytes> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "disk cache read failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes) {
        let once: BoxStream<'static, Bytes> =
            Box::pin(futures::stream::once(async move { Ok::<_, Error>(value) }));
        if let Err(e) = self.write_atomically(key, once).await {
            warn!(key, error = %e, "disk cache write failed");
        }
    }

    async fn delete(&self, key: &str) {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = %e, "disk cache delete failed"),
        }
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}

#[async_trait]
impl StreamCache for DiskCache {
    async fn get_reader(&self, key: &str) -> Result<BoxStream<'static, Bytes>> {
        let file = match tokio::fs::File::open(self.path_for(key)).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::not_found(key)),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Box::pin(ReaderStream::new(file).map_err(Error::from)))
    }

    async fn set_reader(&self, key: &str, stream: BoxStream<'static, Bytes>) -> Result<()> {
        self.write_atomically(key, stream).await
    }
}
