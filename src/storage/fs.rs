use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::{validate_locator, Addressing, BlobStore, BlobStream};

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    addressing: Addressing,
}

impl FsBlobStore {
    /// Creates the store, making sure the root directory exists.
    pub async fn new(root: impl Into<PathBuf>, addressing: Addressing) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!("✅ Blob store ready at {} ({:?} addressing)", root.display(), addressing);
        Ok(Self { root, addressing })
    }
}

/// Flags the in-flight write as abandoned if `put` is dropped before it finishes.
struct PendingWrite {
    abandoned: Arc<AtomicBool>,
    finished: bool,
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.store(true, Ordering::SeqCst);
        }
    }
}

/// Writes `bytes` to `tmp`, syncs, then renames onto `dest`.
///
/// The temp file is removed on every failure and when the caller gave up.
fn write_then_rename(
    tmp: &Path,
    dest: &Path,
    bytes: &[u8],
    abandoned: &AtomicBool,
) -> std::io::Result<()> {
    let written = (|| {
        let mut file = std::fs::File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    let outcome = match written {
        Ok(()) if abandoned.load(Ordering::SeqCst) => Err(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "blob write abandoned by caller",
        )),
        Ok(()) => std::fs::rename(tmp, dest),
        Err(e) => Err(e),
    };

    if outcome.is_err() {
        if let Err(e) = std::fs::remove_file(tmp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("⚠️ Could not remove temp blob {}: {}", tmp.display(), e);
            }
        }
    }

    outcome
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, extension: Option<&str>, bytes: Bytes) -> Result<String> {
        let locator = self.addressing.locator_for(&bytes, extension);
        validate_locator(&locator)?;

        // Readers only ever see complete blobs: write to a temp name, then rename.
        let final_path = self.root.join(&locator);
        let tmp_path = self.root.join(format!(".{}.{}.partial", locator, Uuid::new_v4()));
        let size = bytes.len();

        let abandoned = Arc::new(AtomicBool::new(false));
        let mut pending = PendingWrite {
            abandoned: abandoned.clone(),
            finished: false,
        };

        let written = tokio::task::spawn_blocking(move || {
            write_then_rename(&tmp_path, &final_path, &bytes, &abandoned)
        })
        .await;
        pending.finished = true;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("❌ Failed to store blob {}: {}", locator, e);
                return Err(AppError::Io(e));
            }
            Err(e) => {
                return Err(AppError::Internal(format!("Blob write task failed: {}", e)));
            }
        }

        tracing::debug!("💾 Stored blob {} ({} bytes)", locator, size);
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<BlobStream> {
        validate_locator(locator)?;
        let path = self.root.join(locator);

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::error!("❌ Blob {} referenced but missing on disk", locator);
                AppError::Storage(format!("Blob {} not found", locator))
            } else {
                AppError::Io(e)
            }
        })?;

        Ok(ReaderStream::new(file).boxed())
    }
}
