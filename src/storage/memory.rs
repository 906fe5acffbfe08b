use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{AppError, Result};
use crate::storage::{Addressing, BlobStore, BlobStream};

/// Blob store kept in a map; counts writes so tests can assert on them.
#[derive(Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
    addressing: Addressing,
    puts: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new(addressing: Addressing) -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            addressing,
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn read(&self, locator: &str) -> Option<Bytes> {
        self.blobs.lock().unwrap().get(locator).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, extension: Option<&str>, bytes: Bytes) -> Result<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let locator = self.addressing.locator_for(&bytes, extension);
        self.blobs.lock().unwrap().insert(locator.clone(), bytes);
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<BlobStream> {
        let bytes = self
            .read(locator)
            .ok_or_else(|| AppError::Storage(format!("Blob {} not found", locator)))?;
        Ok(futures::stream::once(async move { Ok(bytes) }).boxed())
    }
}
