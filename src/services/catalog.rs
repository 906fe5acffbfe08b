use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::content::Content,
    repositories::content::ContentStore,
    services::{access::AccessGate, deadline::with_deadline},
    storage::{BlobStore, BlobStream},
};

/// A listed item and whether the requester may read it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub content: Content,
    pub purchased: bool,
}

/// Browsing and reading published content.
#[derive(Clone)]
pub struct ContentCatalog {
    content: Arc<dyn ContentStore>,
    blobs: Arc<dyn BlobStore>,
    access: AccessGate,
    deadline: Duration,
}

impl ContentCatalog {
    /// `deadline` bounds each blob store call.
    pub fn new(
        content: Arc<dyn ContentStore>,
        blobs: Arc<dyn BlobStore>,
        access: AccessGate,
        deadline: Duration,
    ) -> Self {
        Self {
            content,
            blobs,
            access,
            deadline,
        }
    }

    /// Lists everything, newest first, flagging what `requester` can read.
    pub async fn list(&self, requester: Uuid) -> Result<Vec<CatalogEntry>> {
        let items = self.content.list().await?;
        let mut entries = Vec::with_capacity(items.len());

        for content in items {
            let purchased = self.access.is_authorized(requester, &content).await?;
            entries.push(CatalogEntry { content, purchased });
        }

        tracing::debug!("📚 Listed {} content items for {}", entries.len(), requester);
        Ok(entries)
    }

    pub async fn get(&self, content_id: Uuid) -> Result<Content> {
        self.content
            .find_by_id(content_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Authorizes the read and opens the stored bytes.
    pub async fn open(&self, requester: Uuid, content_id: Uuid) -> Result<(Content, BlobStream)> {
        let content = self.access.authorize(requester, content_id).await?;
        let stream = with_deadline(
            self.deadline,
            "blob store",
            self.blobs.get(&content.file_locator),
        )
        .await?;
        tracing::info!("📤 Streaming content {} to {}", content_id, requester);
        Ok((content, stream))
    }
}
