use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::content::Content,
    repositories::content::ContentStore,
    services::licenses::LicenseAuthority,
};

/// Read-path authorization: creators always, everyone else with a valid license.
#[derive(Clone)]
pub struct AccessGate {
    content: Arc<dyn ContentStore>,
    licenses: LicenseAuthority,
}

impl AccessGate {
    pub fn new(content: Arc<dyn ContentStore>, licenses: LicenseAuthority) -> Self {
        Self { content, licenses }
    }

    /// Decides whether `requester` may read `content`.
    ///
    /// The creator check runs first and skips the license lookup.
    pub async fn is_authorized(&self, requester: Uuid, content: &Content) -> Result<bool> {
        if content.creator_id == requester {
            return Ok(true);
        }
        self.licenses.verify(requester, content.id).await
    }

    /// Loads the content and authorizes the read, failing with `NotFound` or
    /// `Forbidden`.
    pub async fn authorize(&self, requester: Uuid, content_id: Uuid) -> Result<Content> {
        let content = self
            .content
            .find_by_id(content_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if self.is_authorized(requester, &content).await? {
            tracing::debug!("✅ User {} authorized for content {}", requester, content_id);
            Ok(content)
        } else {
            tracing::warn!("⛔ User {} has no valid license for content {}", requester, content_id);
            Err(AppError::Forbidden)
        }
    }
}
