use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{error::Result, models::content::Content};

/// Data access over content records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persists a new content row.
    async fn insert(&self, content: &Content) -> Result<()>;

    /// Finds content by its ID.
    async fn find_by_id(&self, content_id: Uuid) -> Result<Option<Content>>;

    /// Lists all content, newest first.
    async fn list(&self) -> Result<Vec<Content>>;
}

/// PostgreSQL-backed content store.
#[derive(Clone)]
pub struct PgContentStore {
    pool: Pool,
}

impl PgContentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn insert(&self, content: &Content) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO content (
                    id, title, description, creator_id, price,
                    created_at, updated_at, file_locator, file_size
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
                &[
                    &content.id,
                    &content.title,
                    &content.description,
                    &content.creator_id,
                    &content.price,
                    &content.created_at,
                    &content.updated_at,
                    &content.file_locator,
                    &content.file_size,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, content_id: Uuid) -> Result<Option<Content>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, title, description, creator_id, price,
                       created_at, updated_at, file_locator, file_size
                FROM content
                WHERE id = $1
                "#,
                &[&content_id],
            )
            .await?;
        Ok(row.as_ref().map(Content::from))
    }

    async fn list(&self) -> Result<Vec<Content>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, title, description, creator_id, price,
                       created_at, updated_at, file_locator, file_size
                FROM content
                ORDER BY created_at DESC
                "#,
                &[],
            )
            .await?;
        Ok(rows.iter().map(Content::from).collect())
    }
}
