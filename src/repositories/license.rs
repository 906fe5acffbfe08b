use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{error::Result, models::license::License};

/// Data access over license records.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Persists a new license row.
    async fn insert(&self, license: &License) -> Result<()>;

    /// Returns the license for the pair with the latest expiry, if any.
    async fn find_latest(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<License>>;

    /// Finds a license by its ID.
    async fn find_by_id(&self, license_id: Uuid) -> Result<Option<License>>;

    /// Hard-deletes a license. Returns whether a row was removed.
    async fn delete(&self, license_id: Uuid) -> Result<bool>;
}

/// PostgreSQL-backed license store.
#[derive(Clone)]
pub struct PgLicenseStore {
    pool: Pool,
}

impl PgLicenseStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LicenseStore for PgLicenseStore {
    async fn insert(&self, license: &License) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO licenses (id, user_id, content_id, expires_at, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
                &[
                    &license.id,
                    &license.user_id,
                    &license.content_id,
                    &license.expires_at,
                    &license.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_latest(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<License>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, content_id, expires_at, created_at
                FROM licenses
                WHERE user_id = $1 AND content_id = $2
                ORDER BY expires_at DESC
                LIMIT 1
                "#,
                &[&user_id, &content_id],
            )
            .await?;
        Ok(row.as_ref().map(License::from))
    }

    async fn find_by_id(&self, license_id: Uuid) -> Result<Option<License>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, content_id, expires_at, created_at
                FROM licenses
                WHERE id = $1
                "#,
                &[&license_id],
            )
            .await?;
        Ok(row.as_ref().map(License::from))
    }

    async fn delete(&self, license_id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM licenses WHERE id = $1", &[&license_id])
            .await?;
        Ok(deleted > 0)
    }
}
