use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{error::Result, models::session_key::SessionKeyRecord};

/// Data access over session-key records. One row per (user, content) pair.
#[async_trait]
pub trait SessionKeyStore: Send + Sync {
    /// Finds the key row for the pair.
    async fn find(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<SessionKeyRecord>>;

    /// Deletes a key row by ID. Missing rows are not an error.
    async fn delete(&self, key_id: Uuid) -> Result<()>;

    /// Inserts `record`, replacing the pair's row only if that row expired
    /// at or before `record.created_at`.
    ///
    /// Returns the row that is authoritative afterwards: `record` itself, or
    /// the still-valid row a concurrent rotation wrote first.
    async fn upsert(&self, record: &SessionKeyRecord) -> Result<SessionKeyRecord>;
}

/// PostgreSQL-backed session-key store.
#[derive(Clone)]
pub struct PgSessionKeyStore {
    pool: Pool,
}

impl PgSessionKeyStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionKeyStore for PgSessionKeyStore {
    async fn find(&self, user_id: Uuid, content_id: Uuid) -> Result<Option<SessionKeyRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, content_id, key, expires_at, created_at
                FROM session_keys
                WHERE user_id = $1 AND content_id = $2
                "#,
                &[&user_id, &content_id],
            )
            .await?;
        Ok(row.as_ref().map(SessionKeyRecord::from))
    }

    async fn delete(&self, key_id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM session_keys WHERE id = $1", &[&key_id])
            .await?;
        Ok(())
    }

    async fn upsert(&self, record: &SessionKeyRecord) -> Result<SessionKeyRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                INSERT INTO session_keys (id, user_id, content_id, key, expires_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (user_id, content_id) DO UPDATE
                SET id = EXCLUDED.id,
                    key = EXCLUDED.key,
                    expires_at = EXCLUDED.expires_at,
                    created_at = EXCLUDED.created_at
                WHERE session_keys.expires_at <= EXCLUDED.created_at
                RETURNING id, user_id, content_id, key, expires_at, created_at
                "#,
                &[
                    &record.id,
                    &record.user_id,
                    &record.content_id,
                    &record.sealed_key,
                    &record.expires_at,
                    &record.created_at,
                ],
            )
            .await?;

        if let Some(row) = row {
            return Ok(SessionKeyRecord::from(&row));
        }

        // Lost the race to a rotation that is still valid; adopt its key.
        let row = client
            .query_one(
                r#"
                SELECT id, user_id, content_id, key, expires_at, created_at
                FROM session_keys
                WHERE user_id = $1 AND content_id = $2
                "#,
                &[&record.user_id, &record.content_id],
            )
            .await?;
        Ok(SessionKeyRecord::from(&row))
    }
}
