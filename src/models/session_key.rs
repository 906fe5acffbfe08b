use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// A session key record as persisted.
///
/// ⚠️ `sealed_key` is the key material encrypted with the master key
/// (ciphertext || 12-byte nonce). Open it with `crypto::aes::open` before use.
#[derive(Debug, Clone)]
pub struct SessionKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: Uuid,
    pub sealed_key: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionKeyRecord {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl From<&Row> for SessionKeyRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            content_id: row.get("content_id"),
            sealed_key: row.get("key"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}
