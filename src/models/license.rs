use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// A time-bounded entitlement of one user to one content item.
#[derive(Debug, Clone, PartialEq)]
pub struct License {
    /// The unique identifier for the license.
    pub id: Uuid,
    /// The entitled user.
    pub user_id: Uuid,
    /// The content the license grants access to.
    pub content_id: Uuid,
    /// The timestamp after which the license is no longer honored.
    pub expires_at: DateTime<Utc>,
    /// The timestamp when the license was issued.
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Whether the license still grants access at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl From<&Row> for License {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            content_id: row.get("content_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}
