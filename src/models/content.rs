use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Represents a published content item.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    /// The unique identifier for the content.
    pub id: Uuid,
    /// The title of the content.
    pub title: String,
    /// The description of the content.
    pub description: String,
    /// The user who published the content. Never changes after ingestion.
    pub creator_id: Uuid,
    /// The price of a license.
    pub price: f64,
    /// Where the bytes live in the blob store.
    pub file_locator: String,
    /// The size of the stored bytes.
    pub file_size: i64,
    /// The timestamp when the content was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the content was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for Content {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            creator_id: row.get("creator_id"),
            price: row.get("price"),
            file_locator: row.get("file_locator"),
            file_size: row.get("file_size"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Creator-supplied metadata for a new upload.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}
