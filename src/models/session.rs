use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// An identity session as written by the identity provider into Redis.
///
/// Only the verified user id is trusted downstream; the timestamps let the
/// gate reject sessions the provider forgot to expire.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

/// The verified caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Uuid,
}
