use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::sync::Arc;
use uuid::Uuid;

use crate::{clock::Clock, error::Result, models::session::Session};

/// Resolves an opaque session token to a verified user id.
///
/// Credentials are checked elsewhere; this only reads what the identity
/// provider already vouched for.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token is unknown or its session has expired.
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>>;
}

/// Reads sessions the identity provider stores in Redis under `session:{token}`.
#[derive(Clone)]
pub struct RedisIdentityProvider {
    redis: ConnectionManager,
    clock: Arc<dyn Clock>,
}

impl RedisIdentityProvider {
    pub fn new(redis: ConnectionManager, clock: Arc<dyn Clock>) -> Self {
        Self { redis, clock }
    }
}

#[async_trait]
impl IdentityProvider for RedisIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>> {
        let mut redis = self.redis.clone();
        let key = format!("session:{}", token);

        let session_json: Option<String> = redis.get(&key).await?;
        let Some(session_json) = session_json else {
            tracing::debug!("🔑 No session stored for token");
            return Ok(None);
        };

        let session: Session = match sonic_rs::from_str(&session_json) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON: {}", e);
                return Ok(None);
            }
        };

        if self.clock.now() >= session.expires_at {
            tracing::warn!("❌ Session expired for user: {}", session.user_id);
            let deleted: redis::RedisResult<()> = redis.del(&key).await;
            if let Err(e) = deleted {
                tracing::warn!("⚠️ Could not delete expired session: {}", e);
            }
            return Ok(None);
        }

        Ok(Some(session.user_id))
    }
}

#[cfg(test)]
pub use fixed::FixedIdentityProvider;

#[cfg(test)]
mod fixed {
    use super::*;
    use std::collections::HashMap;

    /// Token table for tests.
    #[derive(Clone, Default)]
    pub struct FixedIdentityProvider {
        tokens: HashMap<String, Uuid>,
    }

    impl FixedIdentityProvider {
        pub fn with(mut self, token: &str, user_id: Uuid) -> Self {
            self.tokens.insert(token.to_string(), user_id);
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for FixedIdentityProvider {
        async fn resolve(&self, token: &str) -> Result<Option<Uuid>> {
            Ok(self.tokens.get(token).copied())
        }
    }
}
