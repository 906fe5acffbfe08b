use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    clock::Clock,
    crypto::aes::{self, SecureKey},
    error::Result,
    models::session_key::SessionKeyRecord,
    repositories::session_key::SessionKeyStore,
};

/// Fixed validity window of an issued session key.
pub const SESSION_KEY_TTL_HOURS: i64 = 24;

/// Hands out one authoritative session key per (user, content) pair,
/// rotating it once expired.
#[derive(Clone)]
pub struct SessionKeyIssuer {
    store: Arc<dyn SessionKeyStore>,
    clock: Arc<dyn Clock>,
    master_key: Arc<SecureKey>,
}

impl SessionKeyIssuer {
    /// `master_key` seals key material before it reaches the store.
    pub fn new(
        store: Arc<dyn SessionKeyStore>,
        clock: Arc<dyn Clock>,
        master_key: SecureKey,
    ) -> Self {
        Self {
            store,
            clock,
            master_key: Arc::new(master_key),
        }
    }

    /// Returns the current key for the pair, creating or rotating it as needed.
    ///
    /// * no row: a fresh key is generated and stored
    /// * valid row: the stored key is returned untouched
    /// * expired row: the row is dropped (best-effort) and replaced
    pub async fn get_or_create(&self, user_id: Uuid, content_id: Uuid) -> Result<SecureKey> {
        let now = self.clock.now();

        match self.store.find(user_id, content_id).await? {
            Some(existing) if existing.is_valid_at(now) => {
                tracing::debug!(
                    "🔑 Reusing session key {} for user {} / content {}",
                    existing.id,
                    user_id,
                    content_id
                );
                return aes::open(&self.master_key, &existing.sealed_key);
            }
            Some(stale) => {
                tracing::info!(
                    "🔄 Session key {} expired at {}, rotating",
                    stale.id,
                    stale.expires_at.to_rfc3339()
                );
                if let Err(e) = self.store.delete(stale.id).await {
                    tracing::warn!("⚠️ Could not delete stale session key {}: {}", stale.id, e);
                }
            }
            None => {
                tracing::debug!(
                    "🔑 No session key yet for user {} / content {}",
                    user_id,
                    content_id
                );
            }
        }

        let material = aes::generate_key();
        let record = SessionKeyRecord {
            id: Uuid::new_v4(),
            user_id,
            content_id,
            sealed_key: aes::seal(&self.master_key, &material)?,
            expires_at: now + Duration::hours(SESSION_KEY_TTL_HOURS),
            created_at: now,
        };

        let stored = self.store.upsert(&record).await?;

        if stored.id == record.id {
            tracing::info!(
                "✅ Session key {} issued for user {} / content {} (expires {})",
                record.id,
                user_id,
                content_id,
                record.expires_at.to_rfc3339()
            );
            Ok(material)
        } else {
            tracing::debug!(
                "Concurrent rotation won for user {} / content {}; adopting key {}",
                user_id,
                content_id,
                stored.id
            );
            aes::open(&self.master_key, &stored.sealed_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::aes::KEY_SIZE;
    use crate::error::AppError;
    use crate::repositories::memory::MemorySessionKeyStore;

    fn issuer() -> (SessionKeyIssuer, ManualClock, MemorySessionKeyStore) {
        let clock = ManualClock::new();
        let store = MemorySessionKeyStore::default();
        let issuer = SessionKeyIssuer::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            aes::generate_key(),
        );
        (issuer, clock, store)
    }

    #[tokio::test]
    async fn first_call_creates_a_32_byte_key_valid_for_24h() {
        let (issuer, clock, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let key = issuer.get_or_create(user, content).await.unwrap();
        assert_eq!(key.as_bytes().len(), KEY_SIZE);

        let record = store.get(user, content).unwrap();
        assert_eq!(record.created_at, clock.now());
        assert_eq!(record.expires_at, record.created_at + Duration::hours(24));
    }

    #[tokio::test]
    async fn material_is_sealed_at_rest() {
        let (issuer, _, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let key = issuer.get_or_create(user, content).await.unwrap();
        let record = store.get(user, content).unwrap();
        assert_ne!(record.sealed_key.as_slice(), key.as_bytes().as_slice());
        assert!(record.sealed_key.len() > KEY_SIZE);
    }

    #[tokio::test]
    async fn repeated_calls_within_ttl_return_identical_material() {
        let (issuer, clock, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let first = issuer.get_or_create(user, content).await.unwrap();
        let id_before = store.get(user, content).unwrap().id;

        clock.advance(Duration::hours(23));
        let second = issuer.get_or_create(user, content).await.unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(store.get(user, content).unwrap().id, id_before);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn call_after_ttl_rotates_material_and_expiry() {
        let (issuer, clock, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let first = issuer.get_or_create(user, content).await.unwrap();
        let old = store.get(user, content).unwrap();

        clock.advance(Duration::hours(24));
        let second = issuer.get_or_create(user, content).await.unwrap();
        let new = store.get(user, content).unwrap();

        assert_ne!(first.as_bytes(), second.as_bytes());
        assert_ne!(old.id, new.id);
        assert_eq!(new.created_at, clock.now());
        assert_eq!(new.expires_at, clock.now() + Duration::hours(24));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn keys_are_scoped_per_pair() {
        let (issuer, _, store) = issuer();
        let user = Uuid::new_v4();

        let a = issuer.get_or_create(user, Uuid::new_v4()).await.unwrap();
        let b = issuer.get_or_create(user, Uuid::new_v4()).await.unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn failed_stale_delete_does_not_block_rotation() {
        let (issuer, clock, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let first = issuer.get_or_create(user, content).await.unwrap();
        store.fail_deletes(true);
        clock.advance(Duration::hours(25));

        let second = issuer.get_or_create(user, content).await.unwrap();
        assert_ne!(first.as_bytes(), second.as_bytes());
        assert!(store.get(user, content).unwrap().is_valid_at(clock.now()));
    }

    #[tokio::test]
    async fn persistence_failure_is_a_hard_error() {
        let (issuer, _, store) = issuer();
        store.fail_writes(true);

        let err = issuer
            .get_or_create(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.len(), 0);
    }

    /// Serves a fixed stale snapshot on reads, as if another request rotated
    /// the key between our read and our write.
    struct StaleReadStore {
        inner: MemorySessionKeyStore,
        snapshot: SessionKeyRecord,
    }

    #[async_trait::async_trait]
    impl SessionKeyStore for StaleReadStore {
        async fn find(&self, _: Uuid, _: Uuid) -> Result<Option<SessionKeyRecord>> {
            Ok(Some(self.snapshot.clone()))
        }
        async fn delete(&self, key_id: Uuid) -> Result<()> {
            self.inner.delete(key_id).await
        }
        async fn upsert(&self, record: &SessionKeyRecord) -> Result<SessionKeyRecord> {
            self.inner.upsert(record).await
        }
    }

    #[tokio::test]
    async fn losing_a_rotation_race_adopts_the_winning_key() {
        let master = [9u8; KEY_SIZE];
        let clock = ManualClock::new();
        let store = MemorySessionKeyStore::default();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let winner_issuer = SessionKeyIssuer::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            SecureKey::new(master),
        );
        winner_issuer.get_or_create(user, content).await.unwrap();
        let stale = store.get(user, content).unwrap();

        clock.advance(Duration::hours(25));
        let winner = winner_issuer.get_or_create(user, content).await.unwrap();
        let winning_row = store.get(user, content).unwrap();

        let loser_issuer = SessionKeyIssuer::new(
            Arc::new(StaleReadStore {
                inner: store.clone(),
                snapshot: stale,
            }),
            Arc::new(clock.clone()),
            SecureKey::new(master),
        );
        let loser = loser_issuer.get_or_create(user, content).await.unwrap();

        assert_eq!(loser.as_bytes(), winner.as_bytes());
        assert_eq!(store.get(user, content).unwrap().id, winning_row.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_stored_key_surfaces_as_encryption_error() {
        let (issuer, clock, store) = issuer();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());
        store.put_raw(SessionKeyRecord {
            id: Uuid::new_v4(),
            user_id: user,
            content_id: content,
            sealed_key: vec![0u8; 60],
            expires_at: clock.now() + Duration::hours(1),
            created_at: clock.now(),
        });

        let err = issuer.get_or_create(user, content).await.unwrap_err();
        assert!(matches!(err, AppError::Encryption(_)));
    }
}
