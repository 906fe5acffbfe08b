use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{AppError, Result},
    models::license::License,
    repositories::license::LicenseStore,
};

/// Issues, verifies and revokes entitlements.
#[derive(Clone)]
pub struct LicenseAuthority {
    store: Arc<dyn LicenseStore>,
    clock: Arc<dyn Clock>,
}

impl LicenseAuthority {
    pub fn new(store: Arc<dyn LicenseStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates and persists a new license.
    ///
    /// Existing licenses for the pair are left alone; overlapping grants are
    /// allowed. Fails with `Validation` unless `expires_at` is in the future.
    pub async fn generate(
        &self,
        user_id: Uuid,
        content_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<License> {
        let now = self.clock.now();
        if expires_at <= now {
            return Err(AppError::Validation(
                "License expiry must be in the future".to_string(),
            ));
        }

        let license = License {
            id: Uuid::new_v4(),
            user_id,
            content_id,
            expires_at,
            created_at: now,
        };

        self.store.insert(&license).await?;

        tracing::info!(
            "🎟️ License {} issued: user {} → content {} (expires {})",
            license.id,
            user_id,
            content_id,
            expires_at.to_rfc3339()
        );

        Ok(license)
    }

    /// Whether `user_id` currently holds a valid license for `content_id`.
    ///
    /// A missing row and an expired row both yield `Ok(false)`. Store failures
    /// are returned as errors, never folded into "not entitled".
    pub async fn verify(&self, user_id: Uuid, content_id: Uuid) -> Result<bool> {
        let license = match self.store.find_latest(user_id, content_id).await? {
            Some(license) => license,
            None => {
                tracing::debug!("No license for user {} on content {}", user_id, content_id);
                return Ok(false);
            }
        };

        let valid = license.is_valid_at(self.clock.now());
        if !valid {
            tracing::debug!(
                "License {} for user {} expired at {}",
                license.id,
                user_id,
                license.expires_at.to_rfc3339()
            );
        }
        Ok(valid)
    }

    /// Looks up a license by ID.
    pub async fn find(&self, license_id: Uuid) -> Result<Option<License>> {
        self.store.find_by_id(license_id).await
    }

    /// Hard-deletes a license. Revoking an unknown ID succeeds.
    pub async fn revoke(&self, license_id: Uuid) -> Result<()> {
        if self.store.delete(license_id).await? {
            tracing::info!("🗑️ License {} revoked", license_id);
        } else {
            tracing::debug!("License {} already absent", license_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repositories::memory::MemoryLicenseStore;
    use async_trait::async_trait;
    use chrono::Duration;

    fn authority() -> (LicenseAuthority, ManualClock, MemoryLicenseStore) {
        let clock = ManualClock::new();
        let store = MemoryLicenseStore::default();
        let authority = LicenseAuthority::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        (authority, clock, store)
    }

    #[tokio::test]
    async fn verify_is_true_right_after_generate() {
        let (authority, clock, _) = authority();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let license = authority
            .generate(user, content, clock.now() + Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(license.user_id, user);
        assert_eq!(license.content_id, content);
        assert!(license.expires_at > license.created_at);
        assert!(authority.verify(user, content).await.unwrap());
    }

    #[tokio::test]
    async fn verify_is_false_without_a_license() {
        let (authority, _, _) = authority();
        assert!(!authority.verify(Uuid::new_v4(), Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn verify_is_false_once_expired() {
        let (authority, clock, _) = authority();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());
        authority
            .generate(user, content, clock.now() + Duration::hours(1))
            .await
            .unwrap();

        clock.advance(Duration::minutes(59));
        assert!(authority.verify(user, content).await.unwrap());

        clock.advance(Duration::minutes(1));
        assert!(!authority.verify(user, content).await.unwrap());
    }

    #[tokio::test]
    async fn verify_is_false_right_after_revoke() {
        let (authority, clock, _) = authority();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());
        let license = authority
            .generate(user, content, clock.now() + Duration::hours(24))
            .await
            .unwrap();

        authority.revoke(license.id).await.unwrap();
        assert!(!authority.verify(user, content).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_of_missing_license_succeeds() {
        let (authority, _, _) = authority();
        authority.revoke(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn generate_rejects_past_or_present_expiry() {
        let (authority, clock, store) = authority();
        let err = authority
            .generate(Uuid::new_v4(), Uuid::new_v4(), clock.now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn overlapping_licenses_are_allowed_and_any_valid_one_counts() {
        let (authority, clock, store) = authority();
        let (user, content) = (Uuid::new_v4(), Uuid::new_v4());

        let long = authority
            .generate(user, content, clock.now() + Duration::hours(48))
            .await
            .unwrap();
        let short = authority
            .generate(user, content, clock.now() + Duration::hours(1))
            .await
            .unwrap();
        assert_ne!(long.id, short.id);
        assert_eq!(store.len(), 2);

        clock.advance(Duration::hours(2));
        assert!(authority.verify(user, content).await.unwrap());

        authority.revoke(long.id).await.unwrap();
        assert!(!authority.verify(user, content).await.unwrap());
    }

    struct BrokenStore;

    #[async_trait]
    impl LicenseStore for BrokenStore {
        async fn insert(&self, _: &License) -> Result<()> {
            Err(AppError::Internal("down".to_string()))
        }
        async fn find_latest(&self, _: Uuid, _: Uuid) -> Result<Option<License>> {
            Err(AppError::Storage("connection reset".to_string()))
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<License>> {
            Err(AppError::Storage("connection reset".to_string()))
        }
        async fn delete(&self, _: Uuid) -> Result<bool> {
            Err(AppError::Storage("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn lookup_failures_propagate_instead_of_denying() {
        let authority = LicenseAuthority::new(Arc::new(BrokenStore), Arc::new(ManualClock::new()));
        let err = authority.verify(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(authority.revoke(Uuid::new_v4()).await.is_err());
    }
}
