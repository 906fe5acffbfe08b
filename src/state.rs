use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    crypto::aes::SecureKey,
    error::Result,
    identity::{IdentityProvider, RedisIdentityProvider},
    oracle::{HttpSimilarityOracle, SimilarityOracle},
    repositories::{
        content::{ContentStore, PgContentStore},
        license::PgLicenseStore,
        session_key::PgSessionKeyStore,
    },
    services::{
        access::AccessGate, catalog::ContentCatalog, ingestion::IngestionGate,
        licenses::LicenseAuthority, session_keys::SessionKeyIssuer,
    },
    storage::{fs::FsBlobStore, BlobStore},
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Issues and checks licenses.
    pub licenses: LicenseAuthority,
    /// Issues per-(user, content) session keys.
    pub session_keys: SessionKeyIssuer,
    /// Accepts or rejects new uploads.
    pub ingestion: IngestionGate,
    /// Decides read access.
    pub access: AccessGate,
    /// Lists and opens content.
    pub catalog: ContentCatalog,
    /// Resolves request tokens to users.
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Storage and collaborators the services are built from.
pub struct Parts {
    pub content: Arc<dyn ContentStore>,
    pub licenses: Arc<dyn crate::repositories::license::LicenseStore>,
    pub session_keys: Arc<dyn crate::repositories::session_key::SessionKeyStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub oracle: Arc<dyn SimilarityOracle>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::run_migrations(&db).await?;
        tracing::info!("✅ PostgreSQL pool initialized and schema applied");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized");

        let blobs = FsBlobStore::new(&config.storage_dir, config.addressing).await?;
        let oracle = HttpSimilarityOracle::new(&config.oracle_url, config.request_timeout)?;
        tracing::info!("✅ Similarity oracle client ready ({})", config.oracle_url);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Self::from_parts(
            config.clone(),
            Parts {
                content: Arc::new(PgContentStore::new(db.clone())),
                licenses: Arc::new(PgLicenseStore::new(db.clone())),
                session_keys: Arc::new(PgSessionKeyStore::new(db)),
                blobs: Arc::new(blobs),
                oracle: Arc::new(oracle),
                identity: Arc::new(RedisIdentityProvider::new(redis, clock.clone())),
                clock,
            },
        )
    }

    /// Wires the services over the given collaborators.
    pub fn from_parts(config: Config, parts: Parts) -> Result<Self> {
        let master_key = SecureKey::from_slice(&config.master_key)?;

        let licenses = LicenseAuthority::new(parts.licenses, parts.clock.clone());
        let session_keys =
            SessionKeyIssuer::new(parts.session_keys, parts.clock.clone(), master_key);
        let access = AccessGate::new(parts.content.clone(), licenses.clone());
        let ingestion = IngestionGate::new(
            parts.content.clone(),
            parts.blobs.clone(),
            parts.oracle,
            parts.clock.clone(),
            config.request_timeout,
        );
        let catalog = ContentCatalog::new(
            parts.content,
            parts.blobs,
            access.clone(),
            config.request_timeout,
        );

        Ok(AppState {
            config,
            licenses,
            session_keys,
            ingestion,
            access,
            catalog,
            identity: parts.identity,
            clock: parts.clock,
        })
    }
}
