use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

use crate::storage::Addressing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server holding identity sessions.
    pub redis_url: String,
    /// The master key used to seal session keys at rest.
    pub master_key: Zeroizing<Vec<u8>>,
    /// The similarity oracle endpoint.
    pub oracle_url: String,
    /// Root directory of the blob store.
    pub storage_dir: PathBuf,
    /// Locator scheme used by the blob store.
    pub addressing: Addressing,
    /// Deadline for oracle and blob store calls.
    pub request_timeout: Duration,
    /// How long a purchased license stays valid.
    pub license_duration: chrono::Duration,
    /// Body limit for content uploads, in bytes.
    pub max_upload_bytes: usize,
    /// The address the server listens on.
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut master_key_hex = env::var("MASTER_KEY")
            .context("MASTER_KEY must be set (generate with: openssl rand -hex 32)")?;

        let master_key_bytes = hex::decode(&master_key_hex)
            .context("MASTER_KEY must be valid hexadecimal")?;

        master_key_hex.zeroize();

        if master_key_bytes.len() != 32 {
            anyhow::bail!("MASTER_KEY must be exactly 32 bytes (64 hex characters)");
        }

        let addressing: Addressing = env::var("STORAGE_ADDRESSING")
            .unwrap_or_else(|_| "hash".to_string())
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Invalid STORAGE_ADDRESSING: {}", e))?;

        let timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("Invalid REQUEST_TIMEOUT_SECS")?;

        let license_hours: i64 = env::var("LICENSE_DURATION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .context("Invalid LICENSE_DURATION_HOURS")?;

        if license_hours <= 0 {
            anyhow::bail!("LICENSE_DURATION_HOURS must be positive");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            master_key: Zeroizing::new(master_key_bytes),
            oracle_url: env::var("ORACLE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/compare-video-bytes/".to_string()),
            storage_dir: env::var("STORAGE_DIR")
                .unwrap_or_else(|_| "uploads/content".to_string())
                .into(),
            addressing,
            request_timeout: Duration::from_secs(timeout_secs),
            license_duration: chrono::Duration::hours(license_hours),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid MAX_UPLOAD_BYTES")?,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
        })
    }
}
