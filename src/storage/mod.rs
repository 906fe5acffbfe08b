use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use futures::stream::BoxStream;
use rand::{rngs::OsRng, RngCore};
use std::str::FromStr;

use crate::error::{AppError, Result};

pub mod fs;
#[cfg(test)]
pub mod memory;

/// A stream of blob bytes, read lazily.
pub type BlobStream = BoxStream<'static, std::io::Result<Bytes>>;

/// How the blob store names what it stores. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Locator is the hex BLAKE3 digest of the bytes.
    ContentHash,
    /// Locator is `YYYYMMDD-HHMMSS-<8 hex><.ext>`.
    Assigned,
}

impl FromStr for Addressing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" | "content-hash" => Ok(Addressing::ContentHash),
            "assigned" | "generated" => Ok(Addressing::Assigned),
            other => Err(format!(
                "unknown addressing scheme '{}' (expected hash or assigned)",
                other
            )),
        }
    }
}

impl Addressing {
    /// Computes the locator for `bytes` under this scheme.
    ///
    /// `extension` is only used by `Assigned` and must include the leading dot.
    pub fn locator_for(&self, bytes: &[u8], extension: Option<&str>) -> String {
        match self {
            Addressing::ContentHash => hex::encode(blake3::hash(bytes).as_bytes()),
            Addressing::Assigned => {
                let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
                let mut suffix = [0u8; 4];
                OsRng.fill_bytes(&mut suffix);
                format!(
                    "{}-{}{}",
                    timestamp,
                    hex::encode(suffix),
                    extension.map(sanitize_extension).unwrap_or_default()
                )
            }
        }
    }
}

/// Keeps `.ext` only when it is short and alphanumeric.
fn sanitize_extension(ext: &str) -> String {
    let trimmed = ext.trim_start_matches('.');
    if trimmed.is_empty()
        || trimmed.len() > 10
        || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    format!(".{}", trimmed.to_ascii_lowercase())
}

/// Rejects locators that could escape the store root.
pub fn validate_locator(locator: &str) -> Result<()> {
    let ok = !locator.is_empty()
        && locator.len() <= 255
        && !locator.starts_with('.')
        && locator
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(AppError::Storage(format!("Invalid locator: {:?}", locator)))
    }
}

/// Key-addressed byte storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns the locator that retrieves them.
    async fn put(&self, extension: Option<&str>, bytes: Bytes) -> Result<String>;

    /// Opens the bytes stored under `locator`.
    async fn get(&self, locator: &str) -> Result<BlobStream>;
}
