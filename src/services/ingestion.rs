use axum::body::Bytes;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{AppError, Result},
    models::content::{Content, ContentMetadata},
    oracle::SimilarityOracle,
    repositories::content::ContentStore,
    services::deadline::with_deadline,
    storage::BlobStore,
    validation::content::validate_metadata,
};

/// An upload waiting for the duplicate decision.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub creator_id: Uuid,
    pub metadata: ContentMetadata,
    /// The fully buffered upload.
    pub bytes: Bytes,
    /// Size announced by the client, if any.
    pub declared_size: Option<i64>,
    /// Original file extension with its leading dot, e.g. `.mp4`.
    pub extension: Option<String>,
}

/// What happened to a candidate. Neither variant is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Stored and recorded under a new id.
    Accepted { content_id: Uuid, similarity: f64 },
    /// Nothing stored; the oracle matched existing content.
    Duplicate { matched_id: String, similarity: f64 },
}

/// Decides new-vs-duplicate for uploads before committing any storage.
///
/// The blob write and the row insert are not transactional. A failure between
/// the two leaves an unreferenced blob behind.
#[derive(Clone)]
pub struct IngestionGate {
    content: Arc<dyn ContentStore>,
    blobs: Arc<dyn BlobStore>,
    oracle: Arc<dyn SimilarityOracle>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl IngestionGate {
    pub fn new(
        content: Arc<dyn ContentStore>,
        blobs: Arc<dyn BlobStore>,
        oracle: Arc<dyn SimilarityOracle>,
        clock: Arc<dyn Clock>,
        deadline: Duration,
    ) -> Self {
        Self {
            content,
            blobs,
            oracle,
            clock,
            deadline,
        }
    }

    /// Runs a candidate through validation, the similarity oracle and storage.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The buffered upload and its metadata.
    ///
    /// # Returns
    ///
    /// `Accepted` with the new id, or `Duplicate` with the oracle's match.
    pub async fn ingest(&self, candidate: Candidate) -> Result<IngestOutcome> {
        validate_metadata(&candidate.metadata)?;

        if candidate.bytes.is_empty() {
            return Err(AppError::Validation("Content file is empty".to_string()));
        }

        let size = candidate.bytes.len() as i64;
        if let Some(declared) = candidate.declared_size {
            if declared != size {
                return Err(AppError::Validation(format!(
                    "Declared size {} does not match received size {}",
                    declared, size
                )));
            }
        }

        let content_id = Uuid::new_v4();

        let verdict = with_deadline(
            self.deadline,
            "similarity oracle",
            self.oracle.compare(content_id, candidate.bytes.clone()),
        )
        .await?;

        if verdict.is_duplicate {
            tracing::info!(
                "🚫 Upload by {} rejected as duplicate of {} (similarity {:.4})",
                candidate.creator_id,
                verdict.matched_id,
                verdict.similarity
            );
            return Ok(IngestOutcome::Duplicate {
                matched_id: verdict.matched_id,
                similarity: verdict.similarity,
            });
        }

        let extension = candidate.extension.or_else(|| {
            infer::get(&candidate.bytes).map(|kind| format!(".{}", kind.extension()))
        });

        let locator = with_deadline(
            self.deadline,
            "blob store",
            self.blobs.put(extension.as_deref(), candidate.bytes),
        )
        .await?;

        let now = self.clock.now();
        let content = Content {
            id: content_id,
            title: candidate.metadata.title,
            description: candidate.metadata.description,
            creator_id: candidate.creator_id,
            price: candidate.metadata.price,
            file_locator: locator,
            file_size: size,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.content.insert(&content).await {
            tracing::error!(
                "❌ Blob {} stored but content row {} failed; blob is now unreferenced",
                content.file_locator,
                content_id
            );
            return Err(e);
        }

        tracing::info!(
            "✅ Content {} accepted from {} ({} bytes, similarity {:.4})",
            content_id,
            content.creator_id,
            size,
            verdict.similarity
        );

        Ok(IngestOutcome::Accepted {
            content_id,
            similarity: verdict.similarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::oracle::{FakeOracle, SimilarityVerdict};
    use crate::repositories::memory::MemoryContentStore;
    use crate::storage::{memory::MemoryBlobStore, Addressing};
    use async_trait::async_trait;
    use futures::TryStreamExt;

    struct Harness {
        gate: IngestionGate,
        oracle: FakeOracle,
        blobs: MemoryBlobStore,
        content: MemoryContentStore,
    }

    fn harness(oracle: FakeOracle) -> Harness {
        let blobs = MemoryBlobStore::new(Addressing::ContentHash);
        let content = MemoryContentStore::default();
        let gate = IngestionGate::new(
            Arc::new(content.clone()),
            Arc::new(blobs.clone()),
            Arc::new(oracle.clone()),
            Arc::new(ManualClock::new()),
            Duration::from_secs(5),
        );
        Harness {
            gate,
            oracle,
            blobs,
            content,
        }
    }

    fn candidate(title: &str, price: f64, bytes: Vec<u8>) -> Candidate {
        Candidate {
            creator_id: Uuid::new_v4(),
            metadata: ContentMetadata {
                title: title.to_string(),
                description: "a clip".to_string(),
                price,
            },
            declared_size: Some(bytes.len() as i64),
            bytes: Bytes::from(bytes),
            extension: Some(".mp4".to_string()),
        }
    }

    #[tokio::test]
    async fn unique_upload_is_stored_and_recorded() {
        let h = harness(FakeOracle::unique());
        let data = vec![42u8; 10_000];

        let outcome = h.gate.ingest(candidate("Demo", 5.0, data.clone())).await.unwrap();
        let IngestOutcome::Accepted { content_id, .. } = outcome else {
            panic!("expected accepted, got {:?}", outcome);
        };

        assert_eq!(h.content.len(), 1);
        assert_eq!(h.oracle.last_id(), Some(content_id));

        let row = h.content.find_by_id(content_id).await.unwrap().unwrap();
        assert_eq!(row.file_size, 10_000);
        assert_eq!(row.title, "Demo");
        assert_eq!(row.price, 5.0);

        let stored: Vec<Bytes> = h
            .blobs
            .get(&row.file_locator)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(stored.concat(), data);
    }

    #[tokio::test]
    async fn duplicate_upload_writes_nothing() {
        let h = harness(FakeOracle::duplicate_of("existing-42", 0.97));

        let outcome = h.gate.ingest(candidate("Demo", 5.0, vec![1u8; 64])).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Duplicate {
                matched_id: "existing-42".to_string(),
                similarity: 0.97,
            }
        );
        assert_eq!(h.content.len(), 0);
        assert_eq!(h.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn invalid_metadata_fails_before_the_oracle_is_called() {
        let h = harness(FakeOracle::unique());

        let err = h.gate.ingest(candidate("", 5.0, vec![1u8; 8])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = h.gate.ingest(candidate("Demo", -1.0, vec![1u8; 8])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(h.oracle.calls(), 0);
        assert_eq!(h.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_before_the_oracle() {
        let h = harness(FakeOracle::unique());

        let err = h.gate.ingest(candidate("Demo", 5.0, Vec::new())).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.oracle.calls(), 0);
        assert_eq!(h.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn size_mismatch_is_rejected() {
        let h = harness(FakeOracle::unique());
        let mut c = candidate("Demo", 1.0, vec![1u8; 100]);
        c.declared_size = Some(99);

        let err = h.gate.ingest(c).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.oracle.calls(), 0);
    }

    #[tokio::test]
    async fn oracle_failure_is_surfaced_and_stores_nothing() {
        let h = harness(FakeOracle::unavailable());

        let err = h.gate.ingest(candidate("Demo", 5.0, vec![1u8; 8])).await.unwrap_err();
        assert!(matches!(err, AppError::Oracle(_)));
        assert_eq!(h.blobs.put_count(), 0);
        assert_eq!(h.content.len(), 0);
    }

    struct HangingOracle;

    #[async_trait]
    impl SimilarityOracle for HangingOracle {
        async fn compare(&self, _: Uuid, _: Bytes) -> Result<SimilarityVerdict> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn hanging_oracle_hits_the_deadline() {
        let blobs = MemoryBlobStore::new(Addressing::ContentHash);
        let gate = IngestionGate::new(
            Arc::new(MemoryContentStore::default()),
            Arc::new(blobs.clone()),
            Arc::new(HangingOracle),
            Arc::new(ManualClock::new()),
            Duration::from_millis(50),
        );

        let err = gate.ingest(candidate("Demo", 5.0, vec![1u8; 8])).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(blobs.put_count(), 0);
    }
}
