use async_trait::async_trait;
use axum::body::Bytes;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// The oracle's answer for one candidate upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimilarityVerdict {
    /// The closest known asset.
    #[serde(rename = "video_id")]
    pub matched_id: String,
    /// Similarity to that asset.
    #[serde(rename = "max_similarity")]
    pub similarity: f64,
    /// Whether the candidate counts as a duplicate.
    #[serde(rename = "similar")]
    pub is_duplicate: bool,
}

/// Perceptual-similarity comparator for uploaded video bytes.
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    async fn compare(&self, content_id: Uuid, bytes: Bytes) -> Result<SimilarityVerdict>;
}

/// Talks to the oracle over HTTP with a multipart upload.
#[derive(Clone)]
pub struct HttpSimilarityOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpSimilarityOracle {
    /// Creates a client whose requests fail after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build oracle client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SimilarityOracle for HttpSimilarityOracle {
    async fn compare(&self, content_id: Uuid, bytes: Bytes) -> Result<SimilarityVerdict> {
        let size = bytes.len();
        let file_part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name("file.mp4")
            .mime_str("application/octet-stream")?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("file_id", content_id.to_string());

        tracing::debug!("🔍 Asking similarity oracle about {} ({} bytes)", content_id, size);

        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Oracle(format!("oracle answered {}", status)));
        }

        let body = response.bytes().await?;
        let verdict: SimilarityVerdict = sonic_rs::from_slice(&body)
            .map_err(|e| AppError::Oracle(format!("Malformed oracle response: {}", e)))?;

        tracing::debug!(
            "🔍 Oracle verdict for {}: closest={}, score={:.4}, duplicate={}",
            content_id,
            verdict.matched_id,
            verdict.similarity,
            verdict.is_duplicate
        );

        Ok(verdict)
    }
}

#[cfg(test)]
pub use fake::FakeOracle;


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Multipart, routing::post, Router};
    use std::net::SocketAddr;

    async fn spawn_oracle(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn verdict_parses_wire_format() {
        let verdict: SimilarityVerdict = sonic_rs::from_str(
            r#"{"video_id":"abc","max_similarity":0.97,"similar":true}"#,
        )
        .unwrap();
        assert_eq!(verdict.matched_id, "abc");
        assert!(verdict.is_duplicate);
        assert!((verdict.similarity - 0.97).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn sends_file_and_id_and_reads_verdict() {
        let router = Router::new().route(
            "/compare-video-bytes/",
            post(|mut multipart: Multipart| async move {
                let mut file_len = 0usize;
                let mut file_id = String::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    match field.name().unwrap_or("") {
                        "file" => {
                            assert_eq!(field.file_name(), Some("file.mp4"));
                            file_len = field.bytes().await.unwrap().len();
                        }
                        "file_id" => file_id = field.text().await.unwrap(),
                        _ => {}
                    }
                }
                format!(
                    r#"{{"video_id":"{}","max_similarity":{},"similar":false}}"#,
                    file_id, file_len
                )
            }),
        );
        let addr = spawn_oracle(router).await;

        let oracle = HttpSimilarityOracle::new(
            format!("http://{}/compare-video-bytes/", addr),
            Duration::from_secs(5),
        )
        .unwrap();

        let id = Uuid::new_v4();
        let verdict = oracle.compare(id, Bytes::from(vec![1u8; 321])).await.unwrap();
        assert_eq!(verdict.matched_id, id.to_string());
        assert_eq!(verdict.similarity, 321.0);
        assert!(!verdict.is_duplicate);
    }

    #[tokio::test]
    async fn non_success_status_is_an_oracle_error() {
        let router = Router::new().route(
            "/compare",
            post(|| async { (http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let addr = spawn_oracle(router).await;
        let oracle = HttpSimilarityOracle::new(
            format!("http://{}/compare", addr),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = oracle.compare(Uuid::new_v4(), Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, AppError::Oracle(_)));
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let router = Router::new().route(
            "/compare",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let addr = spawn_oracle(router).await;
        let oracle = HttpSimilarityOracle::new(
            format!("http://{}/compare", addr),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = oracle.compare(Uuid::new_v4(), Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
