use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::{AppError, Result},
    models::content::{Content, ContentMetadata},
    models::session::Requester,
    services::ingestion::{Candidate, IngestOutcome},
    state::AppState,
};

/// Serializes `value` and sets the JSON content type.
pub(crate) fn json_response(status: StatusCode, value: sonic_rs::Value) -> Result<Response> {
    let body = sonic_rs::to_string(&value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))?;
    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

fn content_json(content: &Content) -> sonic_rs::Value {
    sonic_rs::json!({
        "content_id": content.id.to_string(),
        "title": content.title.clone(),
        "description": content.description.clone(),
        "price": content.price,
        "creator_id": content.creator_id.to_string(),
        "file_size": content.file_size,
        "created_at": content.created_at.to_rfc3339()
    })
}

/// Lowercased `.ext` of an uploaded file name, if it has one.
fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Reads one field body, giving up once `deadline` passes.
async fn read_part<T>(
    deadline: Duration,
    name: &str,
    read: impl Future<Output = std::result::Result<T, MultipartError>>,
) -> Result<T> {
    match timeout(deadline, read).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AppError::Multipart(format!("{}: {}", name, e))),
        Err(_) => Err(AppError::Multipart("Upload timeout exceeded".into())),
    }
}

/// Uploads new content.
///
/// Expects a multipart body with a `data` field holding the JSON metadata,
/// a `content` file field and an optional `file_size` field.
///
/// # Returns
///
/// `201` with the new id, or `409` when the oracle reports a duplicate.
pub async fn create_content(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut metadata: Option<ContentMetadata> = None;
    let mut file: Option<(Bytes, Option<String>)> = None;
    let mut declared_size: Option<i64> = None;

    let deadline = state.config.request_timeout;

    loop {
        let field = match timeout(deadline, multipart.next_field()).await {
            Ok(Ok(Some(field))) => field,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(AppError::Multipart(format!("Parse error: {}", e))),
            Err(_) => return Err(AppError::Multipart("Upload timeout exceeded".into())),
        };

        match field.name().unwrap_or("") {
            "data" => {
                let raw = read_part(deadline, "data", field.bytes()).await?;
                let parsed: ContentMetadata = sonic_rs::from_slice(&raw)
                    .map_err(|e| AppError::Validation(format!("Invalid metadata: {}", e)))?;
                metadata = Some(parsed);
            }
            "content" => {
                let extension = field.file_name().and_then(extension_of);
                let bytes = read_part(deadline, "content", field.bytes()).await?;
                file = Some((bytes, extension));
            }
            "file_size" => {
                let raw = read_part(deadline, "file_size", field.text()).await?;
                declared_size = Some(raw.trim().parse().map_err(|_| {
                    AppError::Validation(format!("Invalid file_size: {}", raw.trim()))
                })?);
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field {:?}", other);
            }
        }
    }

    let metadata = metadata.ok_or_else(|| AppError::Validation("Missing data field".into()))?;
    let (bytes, extension) =
        file.ok_or_else(|| AppError::Validation("Missing content file".into()))?;

    tracing::info!(
        "📥 Upload from {}: {:?} ({} bytes)",
        requester.user_id,
        metadata.title,
        bytes.len()
    );

    let outcome = state
        .ingestion
        .ingest(Candidate {
            creator_id: requester.user_id,
            metadata,
            bytes,
            declared_size,
            extension,
        })
        .await?;

    match outcome {
        IngestOutcome::Accepted {
            content_id,
            similarity,
        } => json_response(
            StatusCode::CREATED,
            sonic_rs::json!({
                "created": true,
                "content_id": content_id.to_string(),
                "similarity": similarity
            }),
        ),
        IngestOutcome::Duplicate {
            matched_id,
            similarity,
        } => json_response(
            StatusCode::CONFLICT,
            sonic_rs::json!({
                "created": false,
                "similar_id": matched_id,
                "similarity": similarity
            }),
        ),
    }
}

/// Lists all content with a `purchased` flag for the caller.
pub async fn list_content(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<Response> {
    let entries = state.catalog.list(requester.user_id).await?;

    let items: Vec<_> = entries
        .iter()
        .map(|entry| {
            sonic_rs::json!({
                "content_id": entry.content.id.to_string(),
                "title": entry.content.title.clone(),
                "price": entry.content.price,
                "creator_id": entry.content.creator_id.to_string(),
                "purchased": entry.purchased
            })
        })
        .collect();

    json_response(
        StatusCode::OK,
        sonic_rs::json!({
            "count": items.len(),
            "content": items
        }),
    )
}

/// Returns the metadata of one content item.
pub async fn get_content(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
) -> Result<Response> {
    let content = state.catalog.get(content_id).await?;
    json_response(StatusCode::OK, content_json(&content))
}

/// Streams the bytes to a creator or licensee.
pub async fn get_content_data(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(content_id): Path<Uuid>,
) -> Result<Response> {
    let (content, stream) = state.catalog.open(requester.user_id, content_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.file_size));

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// Grants the caller a license on existing content.
pub async fn purchase_content(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(content_id): Path<Uuid>,
) -> Result<Response> {
    let content = state.catalog.get(content_id).await?;

    let expires_at = state.clock.now() + state.config.license_duration;
    let license = state
        .licenses
        .generate(requester.user_id, content.id, expires_at)
        .await?;

    tracing::info!(
        "💳 User {} purchased content {} for {:.2}",
        requester.user_id,
        content.id,
        content.price
    );

    json_response(
        StatusCode::CREATED,
        sonic_rs::json!({
            "license_id": license.id.to_string(),
            "content_id": license.content_id.to_string(),
            "user_id": license.user_id.to_string(),
            "expires_at": license.expires_at.to_rfc3339(),
            "created_at": license.created_at.to_rfc3339()
        }),
    )
}

/// Returns the caller's current session key for the content, base64-encoded.
pub async fn issue_session_key(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(content_id): Path<Uuid>,
) -> Result<Response> {
    let content = state.access.authorize(requester.user_id, content_id).await?;
    let key = state
        .session_keys
        .get_or_create(requester.user_id, content.id)
        .await?;

    json_response(
        StatusCode::OK,
        sonic_rs::json!({ "key": STANDARD.encode(key.as_bytes()) }),
    )
}
