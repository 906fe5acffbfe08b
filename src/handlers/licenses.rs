use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::session::Requester,
    state::AppState,
};

/// Revokes a license.
///
/// Allowed for the licensee and for the creator of the licensed content.
/// Revoking an unknown id succeeds.
pub async fn revoke_license(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    Path(license_id): Path<Uuid>,
) -> Result<Response> {
    let Some(license) = state.licenses.find(license_id).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    if license.user_id != requester.user_id {
        let is_creator = match state.catalog.get(license.content_id).await {
            Ok(content) => content.creator_id == requester.user_id,
            Err(AppError::NotFound) => false,
            Err(e) => return Err(e),
        };
        if !is_creator {
            tracing::warn!(
                "⛔ User {} may not revoke license {}",
                requester.user_id,
                license_id
            );
            return Err(AppError::Forbidden);
        }
    }

    state.licenses.revoke(license_id).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
