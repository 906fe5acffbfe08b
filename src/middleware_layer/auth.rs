use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    models::session::Requester,
    state::AppState,
};

/// Extracts the session token from the request.
///
/// # Arguments
///
/// * `request` - The incoming request.
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// The bearer token if present, otherwise the `session_id` cookie.
fn extract_session_token(request: &Request<Body>, cookies: &Cookies) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        cookies
            .get("session_id")
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// A middleware that requires a verified requester.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `AppError::Authentication` when no valid session is found.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_session_token(&request, &cookies).ok_or_else(|| {
        tracing::warn!("❌ No bearer token or session_id cookie found");
        AppError::Authentication("Missing session".to_string())
    })?;

    let user_id = state
        .identity
        .resolve(&token)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid or expired session".to_string()))?;

    tracing::debug!("✅ User authenticated: {}", user_id);

    request.extensions_mut().insert(Requester { user_id });

    Ok(next.run(request).await)
}
