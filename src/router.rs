use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the HTTP surface.
///
/// Rate limiting and CORS are added by the caller, since the governor needs
/// the peer address from `ConnectInfo`.
pub fn build(state: AppState) -> Router {
    let public_routes = Router::new().route("/healthz", get(handlers::health::healthz));

    let protected_routes = Router::new()
        .route(
            "/api/content",
            get(handlers::content::list_content).post(handlers::content::create_content),
        )
        .route("/api/content/{content_id}", get(handlers::content::get_content))
        .route(
            "/api/content/{content_id}/data",
            get(handlers::content::get_content_data),
        )
        .route(
            "/api/content/{content_id}/purchase",
            post(handlers::content::purchase_content),
        )
        .route(
            "/api/content/{content_id}/session-key",
            post(handlers::content::issue_session_key),
        )
        .route(
            "/api/licenses/{license_id}",
            delete(handlers::licenses::revoke_license),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
}
