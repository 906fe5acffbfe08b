use axum::http::StatusCode;

pub async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}
