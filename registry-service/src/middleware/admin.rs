use crate::{services::ServiceError, AppState};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ADMIN_API_KEY_HEADER: &str = "X-Admin-Api-Key";

/// Guards the registry administration routes with the shared admin API key.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if key == state.config.security.admin_api_key => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Failed admin authentication attempt");
            ServiceError::Unauthorized("Invalid or missing admin API key".to_string())
                .into_response()
        }
    }
}
