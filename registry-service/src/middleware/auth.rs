use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;

use crate::{models::Principal, services::ServiceError, AppState};

/// Cookie carrying the user session token for browser requests.
pub const SESSION_COOKIE: &str = "access_token";

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The principal behind a request, if any. A token that is present but
/// invalid rejects the request rather than downgrading it to anonymous.
pub struct Session(pub Option<Principal>);

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => Some(token.to_string()),
            None => CookieJar::from_headers(&parts.headers)
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| !value.is_empty()),
        };

        let Some(token) = token else {
            return Ok(Session(None));
        };

        match state.jwt.validate_access_token(&token) {
            Ok(principal) => Ok(Session(Some(principal))),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected session token");
                Err(e)
            }
        }
    }
}

/// Like [`Session`], but an anonymous request fails with
/// `AuthenticationRequired`. Used by the JSON API routes, which cannot
/// redirect to a login page.
pub struct RequireUser(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Session(principal) = Session::from_request_parts(parts, state).await?;
        principal
            .map(RequireUser)
            .ok_or(ServiceError::AuthenticationRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok.en"));
        assert_eq!(bearer_token(&headers), Some("tok.en"));
    }
}
