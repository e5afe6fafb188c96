use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::auth::bearer_token;
use crate::{
    models::CallerIdentity,
    services::{assertion_key_id, verify_assertion, RegisteredClients, ServiceError},
    AppState,
};

/// Authenticates a registered client from the signed assertion in the
/// `Authorization` header and stores its [`CallerIdentity`] in the request
/// extensions.
pub async fn client_assertion_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed client authentication attempt");
            e.into_response()
        }
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CallerIdentity, ServiceError> {
    let token = bearer_token(headers).ok_or_else(|| {
        ServiceError::Unauthorized("Missing client assertion".to_string())
    })?;

    let client_id = assertion_key_id(token)?;
    let client = match state.registry.get(&client_id).await {
        Ok(client) => client,
        Err(ServiceError::NotFound(_)) => {
            return Err(ServiceError::Unauthorized(format!(
                "Client {client_id} is not registered"
            )))
        }
        Err(e) => return Err(e),
    };

    verify_assertion(token, &client)
}

/// Extractor for the client authenticated by [`client_assertion_middleware`].
pub struct CurrentClient(pub CallerIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentClient
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(CurrentClient)
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "Client identity missing from request extensions"
                ))
            })
    }
}
