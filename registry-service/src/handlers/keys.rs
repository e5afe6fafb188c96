use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    dtos::keys::{AddKeyRequest, DeleteKeyQuery, KeyListResponse},
    middleware::RequireUser,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// SSH keys of the signed-in user
pub async fn list_user_keys(
    State(state): State<AppState>,
    RequireUser(principal): RequireUser,
) -> Result<impl IntoResponse, ServiceError> {
    let results = state.directory.list_keys(principal.uid).await?;
    Ok(Json(KeyListResponse { results }))
}

pub async fn add_user_key(
    State(state): State<AppState>,
    RequireUser(principal): RequireUser,
    ValidatedJson(req): ValidatedJson<AddKeyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let key = state
        .directory
        .add_key(principal.uid, &req.name, &req.key)
        .await?;
    tracing::info!(user = %principal.login, key_id = %key.id, "SSH key added");
    Ok((
        StatusCode::CREATED,
        Json(KeyListResponse { results: vec![key] }),
    ))
}

pub async fn delete_user_key(
    State(state): State<AppState>,
    RequireUser(principal): RequireUser,
    Query(query): Query<DeleteKeyQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    state.directory.delete_key(principal.uid, &query.id).await?;
    tracing::info!(user = %principal.login, key_id = %query.id, "SSH key deleted");
    Ok(StatusCode::NO_CONTENT)
}
