use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    dtos::clients::ListClientsQuery,
    middleware::CurrentClient,
    models::{ClientDraft, ClientPatch},
    services::{RegisteredClients, ServiceError},
    utils::ValidatedJson,
    AppState,
};

/// Register a new client
pub async fn create_client(
    State(state): State<AppState>,
    ValidatedJson(draft): ValidatedJson<ClientDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.registry.create(draft).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// List registered clients in creation order, one page at a time
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.registry.list(query.cursor()).await?;
    Ok(Json(page))
}

/// The record of the client that signed the request
pub async fn get_current_client(
    State(state): State<AppState>,
    CurrentClient(caller): CurrentClient,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.registry.get_current(&caller).await?;
    Ok(Json(client))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.registry.get(&id).await?;
    Ok(Json(client))
}

/// Partially update a client; absent fields are left untouched
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(patch): ValidatedJson<ClientPatch>,
) -> Result<impl IntoResponse, ServiceError> {
    let client = state.registry.update(&id, patch).await?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    state.registry.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
