pub mod cli;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RegistryConfig;
use crate::services::{
    AccountDirectory, ClientRegistry, ClientStore, JwtService, PagingLimits, SettingsGuard,
};

#[derive(Clone)]
pub struct AppState {
    pub config: RegistryConfig,
    pub registry: ClientRegistry,
    pub directory: Arc<dyn AccountDirectory>,
    pub settings: SettingsGuard,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        config: RegistryConfig,
        store: Arc<dyn ClientStore>,
        directory: Arc<dyn AccountDirectory>,
        jwt: JwtService,
    ) -> Self {
        let paging = PagingLimits {
            default_per_page: config.paging.default_per_page,
            max_per_page: config.paging.max_per_page,
        };
        let settings = SettingsGuard::new(directory.clone(), config.settings.org_list_per_page);
        Self {
            registry: ClientRegistry::new(store, paging),
            directory,
            settings,
            jwt,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Registry administration
    let admin_routes = Router::new()
        .route(
            "/registered-clients",
            post(handlers::create_client).get(handlers::list_clients),
        )
        .route(
            "/registered-clients/:id",
            get(handlers::get_client)
                .patch(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    // A registered client introspecting itself
    let client_routes = Router::new()
        .route(
            "/registered-clients/current",
            get(handlers::get_current_client),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::client_assertion_middleware,
        ));

    let settings_routes = Router::new()
        .route(
            "/:user/.settings/profile",
            get(handlers::profile).post(handlers::update_profile),
        )
        .route(
            "/:user/.settings/profile/avatar",
            post(handlers::update_avatar),
        )
        .route("/:user/.settings/keys", get(handlers::keys_page))
        .route(
            "/.api/user/keys",
            get(handlers::list_user_keys)
                .post(handlers::add_user_key)
                .delete(handlers::delete_user_key),
        );

    Router::new()
        .route("/health", get(health_check))
        .merge(admin_routes)
        .merge(client_routes)
        .merge(settings_routes)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins(&state.config.security.allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-request-id"),
                    HeaderName::from_static(ADMIN_API_KEY_HEADER_LOWER),
                ]),
        )
}

const ADMIN_API_KEY_HEADER_LOWER: &str = "x-admin-api-key";

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.registry.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Client store health check failed");
        AppError::ServiceUnavailable
    })?;

    state.directory.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Account directory health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "client_store": "up",
            "directory": "up"
        }
    })))
}
