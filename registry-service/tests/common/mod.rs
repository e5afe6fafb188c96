//! Test helpers for registry-service integration tests.
//!
//! Everything runs against the in-memory store and directory, so no test
//! needs MongoDB.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use registry_service::{
    build_router,
    config::{
        Environment, JwtConfig, MongoConfig, PagingConfig, RegistryConfig, SecurityConfig,
        SettingsConfig,
    },
    middleware::admin::ADMIN_API_KEY_HEADER,
    models::{Account, Principal},
    services::{IdentityKey, JwtService, MemoryClientStore, MemoryDirectory},
    AppState,
};
use service_core::config::Config;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

pub const USER_TOKEN_KEY: &str = include_str!("../fixtures/user-token.pem");
pub const USER_TOKEN_PUB: &str = include_str!("../fixtures/user-token.pub.pem");
pub const RSA_2048: &str = include_str!("../fixtures/rsa2048.pem");
pub const ED25519: &str = include_str!("../fixtures/ed25519.pem");

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const ACME: i64 = 10;

pub fn test_config() -> RegistryConfig {
    RegistryConfig {
        common: Config::default(),
        environment: Environment::Dev,
        service_name: "registry-service-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "registry_test".to_string(),
        },
        jwt: JwtConfig {
            public_key_path: "unused".to_string(),
            private_key_path: None,
            access_token_expiry_minutes: 15,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_api_key: TEST_ADMIN_API_KEY.to_string(),
        },
        paging: PagingConfig {
            default_per_page: 100,
            max_per_page: 1000,
        },
        settings: SettingsConfig {
            org_list_per_page: 100,
            login_url: "/login".to_string(),
        },
    }
}

pub fn user(uid: i64, login: &str) -> Account {
    Account {
        uid,
        login: login.to_string(),
        name: String::new(),
        avatar_url: String::new(),
        is_organization: false,
    }
}

pub fn org(uid: i64, login: &str) -> Account {
    Account {
        is_organization: true,
        ..user(uid, login)
    }
}

pub fn identity_key(pem: &str) -> IdentityKey {
    IdentityKey::from_pem(pem).expect("fixture key parses")
}

/// Test application wired to in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub directory: Arc<MemoryDirectory>,
}

impl TestApp {
    /// Alice and Bob are users; Acme is an organization with no members.
    pub fn spawn() -> Self {
        Self::with_directory(MemoryDirectory::new())
    }

    pub fn with_directory(directory: MemoryDirectory) -> Self {
        let directory = Arc::new(directory);
        directory.add_account(user(ALICE, "alice")).unwrap();
        directory.add_account(user(BOB, "bob")).unwrap();
        directory.add_account(org(ACME, "acme")).unwrap();

        let jwt = JwtService::from_pem(USER_TOKEN_PUB, Some(USER_TOKEN_KEY), 15)
            .expect("Failed to create JWT service");
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryClientStore::new()),
            directory.clone(),
            jwt,
        );

        Self {
            router: build_router(state.clone()),
            state,
            directory,
        }
    }

    pub fn token_for(&self, uid: i64, login: &str) -> String {
        self.state
            .jwt
            .generate_access_token(&Principal {
                uid,
                login: login.to_string(),
            })
            .expect("Failed to issue session token")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub fn admin_request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ADMIN_API_KEY_HEADER, TEST_ADMIN_API_KEY);
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub fn as_user(method: Method, uri: &str, token: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
