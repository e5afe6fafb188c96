//! Registry administration routes.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{body_json, identity_key, TestApp, ED25519, RSA_2048};
use registry_service::services::sign_assertion;
use serde_json::json;

fn draft(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "client_name": format!("Client {id}"),
        "client_uri": format!("https://{id}.example.com"),
        "redirect_uris": [format!("https://{id}.example.com/callback")],
        "description": "integration test client",
        "type": "ServerType",
        "jwks": "{\"keys\":[]}",
    })
}

async fn create(app: &TestApp, body: serde_json::Value) -> axum::http::Response<Body> {
    app.send(TestApp::admin_request(
        Method::POST,
        "/registered-clients",
        Some(body),
    ))
    .await
}

#[tokio::test]
async fn create_then_get_returns_stored_client() {
    let app = TestApp::spawn();

    let response = create(&app, draft("alpha")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["id"], "alpha");
    assert_eq!(created["type"], "ServerType");
    assert!(created["created_at"].is_string());
    assert!(created["metadata"].as_object().unwrap().is_empty());

    let response = app
        .send(TestApp::admin_request(Method::GET, "/registered-clients/alpha", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, created);
}

#[tokio::test]
async fn duplicate_id_is_conflict() {
    let app = TestApp::spawn();
    assert_eq!(create(&app, draft("dup")).await.status(), StatusCode::CREATED);

    let response = create(&app, draft("dup")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "duplicate_id");
}

#[tokio::test]
async fn unknown_type_lists_choices() {
    let app = TestApp::spawn();
    let mut body = draft("typed");
    body["type"] = json!("UnknownType");

    let response = create(&app, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "invalid_type");
    let message = error["error"].as_str().unwrap();
    assert!(message.contains("ServerType"));
    assert!(message.contains("AgentType"));
    assert!(message.contains("OtherType"));
}

#[tokio::test]
async fn missing_id_is_validation_error() {
    let app = TestApp::spawn();
    let response = create(&app, draft("")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "validation");
}

#[tokio::test]
async fn admin_routes_require_api_key() {
    let app = TestApp::spawn();

    let missing = Request::builder()
        .uri("/registered-clients")
        .body(Body::empty())
        .unwrap();
    let response = app.send(missing).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthorized");

    let wrong = Request::builder()
        .uri("/registered-clients")
        .header("X-Admin-Api-Key", "nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(wrong).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_pages_in_creation_order() {
    let app = TestApp::spawn();
    for id in ["c1", "c2", "c3"] {
        assert_eq!(create(&app, draft(id)).await.status(), StatusCode::CREATED);
    }

    let response = app
        .send(TestApp::admin_request(
            Method::GET,
            "/registered-clients?page=1&per_page=2",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["has_more"], true);
    let ids: Vec<_> = first["clients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["c1", "c2"]);

    let second = body_json(
        app.send(TestApp::admin_request(
            Method::GET,
            "/registered-clients?page=2&per_page=2",
            None,
        ))
        .await,
    )
    .await;
    assert_eq!(second["has_more"], false);
    assert_eq!(second["clients"][0]["id"], "c3");
    assert_eq!(second["clients"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_rejects_page_zero() {
    let app = TestApp::spawn();
    let response = app
        .send(TestApp::admin_request(
            Method::GET,
            "/registered-clients?page=0",
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_cursor");
}

#[tokio::test]
async fn patch_merges_metadata_and_keeps_other_fields() {
    let app = TestApp::spawn();
    let mut body = draft("meta");
    body["metadata"] = json!({ "owner": "platform" });
    create(&app, body).await;

    let response = app
        .send(TestApp::admin_request(
            Method::PATCH,
            "/registered-clients/meta",
            Some(json!({ "metadata": { "allow-logins": "all" }, "client_name": "" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["client_name"], "Client meta");
    assert_eq!(updated["metadata"]["owner"], "platform");
    assert_eq!(updated["metadata"]["allow-logins"], "all");
}

#[tokio::test]
async fn delete_twice_is_not_found() {
    let app = TestApp::spawn();
    create(&app, draft("gone")).await;

    let response = app
        .send(TestApp::admin_request(Method::DELETE, "/registered-clients/gone", None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(TestApp::admin_request(Method::DELETE, "/registered-clients/gone", None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "not_found");
}

#[tokio::test]
async fn current_authenticates_with_signed_assertion() {
    let app = TestApp::spawn();

    for pem in [RSA_2048, ED25519] {
        let key = identity_key(pem);
        let mut body = draft(key.id());
        body["jwks"] = json!(key.marshal_jwks().unwrap());
        assert_eq!(create(&app, body).await.status(), StatusCode::CREATED);

        let request = Request::builder()
            .uri("/registered-clients/current")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", sign_assertion(&key).unwrap()),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], key.id());
    }
}

#[tokio::test]
async fn current_rejects_unregistered_or_mismatched_keys() {
    let app = TestApp::spawn();
    let registered = identity_key(RSA_2048);
    let other = identity_key(ED25519);

    // Registered under the RSA key's ID, but carrying the Ed25519 JWKS.
    let mut body = draft(registered.id());
    body["jwks"] = json!(other.marshal_jwks().unwrap());
    create(&app, body).await;

    for key in [&registered, &other] {
        let request = Request::builder()
            .uri("/registered-clients/current")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", sign_assertion(key).unwrap()),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let anonymous = Request::builder()
        .uri("/registered-clients/current")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(anonymous).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_backends() {
    let app = TestApp::spawn();
    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "registry-service-test");
    assert_eq!(body["checks"]["client_store"], "up");
}
