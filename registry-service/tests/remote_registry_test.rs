//! The HTTP registry client against a live server: error kinds survive the
//! round trip and the client can identify itself.

mod common;

use common::{identity_key, TestApp, ED25519, RSA_2048, TEST_ADMIN_API_KEY};
use registry_service::models::{
    CallerIdentity, ClientDraft, ClientPatch, ListCursor, LoginPolicy,
};
use registry_service::services::{
    enumerate_clients, RegisteredClients, RegistryClient, ServiceError,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn serve(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server error");
    });
    format!("http://{addr}")
}

fn draft(id: &str, jwks: String) -> ClientDraft {
    ClientDraft {
        id: id.to_string(),
        client_name: format!("Client {id}"),
        client_type: "AgentType".to_string(),
        jwks,
        ..Default::default()
    }
}

#[tokio::test]
async fn remote_crud_matches_local_semantics() {
    let app = TestApp::spawn();
    let base_url = serve(&app).await;
    let registry = RegistryClient::new(&base_url)
        .unwrap()
        .with_admin_key(TEST_ADMIN_API_KEY);

    let created = registry
        .create(draft("remote-1", "{\"keys\":[]}".to_string()))
        .await
        .unwrap();
    assert_eq!(created.client_name, "Client remote-1");
    assert_eq!(registry.get("remote-1").await.unwrap(), created);

    let err = registry
        .create(draft("remote-1", "{\"keys\":[]}".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateId(_)), "{err:?}");

    let mut bad = draft("remote-2", "{\"keys\":[]}".to_string());
    bad.client_type = "UnknownType".to_string();
    let err = registry.create(bad).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidType(_)), "{err:?}");

    let updated = registry
        .update(
            "remote-1",
            ClientPatch::default().with_login_policy(LoginPolicy::All),
        )
        .await
        .unwrap();
    assert_eq!(updated.login_policy(), LoginPolicy::All);

    let page = registry.list(ListCursor::first(10)).await.unwrap();
    assert_eq!(page.clients.len(), 1);
    assert!(!page.has_more);

    registry.delete("remote-1").await.unwrap();
    let err = registry.delete("remote-1").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn remote_without_admin_key_is_unauthorized() {
    let app = TestApp::spawn();
    let base_url = serve(&app).await;
    let registry = RegistryClient::new(&base_url).unwrap();

    let err = registry.list(ListCursor::first(10)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err:?}");
}

#[tokio::test]
async fn remote_get_current_signs_with_identity_key() {
    let app = TestApp::spawn();
    let base_url = serve(&app).await;
    let admin = RegistryClient::new(&base_url)
        .unwrap()
        .with_admin_key(TEST_ADMIN_API_KEY);

    let key = identity_key(ED25519);
    admin
        .create(draft(key.id(), key.marshal_jwks().unwrap()))
        .await
        .unwrap();

    let caller = CallerIdentity {
        client_id: key.id().to_string(),
    };
    let client = RegistryClient::new(&base_url)
        .unwrap()
        .with_identity(identity_key(ED25519));
    let current = client.get_current(&caller).await.unwrap();
    assert_eq!(current.id, key.id());

    // A key that was never registered cannot authenticate.
    let stranger = identity_key(RSA_2048);
    let caller = CallerIdentity {
        client_id: stranger.id().to_string(),
    };
    let client = RegistryClient::new(&base_url)
        .unwrap()
        .with_identity(stranger);
    let err = client.get_current(&caller).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)), "{err:?}");
}

#[tokio::test]
async fn remote_enumeration_walks_every_page() {
    let app = TestApp::spawn();
    let base_url = serve(&app).await;
    let registry = RegistryClient::new(&base_url)
        .unwrap()
        .with_admin_key(TEST_ADMIN_API_KEY);

    for i in 0..5 {
        registry
            .create(draft(&format!("walk-{i}"), "{\"keys\":[]}".to_string()))
            .await
            .unwrap();
    }

    let enumeration = enumerate_clients(&registry, 2, &CancellationToken::new())
        .await
        .unwrap();
    assert!(enumeration.complete);
    let ids: Vec<_> = enumeration.clients.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["walk-0", "walk-1", "walk-2", "walk-3", "walk-4"]);
}
