use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::{sign_assertion, IdentityKey, RegisteredClients, ServiceError};
use crate::dtos::ErrorResponse;
use crate::middleware::admin::ADMIN_API_KEY_HEADER;
use crate::models::{
    CallerIdentity, ClientDraft, ClientPage, ClientPatch, ListCursor, RegisteredClient,
};

/// HTTP client for a remote registry server.
#[derive(Clone)]
pub struct RegistryClient {
    http: Client,
    base_url: String,
    admin_key: Option<String>,
    identity: Option<Arc<IdentityKey>>,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: None,
            identity: None,
        })
    }

    pub fn with_admin_key(mut self, admin_key: impl Into<String>) -> Self {
        self.admin_key = Some(admin_key.into());
        self
    }

    /// Key used to sign assertions for `get_current`.
    pub fn with_identity(mut self, identity: IdentityKey) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/registered-clients{}", self.base_url, path)
    }

    fn client_url(&self, id: &str) -> String {
        self.url(&format!("/{}", urlencoding::encode(id)))
    }

    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_key {
            Some(key) => request.header(ADMIN_API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }
        Err(Self::error_from(response).await)
    }

    async fn send_empty(request: RequestBuilder) -> Result<(), ServiceError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    /// Rebuilds the server's error kind from the response body.
    async fn error_from(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => ServiceError::from_code(&body.code, body.error),
            Err(_) if status == StatusCode::UNAUTHORIZED => {
                ServiceError::Unauthorized(format!("registry rejected the request ({status})"))
            }
            Err(_) => ServiceError::Transport(anyhow::anyhow!(
                "registry returned {status} without an error body"
            )),
        }
    }
}

#[async_trait]
impl RegisteredClients for RegistryClient {
    async fn create(&self, draft: ClientDraft) -> Result<RegisteredClient, ServiceError> {
        Self::send(self.admin(self.http.post(self.url("")).json(&draft))).await
    }

    async fn get(&self, id: &str) -> Result<RegisteredClient, ServiceError> {
        Self::send(self.admin(self.http.get(self.client_url(id)))).await
    }

    async fn get_current(
        &self,
        caller: &CallerIdentity,
    ) -> Result<RegisteredClient, ServiceError> {
        let identity = self
            .identity
            .as_ref()
            .filter(|identity| identity.id() == caller.client_id)
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!(
                    "no identity key loaded for client {}",
                    caller.client_id
                ))
            })?;
        let assertion = sign_assertion(identity)?;
        let request = self
            .http
            .get(self.url("/current"))
            .header(header::AUTHORIZATION, format!("Bearer {assertion}"));
        Self::send(request).await
    }

    async fn list(&self, cursor: ListCursor) -> Result<ClientPage, ServiceError> {
        let request = self
            .http
            .get(self.url(""))
            .query(&[("page", cursor.page), ("per_page", cursor.per_page)]);
        Self::send(self.admin(request)).await
    }

    async fn update(
        &self,
        id: &str,
        patch: ClientPatch,
    ) -> Result<RegisteredClient, ServiceError> {
        Self::send(self.admin(self.http.patch(self.client_url(id)).json(&patch))).await
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        Self::send_empty(self.admin(self.http.delete(self.client_url(id)))).await
    }
}
