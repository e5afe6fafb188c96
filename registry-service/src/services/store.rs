use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::ServiceError;
use crate::models::{ClientPatch, RegisteredClient};

/// Backing store of the client registry. Implementations provide
/// per-record atomicity for each call; ordering is creation order.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Inserts a new client, failing with `DuplicateId` if the ID is taken.
    async fn insert(&self, client: &RegisteredClient) -> Result<(), ServiceError>;
    async fn get(&self, id: &str) -> Result<Option<RegisteredClient>, ServiceError>;
    /// Returns up to `limit` clients in creation order, skipping `offset`.
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<RegisteredClient>, ServiceError>;
    /// Applies a normalized patch, returning the updated record or `None`
    /// when no client has this ID.
    async fn update(
        &self,
        id: &str,
        patch: &ClientPatch,
    ) -> Result<Option<RegisteredClient>, ServiceError>;
    /// Removes a client, returning whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, ServiceError>;
    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// In-process store used by tests and local development.
#[derive(Default)]
pub struct MemoryClientStore {
    clients: Mutex<Vec<RegisteredClient>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<RegisteredClient>>, ServiceError> {
        self.clients
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Client store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn insert(&self, client: &RegisteredClient) -> Result<(), ServiceError> {
        let mut clients = self.lock()?;
        if clients.iter().any(|existing| existing.id == client.id) {
            return Err(ServiceError::DuplicateId(format!(
                "registered client {} already exists",
                client.id
            )));
        }
        clients.push(client.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<RegisteredClient>, ServiceError> {
        Ok(self.lock()?.iter().find(|client| client.id == id).cloned())
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<RegisteredClient>, ServiceError> {
        let clients = self.lock()?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(clients.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn update(
        &self,
        id: &str,
        patch: &ClientPatch,
    ) -> Result<Option<RegisteredClient>, ServiceError> {
        let mut clients = self.lock()?;
        Ok(clients.iter_mut().find(|client| client.id == id).map(|client| {
            patch.apply_to(client);
            client.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let mut clients = self.lock()?;
        let before = clients.len();
        clients.retain(|client| client.id != id);
        Ok(clients.len() != before)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientType;
    use chrono::Utc;

    fn client(id: &str) -> RegisteredClient {
        RegisteredClient {
            id: id.to_string(),
            client_name: format!("client {id}"),
            client_uri: String::new(),
            redirect_uris: vec![],
            description: String::new(),
            client_type: ClientType::Other,
            jwks: "{}".to_string(),
            metadata: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_without_change() {
        let store = MemoryClientStore::new();
        store.insert(&client("a")).await.unwrap();

        let mut again = client("a");
        again.client_name = "impostor".to_string();
        let err = store.insert(&again).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateId(_)));

        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.client_name, "client a");
        assert_eq!(store.list(0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let store = MemoryClientStore::new();
        for id in ["c", "a", "b"] {
            store.insert(&client(id)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list(1, 5)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing() {
        let store = MemoryClientStore::new();
        assert!(store
            .update("missing", &ClientPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete("missing").await.unwrap());

        store.insert(&client("x")).await.unwrap();
        assert!(store.delete("x").await.unwrap());
        assert!(!store.delete("x").await.unwrap());
    }
}
