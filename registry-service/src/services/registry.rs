//! The client registry: create, read, list, update and delete registered
//! clients over an explicit [`ClientStore`].

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use super::{ClientStore, ServiceError};
use crate::models::{
    CallerIdentity, ClientDraft, ClientPage, ClientPatch, ClientType, ListCursor, Metadata,
    RegisteredClient,
};

/// The registry contract, served locally by [`ClientRegistry`] and remotely
/// by [`super::RegistryClient`].
#[async_trait]
pub trait RegisteredClients: Send + Sync {
    async fn create(&self, draft: ClientDraft) -> Result<RegisteredClient, ServiceError>;
    async fn get(&self, id: &str) -> Result<RegisteredClient, ServiceError>;
    /// The record of the client that authenticated the current request.
    async fn get_current(&self, caller: &CallerIdentity)
        -> Result<RegisteredClient, ServiceError>;
    async fn list(&self, cursor: ListCursor) -> Result<ClientPage, ServiceError>;
    async fn update(&self, id: &str, patch: ClientPatch)
        -> Result<RegisteredClient, ServiceError>;
    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLimits {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for PagingLimits {
    fn default() -> Self {
        Self {
            default_per_page: 100,
            max_per_page: 1000,
        }
    }
}

impl PagingLimits {
    /// Rejects page 0, substitutes the default for a zero page size and
    /// clamps oversized pages.
    pub fn resolve(&self, cursor: ListCursor) -> Result<ListCursor, ServiceError> {
        if cursor.page == 0 {
            return Err(ServiceError::InvalidCursor(
                "page numbers start at 1".to_string(),
            ));
        }
        let per_page = match cursor.per_page {
            0 => self.default_per_page,
            n => n.min(self.max_per_page),
        };
        Ok(ListCursor {
            page: cursor.page,
            per_page,
        })
    }
}

#[derive(Clone)]
pub struct ClientRegistry {
    store: Arc<dyn ClientStore>,
    paging: PagingLimits,
}

impl ClientRegistry {
    pub fn new(store: Arc<dyn ClientStore>, paging: PagingLimits) -> Self {
        Self { store, paging }
    }

    pub fn paging(&self) -> PagingLimits {
        self.paging
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.health_check().await
    }
}

#[async_trait]
impl RegisteredClients for ClientRegistry {
    async fn create(&self, draft: ClientDraft) -> Result<RegisteredClient, ServiceError> {
        draft
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;
        let client_type: ClientType = draft.client_type.parse()?;
        validate_metadata_keys(&draft.metadata)?;

        // Stored timestamps carry millisecond precision.
        let client = draft.into_client(client_type, Utc::now().trunc_subsecs(3));
        self.store.insert(&client).await?;

        tracing::info!(
            client_id = %client.id,
            client_name = %client.client_name,
            client_type = %client.client_type,
            "Registered client created"
        );
        Ok(client)
    }

    async fn get(&self, id: &str) -> Result<RegisteredClient, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::client_not_found(id))
    }

    async fn get_current(
        &self,
        caller: &CallerIdentity,
    ) -> Result<RegisteredClient, ServiceError> {
        self.store
            .get(&caller.client_id)
            .await?
            .ok_or_else(|| ServiceError::client_not_found(&caller.client_id))
    }

    async fn list(&self, cursor: ListCursor) -> Result<ClientPage, ServiceError> {
        let cursor = self.paging.resolve(cursor)?;
        let per_page = u64::from(cursor.per_page);
        let offset = u64::from(cursor.page - 1) * per_page;

        // One extra record tells whether another page follows.
        let mut clients = self.store.list(offset, per_page + 1).await?;
        let has_more = clients.len() as u64 > per_page;
        clients.truncate(cursor.per_page as usize);

        Ok(ClientPage {
            clients,
            page: cursor.page,
            per_page: cursor.per_page,
            has_more,
        })
    }

    async fn update(
        &self,
        id: &str,
        patch: ClientPatch,
    ) -> Result<RegisteredClient, ServiceError> {
        validate_metadata_keys(&patch.metadata)?;
        let patch = patch.normalized();

        let client = if patch.is_empty() {
            self.get(id).await?
        } else {
            self.store
                .update(id, &patch)
                .await?
                .ok_or_else(|| ServiceError::client_not_found(id))?
        };

        tracing::info!(
            client_id = %id,
            metadata_keys = ?patch.metadata.keys().collect::<Vec<_>>(),
            "Registered client updated"
        );
        Ok(client)
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if !self.store.delete(id).await? {
            return Err(ServiceError::client_not_found(id));
        }
        tracing::info!(client_id = %id, "Registered client deleted");
        Ok(())
    }
}

/// Metadata keys become document paths in the store.
pub fn validate_metadata_keys(metadata: &Metadata) -> Result<(), ServiceError> {
    for key in metadata.keys() {
        if key.is_empty() || key.contains('.') || key.starts_with('$') {
            return Err(ServiceError::Validation(format!(
                "invalid metadata key {key:?}: keys must be non-empty, contain no '.' and not start with '$'"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub clients: Vec<RegisteredClient>,
    /// False when the walk was cancelled before the last page.
    pub complete: bool,
}

/// Walks every page from the first, handing each page to `on_page` as it
/// arrives. Stops as soon as `cancel` fires, without fetching further pages.
/// Returns whether the final page was reached.
pub async fn for_each_page<F>(
    registry: &dyn RegisteredClients,
    per_page: u32,
    cancel: &CancellationToken,
    mut on_page: F,
) -> Result<bool, ServiceError>
where
    F: FnMut(ClientPage) + Send,
{
    let mut cursor = ListCursor::first(per_page);
    loop {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            page = registry.list(cursor) => page?,
        };

        let next = page.next_cursor();
        on_page(page);
        match next {
            Some(next) => cursor = next,
            None => return Ok(true),
        }
    }
}

pub async fn enumerate_clients(
    registry: &dyn RegisteredClients,
    per_page: u32,
    cancel: &CancellationToken,
) -> Result<Enumeration, ServiceError> {
    let mut clients = Vec::new();
    let complete = for_each_page(registry, per_page, cancel, |page| {
        clients.extend(page.clients)
    })
    .await?;
    Ok(Enumeration { clients, complete })
}
