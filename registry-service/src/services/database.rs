use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Cursor, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;

use super::{AccountDirectory, ClientStore, ServiceError};
use crate::models::{
    Account, ClientPatch, ClientType, EmailAddr, MemberRole, Metadata, OrgMembership,
    ProfileChange, RegisteredClient, SshPublicKey,
};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for registry-service");

        let creation_order = IndexModel::builder()
            .keys(doc! { "created_at": 1, "_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("creation_order".to_string())
                    .build(),
            )
            .build();
        self.create_index(&self.db.collection::<Document>("registered_clients"), creation_order)
            .await?;

        let account_uid = IndexModel::builder()
            .keys(doc! { "uid": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("uid_unique".to_string())
                    .build(),
            )
            .build();
        let account_login = IndexModel::builder()
            .keys(doc! { "login": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("login_unique".to_string())
                    .build(),
            )
            .build();
        let accounts = self.db.collection::<Document>("accounts");
        self.create_index(&accounts, account_uid).await?;
        self.create_index(&accounts, account_login).await?;

        let membership = IndexModel::builder()
            .keys(doc! { "member_uid": 1, "org_uid": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("member_org_unique".to_string())
                    .build(),
            )
            .build();
        self.create_index(&self.db.collection::<Document>("org_memberships"), membership)
            .await?;

        let email_owner = IndexModel::builder()
            .keys(doc! { "uid": 1 })
            .options(IndexOptions::builder().name("owner_lookup".to_string()).build())
            .build();
        self.create_index(&self.db.collection::<Document>("emails"), email_owner)
            .await?;

        let key_owner = IndexModel::builder()
            .keys(doc! { "uid": 1, "key_id": 1 })
            .options(IndexOptions::builder().name("owner_key_lookup".to_string()).build())
            .build();
        self.create_index(&self.db.collection::<Document>("ssh_keys"), key_owner)
            .await?;

        Ok(())
    }

    async fn create_index(
        &self,
        collection: &Collection<Document>,
        index: IndexModel,
    ) -> Result<(), AppError> {
        collection.create_index(index, None).await.map_err(|e| {
            tracing::error!(
                "Failed to create index on {} collection: {}",
                collection.name(),
                e
            );
            AppError::from(e)
        })?;
        tracing::info!(collection = %collection.name(), "Created index");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.ping().await.map_err(AppError::from)
    }

    async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                e
            })?;
        Ok(())
    }

    pub fn client_store(&self) -> MongoClientStore {
        MongoClientStore { db: self.clone() }
    }

    pub fn directory(&self) -> MongoDirectory {
        MongoDirectory { db: self.clone() }
    }

    fn registered_clients(&self) -> Collection<ClientDocument> {
        self.db.collection("registered_clients")
    }

    fn accounts(&self) -> Collection<Account> {
        self.db.collection("accounts")
    }

    fn memberships(&self) -> Collection<MembershipDocument> {
        self.db.collection("org_memberships")
    }

    fn emails(&self) -> Collection<EmailDocument> {
        self.db.collection("emails")
    }

    fn ssh_keys(&self) -> Collection<SshKeyDocument> {
        self.db.collection("ssh_keys")
    }
}

async fn collect_all<T: DeserializeOwned>(mut cursor: Cursor<T>) -> Result<Vec<T>, ServiceError> {
    let mut items = Vec::new();
    while cursor.advance().await? {
        items.push(cursor.deserialize_current()?);
    }
    Ok(items)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

/// Stored form of a registered client, keyed by its ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub client_name: String,
    pub client_uri: String,
    pub redirect_uris: Vec<String>,
    pub description: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub jwks: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<&RegisteredClient> for ClientDocument {
    fn from(client: &RegisteredClient) -> Self {
        Self {
            id: client.id.clone(),
            client_name: client.client_name.clone(),
            client_uri: client.client_uri.clone(),
            redirect_uris: client.redirect_uris.clone(),
            description: client.description.clone(),
            client_type: client.client_type,
            jwks: client.jwks.clone(),
            metadata: client.metadata.clone(),
            created_at: client.created_at,
        }
    }
}

impl From<ClientDocument> for RegisteredClient {
    fn from(doc: ClientDocument) -> Self {
        Self {
            id: doc.id,
            client_name: doc.client_name,
            client_uri: doc.client_uri,
            redirect_uris: doc.redirect_uris,
            description: doc.description,
            client_type: doc.client_type,
            jwks: doc.jwks,
            metadata: doc.metadata,
            created_at: doc.created_at,
        }
    }
}

/// `$set` document touching only the fields present in the patch. Metadata
/// entries are set individually so unrelated keys survive.
pub fn patch_update(patch: &ClientPatch) -> Document {
    let mut set = Document::new();
    if let Some(name) = &patch.client_name {
        set.insert("client_name", name.as_str());
    }
    if let Some(uri) = &patch.client_uri {
        set.insert("client_uri", uri.as_str());
    }
    if let Some(uris) = &patch.redirect_uris {
        set.insert(
            "redirect_uris",
            uris.iter().map(|u| Bson::String(u.clone())).collect::<Vec<_>>(),
        );
    }
    if let Some(description) = &patch.description {
        set.insert("description", description.as_str());
    }
    for (key, value) in &patch.metadata {
        set.insert(format!("metadata.{key}"), value.as_str());
    }
    doc! { "$set": set }
}

pub struct MongoClientStore {
    db: MongoDb,
}

#[async_trait]
impl ClientStore for MongoClientStore {
    async fn insert(&self, client: &RegisteredClient) -> Result<(), ServiceError> {
        match self
            .db
            .registered_clients()
            .insert_one(ClientDocument::from(client), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(ServiceError::DuplicateId(format!(
                "registered client {} already exists",
                client.id
            ))),
            Err(e) => Err(ServiceError::Database(e)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<RegisteredClient>, ServiceError> {
        Ok(self
            .db
            .registered_clients()
            .find_one(doc! { "_id": id }, None)
            .await?
            .map(RegisteredClient::from))
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<RegisteredClient>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .skip(offset)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let cursor = self.db.registered_clients().find(None, options).await?;
        Ok(collect_all(cursor)
            .await?
            .into_iter()
            .map(RegisteredClient::from)
            .collect())
    }

    async fn update(
        &self,
        id: &str,
        patch: &ClientPatch,
    ) -> Result<Option<RegisteredClient>, ServiceError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .db
            .registered_clients()
            .find_one_and_update(doc! { "_id": id }, patch_update(patch), options)
            .await?
            .map(RegisteredClient::from))
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self
            .db
            .registered_clients()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(self.db.ping().await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MembershipDocument {
    org_uid: i64,
    member_uid: i64,
    role: MemberRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailDocument {
    uid: i64,
    email: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SshKeyDocument {
    key_id: String,
    uid: i64,
    name: String,
    key: String,
}

impl From<SshKeyDocument> for SshPublicKey {
    fn from(doc: SshKeyDocument) -> Self {
        Self {
            id: doc.key_id,
            name: doc.name,
            key: doc.key,
        }
    }
}

pub struct MongoDirectory {
    db: MongoDb,
}

#[async_trait]
impl AccountDirectory for MongoDirectory {
    async fn find_account(&self, login: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self.db.accounts().find_one(doc! { "login": login }, None).await?)
    }

    async fn list_orgs(
        &self,
        member_uid: i64,
        limit: u32,
    ) -> Result<Vec<OrgMembership>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "org_uid": 1 })
            .limit(i64::from(limit))
            .build();
        let memberships = collect_all(
            self.db
                .memberships()
                .find(doc! { "member_uid": member_uid }, options)
                .await?,
        )
        .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let org_uids: Vec<i64> = memberships.iter().map(|m| m.org_uid).collect();
        let orgs: HashMap<i64, Account> = collect_all(
            self.db
                .accounts()
                .find(
                    doc! { "uid": { "$in": org_uids }, "is_organization": true },
                    None,
                )
                .await?,
        )
        .await?
        .into_iter()
        .map(|org| (org.uid, org))
        .collect();

        Ok(memberships
            .into_iter()
            .filter_map(|m| {
                orgs.get(&m.org_uid).map(|org| OrgMembership {
                    org: org.clone(),
                    role: m.role,
                })
            })
            .collect())
    }

    async fn apply_profile_change(
        &self,
        uid: i64,
        change: &ProfileChange,
    ) -> Result<Option<Account>, ServiceError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let mut set = Document::new();
        set.insert(change.field(), change.value());
        Ok(self
            .db
            .accounts()
            .find_one_and_update(doc! { "uid": uid }, doc! { "$set": set }, options)
            .await?)
    }

    async fn list_emails(&self, uid: i64) -> Result<Vec<EmailAddr>, ServiceError> {
        let cursor = self.db.emails().find(doc! { "uid": uid }, None).await?;
        Ok(collect_all(cursor)
            .await?
            .into_iter()
            .map(|doc| EmailAddr {
                email: doc.email,
                verified: doc.verified,
                primary: doc.primary,
            })
            .collect())
    }

    async fn list_keys(&self, uid: i64) -> Result<Vec<SshPublicKey>, ServiceError> {
        let cursor = self.db.ssh_keys().find(doc! { "uid": uid }, None).await?;
        Ok(collect_all(cursor)
            .await?
            .into_iter()
            .map(SshPublicKey::from)
            .collect())
    }

    async fn add_key(
        &self,
        uid: i64,
        name: &str,
        key: &str,
    ) -> Result<SshPublicKey, ServiceError> {
        let doc = SshKeyDocument {
            key_id: uuid::Uuid::new_v4().to_string(),
            uid,
            name: name.to_string(),
            key: key.to_string(),
        };
        self.db.ssh_keys().insert_one(&doc, None).await?;
        Ok(doc.into())
    }

    async fn delete_key(&self, uid: i64, key_id: &str) -> Result<(), ServiceError> {
        let result = self
            .db
            .ssh_keys()
            .delete_one(doc! { "uid": uid, "key_id": key_id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(ServiceError::NotFound(format!("SSH key {key_id} not found")));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(self.db.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginPolicy;
    use chrono::SubsecRound;
    use mongodb::bson;

    #[test]
    fn test_patch_update_sets_only_present_fields() {
        let patch = ClientPatch {
            client_uri: Some("https://new.example.com".to_string()),
            ..Default::default()
        }
        .with_login_policy(LoginPolicy::All);

        let update = patch_update(&patch);
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("client_uri").unwrap(), "https://new.example.com");
        assert_eq!(set.get_str("metadata.allow-logins").unwrap(), "all");
        assert!(set.get("client_name").is_none());
        assert!(set.get("metadata").is_none());
    }

    #[test]
    fn test_client_document_uses_id_as_primary_key() {
        let client = RegisteredClient {
            id: "abc".to_string(),
            client_name: "n".to_string(),
            client_uri: String::new(),
            redirect_uris: vec!["https://cb".to_string()],
            description: String::new(),
            client_type: ClientType::Agent,
            jwks: "{}".to_string(),
            metadata: Metadata::new(),
            created_at: Utc::now().trunc_subsecs(3),
        };

        let document = bson::to_document(&ClientDocument::from(&client)).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "abc");
        assert_eq!(document.get_str("type").unwrap(), "AgentType");
        assert!(document.get_datetime("created_at").is_ok());

        let back: ClientDocument = bson::from_document(document).unwrap();
        assert_eq!(RegisteredClient::from(back), client);
    }
}
