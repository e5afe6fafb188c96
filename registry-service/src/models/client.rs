use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::services::ServiceError;

/// Metadata key holding the client's login policy.
pub const ALLOW_LOGINS_KEY: &str = "allow-logins";

/// Extensible policy bag attached to a registered client. Keys other than
/// [`ALLOW_LOGINS_KEY`] are preserved verbatim on every update.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClientType {
    #[serde(rename = "ServerType")]
    Server,
    #[serde(rename = "AgentType")]
    Agent,
    #[serde(rename = "OtherType")]
    Other,
}

impl ClientType {
    pub const ALL: [ClientType; 3] = [ClientType::Server, ClientType::Agent, ClientType::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Server => "ServerType",
            ClientType::Agent => "AgentType",
            ClientType::Other => "OtherType",
        }
    }

    /// Comma-separated list of accepted type names, for error messages.
    pub fn choices() -> String {
        Self::ALL
            .iter()
            .map(ClientType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ServerType" => Ok(ClientType::Server),
            "AgentType" => Ok(ClientType::Agent),
            "OtherType" => Ok(ClientType::Other),
            other => Err(ServiceError::invalid_type(other)),
        }
    }
}

/// Whether arbitrary users may authenticate through a client, or only
/// explicitly provisioned ones.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoginPolicy {
    #[default]
    Restricted,
    All,
}

impl LoginPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginPolicy::Restricted => "restricted",
            LoginPolicy::All => "all",
        }
    }

    /// Lenient read of a stored policy: absent or unrecognized values are
    /// restricted.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        metadata
            .get(ALLOW_LOGINS_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for LoginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse used for caller input.
impl FromStr for LoginPolicy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restricted" => Ok(LoginPolicy::Restricted),
            "all" => Ok(LoginPolicy::All),
            other => Err(ServiceError::Validation(format!(
                "invalid allow-logins value {other:?}; choices are restricted, all"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredClient {
    pub id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    /// Serialized public key document (JWKS) of the client's identity key.
    pub jwks: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl RegisteredClient {
    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy::from_metadata(&self.metadata)
    }
}

/// Caller-supplied registration. `client_type` stays a raw string until the
/// registry parses it, so an unknown type is rejected rather than defaulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ClientDraft {
    #[validate(length(min = 1, message = "Client ID is required"))]
    pub id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub client_type: String,
    #[validate(length(min = 1, message = "Public key document is required"))]
    pub jwks: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ClientDraft {
    pub fn into_client(
        self,
        client_type: ClientType,
        created_at: DateTime<Utc>,
    ) -> RegisteredClient {
        RegisteredClient {
            id: self.id,
            client_name: self.client_name,
            client_uri: self.client_uri,
            redirect_uris: self.redirect_uris,
            description: self.description,
            client_type,
            jwks: self.jwks,
            metadata: self.metadata,
            created_at,
        }
    }
}

/// Partial update. Absent and empty fields are no-ops, never clears; metadata
/// entries are merged key by key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl ClientPatch {
    pub fn with_login_policy(mut self, policy: LoginPolicy) -> Self {
        self.metadata
            .insert(ALLOW_LOGINS_KEY.to_string(), policy.as_str().to_string());
        self
    }

    /// Drops fields that carry no value so they cannot clear stored data.
    pub fn normalized(self) -> Self {
        Self {
            client_name: self.client_name.filter(|v| !v.is_empty()),
            client_uri: self.client_uri.filter(|v| !v.is_empty()),
            redirect_uris: self.redirect_uris.filter(|v| !v.is_empty()),
            description: self.description.filter(|v| !v.is_empty()),
            metadata: self.metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_name.is_none()
            && self.client_uri.is_none()
            && self.redirect_uris.is_none()
            && self.description.is_none()
            && self.metadata.is_empty()
    }

    pub fn apply_to(&self, client: &mut RegisteredClient) {
        if let Some(name) = &self.client_name {
            client.client_name = name.clone();
        }
        if let Some(uri) = &self.client_uri {
            client.client_uri = uri.clone();
        }
        if let Some(uris) = &self.redirect_uris {
            client.redirect_uris = uris.clone();
        }
        if let Some(description) = &self.description {
            client.description = description.clone();
        }
        for (key, value) in &self.metadata {
            client.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Position in a paginated listing. `page` is 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListCursor {
    pub page: u32,
    pub per_page: u32,
}

impl ListCursor {
    pub fn first(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientPage {
    pub clients: Vec<RegisteredClient>,
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
}

impl ClientPage {
    pub fn next_cursor(&self) -> Option<ListCursor> {
        self.has_more.then(|| ListCursor {
            page: self.page.saturating_add(1),
            per_page: self.per_page,
        })
    }
}
