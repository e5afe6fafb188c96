use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::SshPublicKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyListResponse {
    #[serde(rename = "Results")]
    pub results: Vec<SshPublicKey>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddKeyRequest {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Key")]
    #[validate(length(min = 1, message = "Key is required"))]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteKeyQuery {
    #[serde(rename = "ID")]
    pub id: String,
}
