pub mod clients;
pub mod keys;
pub mod settings;

use serde::{Deserialize, Serialize};

/// Error body for every failed request. `code` is the stable error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
