use serde::{Deserialize, Serialize};

/// The authenticated user behind a settings request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub uid: i64,
    pub login: String,
}

/// The registered client that authenticated the current request with a
/// signed assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub client_id: String,
}
