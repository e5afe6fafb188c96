//! Services layer for registry-service.
//!
//! Identity keys, the client registry and its stores, client assertions,
//! user session tokens, and the settings authorization pipeline.

pub mod assertion;
pub mod authz;
mod database;
pub mod directory;
pub mod error;
pub mod idkey;
mod jwt;
pub mod registry;
mod remote;
pub mod settings;
pub mod store;

pub use assertion::{assertion_key_id, sign_assertion, verify_assertion, ASSERTION_AUDIENCE};
pub use authz::{decide, AuthorizationResolver, AuthorizationResult, Resolution, SettingsContext};
pub use database::{ClientDocument, MongoClientStore, MongoDb, MongoDirectory};
pub use directory::{AccountDirectory, MemoryDirectory};
pub use error::ServiceError;
pub use idkey::{derive_id, publishable_document, IdentityKey, PublicKey};
pub use jwt::{JwtService, SessionClaims};
pub use registry::{
    enumerate_clients, for_each_page, ClientRegistry, Enumeration, PagingLimits,
    RegisteredClients,
};
pub use remote::RegistryClient;
pub use settings::{Guarded, ProfileView, SettingsGuard};
pub use store::{ClientStore, MemoryClientStore};
