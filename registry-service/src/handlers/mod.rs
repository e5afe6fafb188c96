//! HTTP handlers for registry-service.

pub mod clients;
pub mod keys;
pub mod settings;

pub use clients::*;
pub use keys::*;
pub use settings::*;
