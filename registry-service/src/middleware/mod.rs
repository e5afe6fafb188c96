pub mod admin;
pub mod auth;
pub mod client_auth;

pub use admin::admin_auth_middleware;
pub use auth::{bearer_token, RequireUser, Session};
pub use client_auth::{client_assertion_middleware, CurrentClient};
