use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use super::ServiceError;
use crate::config::JwtConfig;
use crate::models::Principal;

/// Verifies user session tokens. A signing key is only loaded when one is
/// configured, for local development and tests.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims for user session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    pub login: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
}

impl JwtService {
    /// Create a new JWT service by loading RSA keys from files
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                config.public_key_path,
                e
            )
        })?;

        let private_key_pem = match &config.private_key_path {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read private key from {}: {}", path, e)
            })?),
            None => None,
        };

        let service = Self::from_pem(
            &public_key_pem,
            private_key_pem.as_deref(),
            config.access_token_expiry_minutes,
        )?;
        tracing::info!(
            can_sign = service.encoding_key.is_some(),
            "JWT service initialized with RS256 keys"
        );
        Ok(service)
    }

    pub fn from_pem(
        public_key_pem: &str,
        private_key_pem: Option<&str>,
        access_token_expiry_minutes: i64,
    ) -> Result<Self, anyhow::Error> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        let encoding_key = private_key_pem
            .map(|pem| {
                EncodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))
            })
            .transpose()?;

        Ok(Self {
            encoding_key,
            decoding_key,
            access_token_expiry_minutes,
        })
    }

    /// Issue a session token for a user
    pub fn generate_access_token(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No signing key configured"))?;

        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = SessionClaims {
            sub: principal.uid.to_string(),
            login: principal.login.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(Algorithm::RS256);
        encode(&header, &claims, encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Validate a session token and resolve the principal it names
    pub fn validate_access_token(&self, token: &str) -> Result<Principal, ServiceError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| ServiceError::Unauthorized(format!("Invalid session token: {e}")))?;

        let uid = token_data.claims.sub.parse::<i64>().map_err(|_| {
            ServiceError::Unauthorized("Session token subject is not a user ID".to_string())
        })?;

        Ok(Principal {
            uid,
            login: token_data.claims.login,
        })
    }
}
