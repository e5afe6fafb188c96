//! Signed client assertions: how a registered client proves which client it
//! is when asking for its own record.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{IdentityKey, ServiceError};
use crate::models::{CallerIdentity, Jwk, PublicKeyDocument, RegisteredClient};

pub const ASSERTION_AUDIENCE: &str = "registered-clients";
const ASSERTION_LIFETIME_MINUTES: i64 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub fn sign_assertion(key: &IdentityKey) -> Result<String, ServiceError> {
    let now = Utc::now();
    let claims = ClientAssertionClaims {
        iss: key.id().to_string(),
        sub: key.id().to_string(),
        aud: ASSERTION_AUDIENCE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let mut header = Header::new(key.public_key().algorithm());
    header.kid = Some(key.id().to_string());

    encode(&header, &claims, &key.encoding_key()?)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign assertion: {}", e)))
}

/// The client ID an assertion claims to come from, read from the header
/// before any signature check.
pub fn assertion_key_id(token: &str) -> Result<String, ServiceError> {
    let header = decode_header(token)
        .map_err(|e| ServiceError::Unauthorized(format!("invalid client assertion: {e}")))?;
    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("client assertion has no key id".to_string()))
}

/// Verifies an assertion against the public key document stored on the
/// client it names.
pub fn verify_assertion(
    token: &str,
    client: &RegisteredClient,
) -> Result<CallerIdentity, ServiceError> {
    let document: PublicKeyDocument = serde_json::from_str(&client.jwks).map_err(|e| {
        ServiceError::Unauthorized(format!("client {} has an unreadable key document: {e}", client.id))
    })?;
    let jwk = document.key(&client.id).ok_or_else(|| {
        ServiceError::Unauthorized(format!("client {} has no key {}", client.id, client.id))
    })?;
    let (decoding_key, algorithm) = verification_key(jwk)?;

    let mut validation = Validation::new(algorithm);
    validation.set_audience(&[ASSERTION_AUDIENCE]);
    validation.set_issuer(&[client.id.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let data = decode::<ClientAssertionClaims>(token, &decoding_key, &validation)
        .map_err(|e| ServiceError::Unauthorized(format!("invalid client assertion: {e}")))?;

    if data.claims.sub != client.id {
        return Err(ServiceError::Unauthorized(
            "client assertion subject does not match its issuer".to_string(),
        ));
    }

    Ok(CallerIdentity {
        client_id: client.id.clone(),
    })
}

fn verification_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), ServiceError> {
    let unusable =
        |e: jsonwebtoken::errors::Error| ServiceError::Unauthorized(format!("unusable client key: {e}"));
    match (jwk.kty.as_str(), &jwk.n, &jwk.e, &jwk.crv, &jwk.x) {
        ("RSA", Some(n), Some(e), _, _) => Ok((
            DecodingKey::from_rsa_components(n, e).map_err(unusable)?,
            Algorithm::RS256,
        )),
        ("OKP", _, _, Some(crv), Some(x)) if crv == "Ed25519" => Ok((
            DecodingKey::from_ed_components(x).map_err(unusable)?,
            Algorithm::EdDSA,
        )),
        (kty, ..) => Err(ServiceError::Unauthorized(format!(
            "unsupported client key type {kty}"
        ))),
    }
}
