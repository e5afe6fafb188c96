//! Identity keys: the asymmetric keypair behind a registered client.
//!
//! A client's ID is the unpadded base64url SHA-256 fingerprint of its DER
//! SubjectPublicKeyInfo, and its public key document is a JWKS holding only
//! the public parameters.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{Algorithm, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::der::Document;
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use super::ServiceError;
use crate::models::{Jwk, PublicKeyDocument};

/// RSA modulus sizes accepted for publication.
pub const SUPPORTED_RSA_BITS: [usize; 3] = [2048, 3072, 4096];

/// Fingerprint of a DER-encoded SubjectPublicKeyInfo.
pub fn derive_id(public_key_der: &[u8]) -> Result<String, ServiceError> {
    SubjectPublicKeyInfoRef::try_from(public_key_der)
        .map_err(|e| ServiceError::MalformedKey(format!("invalid public key: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(public_key_der)))
}

/// Public-only JWKS for a DER-encoded SubjectPublicKeyInfo.
pub fn publishable_document(public_key_der: &[u8]) -> Result<PublicKeyDocument, ServiceError> {
    PublicKey::from_der(public_key_der)?.publishable_document()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ed25519(VerifyingKey),
}

impl PublicKey {
    pub fn from_der(der: &[u8]) -> Result<Self, ServiceError> {
        if let Ok(key) = RsaPublicKey::from_public_key_der(der) {
            return Ok(PublicKey::Rsa(key));
        }
        if let Ok(key) = VerifyingKey::from_public_key_der(der) {
            return Ok(PublicKey::Ed25519(key));
        }
        match SubjectPublicKeyInfoRef::try_from(der) {
            Ok(spki) => Err(ServiceError::UnsupportedKeyType(format!(
                "unsupported public key algorithm {}",
                spki.algorithm.oid
            ))),
            Err(e) => Err(ServiceError::MalformedKey(format!("invalid public key: {e}"))),
        }
    }

    pub fn from_pem(pem: &str) -> Result<Self, ServiceError> {
        let (label, doc) = Document::from_pem(pem)
            .map_err(|e| ServiceError::MalformedKey(format!("invalid PEM: {e}")))?;
        if label != "PUBLIC KEY" {
            return Err(ServiceError::MalformedKey(format!(
                "expected a PUBLIC KEY block, found {label}"
            )));
        }
        Self::from_der(doc.as_bytes())
    }

    pub fn to_der(&self) -> Result<Vec<u8>, ServiceError> {
        let doc = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::Ed25519(key) => key.to_public_key_der(),
        }
        .map_err(|e| anyhow::anyhow!("failed to encode public key: {e}"))?;
        Ok(doc.into_vec())
    }

    pub fn id(&self) -> Result<String, ServiceError> {
        derive_id(&self.to_der()?)
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            PublicKey::Rsa(_) => Algorithm::RS256,
            PublicKey::Ed25519(_) => Algorithm::EdDSA,
        }
    }

    pub fn publishable_document(&self) -> Result<PublicKeyDocument, ServiceError> {
        let kid = self.id()?;
        let jwk = match self {
            PublicKey::Rsa(key) => {
                let bits = key.size() * 8;
                if !SUPPORTED_RSA_BITS.contains(&bits) {
                    return Err(ServiceError::UnsupportedKeyType(format!(
                        "unsupported RSA key size {bits}; supported sizes are 2048, 3072, 4096"
                    )));
                }
                Jwk {
                    kty: "RSA".to_string(),
                    kid,
                    key_use: "sig".to_string(),
                    alg: "RS256".to_string(),
                    n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
                    e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
                    crv: None,
                    x: None,
                }
            }
            PublicKey::Ed25519(key) => Jwk {
                kty: "OKP".to_string(),
                kid,
                key_use: "sig".to_string(),
                alg: "EdDSA".to_string(),
                n: None,
                e: None,
                crv: Some("Ed25519".to_string()),
                x: Some(URL_SAFE_NO_PAD.encode(key.as_bytes())),
            },
        };
        Ok(PublicKeyDocument { keys: vec![jwk] })
    }
}

/// A client's private identity key, loaded from a PEM file.
pub struct IdentityKey {
    id: String,
    public: PublicKey,
    private_pem: SecretString,
}

impl IdentityKey {
    /// Parses a PKCS#8 (RSA or Ed25519) or PKCS#1 (RSA) private key.
    pub fn from_pem(pem: &str) -> Result<Self, ServiceError> {
        let (label, doc) = Document::from_pem(pem)
            .map_err(|e| ServiceError::MalformedKey(format!("invalid PEM: {e}")))?;
        let der = doc.as_bytes();

        let public = match label {
            "PRIVATE KEY" => {
                if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
                    PublicKey::Rsa(key.to_public_key())
                } else if let Ok(key) = SigningKey::from_pkcs8_der(der) {
                    PublicKey::Ed25519(key.verifying_key())
                } else if let Ok(info) = PrivateKeyInfo::try_from(der) {
                    return Err(ServiceError::UnsupportedKeyType(format!(
                        "unsupported private key algorithm {}",
                        info.algorithm.oid
                    )));
                } else {
                    return Err(ServiceError::MalformedKey(
                        "invalid PKCS#8 private key".to_string(),
                    ));
                }
            }
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(der)
                .map(|key| PublicKey::Rsa(key.to_public_key()))
                .map_err(|e| ServiceError::MalformedKey(format!("invalid PKCS#1 key: {e}")))?,
            other => {
                return Err(ServiceError::MalformedKey(format!(
                    "expected a private key PEM block, found {other}"
                )))
            }
        };

        Ok(Self {
            id: public.id()?,
            public,
            private_pem: SecretString::new(pem.to_string()),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Validation(format!(
                "failed to read identity key file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&pem)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn publishable_document(&self) -> Result<PublicKeyDocument, ServiceError> {
        self.public.publishable_document()
    }

    /// Serialized JWKS, as stored on the registered client.
    pub fn marshal_jwks(&self) -> Result<String, ServiceError> {
        let document = self.publishable_document()?;
        serde_json::to_string(&document)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("failed to encode JWKS: {e}")))
    }

    pub(crate) fn encoding_key(&self) -> Result<EncodingKey, ServiceError> {
        let pem = self.private_pem.expose_secret().as_bytes();
        match self.public {
            PublicKey::Rsa(_) => EncodingKey::from_rsa_pem(pem),
            PublicKey::Ed25519(_) => EncodingKey::from_ed_pem(pem),
        }
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("failed to load signing key: {e}")))
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKey")
            .field("id", &self.id)
            .field("algorithm", &self.public.algorithm())
            .finish_non_exhaustive()
    }
}
