use sha2::{Digest, Sha256};

/// Gravatar URL for an e-mail address, falling back to the "mystery person"
/// image when no avatar is registered.
pub fn gravatar_url(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let hash = hex::encode(Sha256::digest(normalized.as_bytes()));
    format!("https://gravatar.com/avatar/{hash}?d=mm")
}
