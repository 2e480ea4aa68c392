use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, NonEmptyString, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const SUPPORTED_KEY_TYPES: [&str; 5] = [
    "ssh-rsa",
    "ssh-ed25519",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
];

/// Public key uploaded by a user and pushed to reachable tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshPublicKey {
    /// Stable identifier.
    pub id: Uuid,
    /// Key owner.
    pub user_id: UserId,
    /// Display name, unique per user.
    pub name: NonEmptyString,
    /// OpenSSH formatted key.
    pub public_key: String,
    /// SHA-256 fingerprint of the key blob.
    pub fingerprint: String,
    /// Upload timestamp.
    pub created_at: DateTime<Utc>,
}

impl SshPublicKey {
    /// Creates a key after validating its OpenSSH format.
    pub fn new(user_id: UserId, name: &str, public_key: &str) -> AppResult<Self> {
        let public_key = public_key.trim();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: NonEmptyString::new(name)?,
            fingerprint: ssh_key_fingerprint(public_key)?,
            public_key: public_key.to_owned(),
            created_at: Utc::now(),
        })
    }
}

/// Computes the OpenSSH `SHA256:` fingerprint of a public key line.
pub fn ssh_key_fingerprint(public_key: &str) -> AppResult<String> {
    let mut parts = public_key.split_whitespace();
    let (Some(key_type), Some(encoded)) = (parts.next(), parts.next()) else {
        return Err(AppError::Validation(
            "public key must contain a key type and a base64 body".to_owned(),
        ));
    };

    if !SUPPORTED_KEY_TYPES.contains(&key_type) {
        return Err(AppError::Validation(format!(
            "unsupported public key type '{key_type}'"
        )));
    }

    let blob = STANDARD
        .decode(encoded)
        .map_err(|error| AppError::Validation(format!("invalid public key body: {error}")))?;

    let digest = Sha256::digest(&blob);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}
