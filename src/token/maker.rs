use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token errors
///
/// `Invalid` and `Expired` are separate outcomes: a token that fails
/// verification is never reported as expired, and the other way round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,

    #[error("token is expired")]
    Expired,

    #[error("invalid key size: must be {0}")]
    InvalidKeySize(String),

    #[error("failed to obtain randomness: {0}")]
    Entropy(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Verified token content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "iat")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp")]
    pub expires_at: DateTime<Utc>,
}

impl TokenPayload {
    /// Fresh payload valid for `duration` from now
    pub fn new(username: &str, duration: Duration) -> Result<Self, TokenError> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(duration)
            .ok_or_else(|| TokenError::Encoding("expiration out of range".to_string()))?;

        Ok(Self {
            id: random_token_id()?,
            username: username.to_string(),
            issued_at,
            expires_at,
        })
    }

    /// Expired when `expires_at` is at or before `now`
    pub fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.expires_at <= now {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

/// UUID v4 drawn from the OS RNG. Fails instead of panicking when no
/// entropy is available.
fn random_token_id() -> Result<Uuid, TokenError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Entropy(e.to_string()))?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

/// Issues and verifies bearer tokens for a username
pub trait TokenMaker: Send + Sync {
    /// Scheme name for logging
    fn name(&self) -> &'static str;

    fn create_token(&self, username: &str, duration: Duration) -> Result<String, TokenError>;

    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_expiry_boundary() {
        let payload = TokenPayload::new("alice", Duration::minutes(1)).unwrap();
        assert_eq!(payload.expires_at - payload.issued_at, Duration::minutes(1));
        assert_eq!(payload.id.get_version_num(), 4);

        assert!(payload.check_expiry(payload.issued_at).is_ok());
        assert_eq!(payload.check_expiry(payload.expires_at), Err(TokenError::Expired));
        assert_eq!(
            payload.check_expiry(payload.expires_at + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_token_ids_are_unique() {
        let a = TokenPayload::new("alice", Duration::minutes(1)).unwrap();
        let b = TokenPayload::new("alice", Duration::minutes(1)).unwrap();
        assert_ne!(a.id, b.id);
    }
}
