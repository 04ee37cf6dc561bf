//! HMAC-signed JWT tokens
//!
//! Claims are readable by anyone holding the token; the signature only makes
//! them tamper-evident.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::maker::{TokenError, TokenMaker, TokenPayload};

pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
struct Claims {
    id: Uuid,
    username: String,
    iat: i64, // Issued at (UTC seconds)
    exp: i64, // Expiration time (UTC seconds)
}

pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtMaker {
    pub fn new(secret_key: &[u8]) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(format!(
                "at least {MIN_SECRET_KEY_SIZE} bytes"
            )));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key),
            decoding_key: DecodingKey::from_secret(secret_key),
        })
    }

    /// Only the HMAC family is accepted. Tokens announcing `none`, RSA, EC or
    /// EdDSA are rejected before any key is used.
    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Expiry is checked after decoding so it stays distinct from signature
        // failures and has no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl TokenMaker for JwtMaker {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn create_token(&self, username: &str, duration: Duration) -> Result<String, TokenError> {
        let payload = TokenPayload::new(username, duration)?;
        let claims = Claims {
            id: payload.id,
            username: payload.username,
            iat: payload.issued_at.timestamp(),
            exp: payload.expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Self::validation()).map_err(
            |e| {
                if let ErrorKind::InvalidAlgorithm = e.kind() {
                    tracing::warn!("Rejected JWT with unexpected signing algorithm");
                }
                TokenError::Invalid
            },
        )?;

        let claims = data.claims;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;

        let payload = TokenPayload {
            id: claims.id,
            username: claims.username,
            issued_at,
            expires_at,
        };
        payload.check_expiry(Utc::now())?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_key_too_short() {
        let result = JwtMaker::new(b"short");
        assert!(matches!(result, Err(TokenError::InvalidKeySize(_))));
    }

    #[test]
    fn test_round_trip() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let token = maker.create_token("alice", Duration::minutes(1)).unwrap();

        let payload = maker.verify_token(&token).unwrap();
        assert_eq!(payload.username, "alice");
        assert_eq!(payload.expires_at - payload.issued_at, Duration::minutes(1));
        assert!((Utc::now() - payload.issued_at) < Duration::seconds(2));
    }

    #[test]
    fn test_expired_token() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let token = maker.create_token("alice", -Duration::minutes(1)).unwrap();

        assert_eq!(maker.verify_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_signature() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let token = maker.create_token("alice", Duration::minutes(1)).unwrap();

        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut sig = URL_SAFE_NO_PAD.decode(signature).unwrap();
        for i in 0..sig.len() {
            sig[i] ^= 0x01;
            let forged = format!("{head}.{}", URL_SAFE_NO_PAD.encode(&sig));
            assert_eq!(maker.verify_token(&forged), Err(TokenError::Invalid), "byte {i}");
            sig[i] ^= 0x01;
        }
    }

    #[test]
    fn test_wrong_key() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let other = JwtMaker::new(b"fedcba9876543210fedcba9876543210").unwrap();
        let token = other.create_token("alice", Duration::minutes(1)).unwrap();

        assert_eq!(maker.verify_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_alg_none_rejected() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let now = Utc::now().timestamp();
        let claims = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"id":"{}","username":"alice","iat":{now},"exp":{}}}"#,
            Uuid::new_v4(),
            now + 60
        ));
        let forged = format!("{header}.{claims}.");

        assert_eq!(maker.verify_token(&forged), Err(TokenError::Invalid));
    }

    #[test]
    fn test_asymmetric_alg_rejected() {
        let maker = JwtMaker::new(SECRET).unwrap();
        let token = maker.create_token("alice", Duration::minutes(1)).unwrap();
        let mut parts = token.splitn(3, '.');
        let (_, claims, sig) = (
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().unwrap(),
        );
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let forged = format!("{header}.{claims}.{sig}");

        assert_eq!(maker.verify_token(&forged), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed() {
        let maker = JwtMaker::new(SECRET).unwrap();
        assert_eq!(maker.verify_token("not-a-token"), Err(TokenError::Invalid));
        assert_eq!(maker.verify_token(""), Err(TokenError::Invalid));
    }
}
