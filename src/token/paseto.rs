//! PASETO v2.local tokens
//!
//! ```text
//! token = "v2.local." || base64url(nonce || ciphertext)
//! nonce = BLAKE2b-192(key = 24 random bytes, message = payload)
//! ciphertext = XChaCha20-Poly1305(key, nonce, payload, aad = PAE(header, nonce, footer))
//! ```
//!
//! The payload is JSON and both confidential and authenticated. Footers are
//! not used; a token carrying one is rejected.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use blake2::Blake2bMac;
use blake2::digest::consts::U24;
use blake2::digest::{FixedOutput, Update};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;

use super::maker::{TokenError, TokenMaker, TokenPayload};

pub const SYMMETRIC_KEY_SIZE: usize = 32;

const HEADER: &str = "v2.local.";
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

pub struct PasetoMaker {
    cipher: XChaCha20Poly1305,
}

impl PasetoMaker {
    pub fn new(symmetric_key: &[u8]) -> Result<Self, TokenError> {
        if symmetric_key.len() != SYMMETRIC_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(format!(
                "exactly {SYMMETRIC_KEY_SIZE} bytes"
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(symmetric_key)
            .map_err(|_| TokenError::InvalidKeySize(format!("exactly {SYMMETRIC_KEY_SIZE} bytes")))?;
        Ok(Self { cipher })
    }

    fn encrypt(&self, message: &[u8]) -> Result<String, TokenError> {
        let mut nonce_key = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_key)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;
        self.encrypt_with_nonce_key(&nonce_key, message)
    }

    /// Deterministic given `nonce_key`; only `encrypt` supplies fresh ones.
    fn encrypt_with_nonce_key(
        &self,
        nonce_key: &[u8; NONCE_SIZE],
        message: &[u8],
    ) -> Result<String, TokenError> {
        let nonce = derive_nonce(nonce_key, message)?;

        let aad = pae(&[HEADER.as_bytes(), &nonce, b""]);
        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: message,
                    aad: &aad,
                },
            )
            .map_err(|_| TokenError::Encoding("encryption failed".to_string()))?;

        let mut body = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);
        Ok(format!("{HEADER}{}", URL_SAFE_NO_PAD.encode(body)))
    }

    fn decrypt(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let encoded = token.strip_prefix(HEADER).ok_or(TokenError::Invalid)?;
        if encoded.contains('.') {
            return Err(TokenError::Invalid);
        }
        let body = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::Invalid)?;
        if body.len() < NONCE_SIZE + TAG_SIZE {
            return Err(TokenError::Invalid);
        }

        let (nonce, ciphertext) = body.split_at(NONCE_SIZE);
        let aad = pae(&[HEADER.as_bytes(), nonce, b""]);
        self.cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| TokenError::Invalid)
    }
}

impl TokenMaker for PasetoMaker {
    fn name(&self) -> &'static str {
        "paseto"
    }

    fn create_token(&self, username: &str, duration: Duration) -> Result<String, TokenError> {
        let payload = TokenPayload::new(username, duration)?;
        let message =
            serde_json::to_vec(&payload).map_err(|e| TokenError::Encoding(e.to_string()))?;
        self.encrypt(&message)
    }

    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let message = self.decrypt(token)?;
        let payload: TokenPayload =
            serde_json::from_slice(&message).map_err(|_| TokenError::Invalid)?;
        payload.check_expiry(Utc::now())?;
        Ok(payload)
    }
}

fn derive_nonce(nonce_key: &[u8], message: &[u8]) -> Result<[u8; NONCE_SIZE], TokenError> {
    let mut mac = <Blake2bMac<U24> as blake2::digest::KeyInit>::new_from_slice(nonce_key)
        .map_err(|_| TokenError::Encoding("nonce key rejected".to_string()))?;
    Update::update(&mut mac, message);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&mac.finalize_fixed());
    Ok(nonce)
}

/// Pre-authentication encoding: piece count, then each piece prefixed by its
/// length, all as little-endian u64 with the top bit cleared.
fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    fn le64(n: usize) -> [u8; 8] {
        ((n as u64) & (u64::MAX >> 1)).to_le_bytes()
    }

    let mut out = le64(pieces.len()).to_vec();
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len()));
        out.extend_from_slice(piece);
    }
    out
}
