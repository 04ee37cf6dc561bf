//! Bearer Token Makers
//!
//! Two interchangeable schemes behind [`TokenMaker`]:
//!
//! - [`JwtMaker`]: HMAC-signed claims (tamper-evident, readable)
//! - [`PasetoMaker`]: PASETO v2.local (encrypted and authenticated)
//!
//! The scheme is picked from configuration at startup; callers only see the
//! trait.

pub mod jwt;
pub mod maker;
pub mod paseto;

use std::sync::Arc;

pub use jwt::JwtMaker;
pub use maker::{TokenError, TokenMaker, TokenPayload};
pub use paseto::PasetoMaker;

use crate::config::{TokenConfig, TokenKind};

/// Build the configured token maker
pub fn build_token_maker(config: &TokenConfig) -> Result<Arc<dyn TokenMaker>, TokenError> {
    let key = config.symmetric_key.as_bytes();
    let maker: Arc<dyn TokenMaker> = match config.kind {
        TokenKind::Jwt => Arc::new(JwtMaker::new(key)?),
        TokenKind::Paseto => Arc::new(PasetoMaker::new(key)?),
    };
    tracing::info!(scheme = maker.name(), "Token maker ready");
    Ok(maker)
}
