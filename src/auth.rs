//! Bearer authorization
//!
//! Turns an `Authorization` header value into a verified [`TokenPayload`].
//! Every failure is an authentication failure (401).

use thiserror::Error;

use crate::token::{TokenError, TokenMaker, TokenPayload};

pub const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthorization,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Unsupported authorization type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "MISSING_AUTH",
            AuthError::InvalidFormat => "INVALID_AUTH_FORMAT",
            AuthError::UnsupportedType(_) => "UNSUPPORTED_AUTH_TYPE",
            AuthError::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            AuthError::Token(_) => "INVALID_TOKEN",
        }
    }

    pub fn http_status(&self) -> u16 {
        401
    }
}

/// Verify `Authorization: Bearer <token>`
///
/// The type keyword is case-insensitive. Anything after the token is ignored.
pub fn authorize(
    header: Option<&str>,
    maker: &dyn TokenMaker,
) -> Result<TokenPayload, AuthError> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or(AuthError::MissingAuthorization)?;

    let mut fields = header.split_whitespace();
    let (kind, token) = match (fields.next(), fields.next()) {
        (Some(kind), Some(token)) => (kind, token),
        _ => return Err(AuthError::InvalidFormat),
    };

    if !kind.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return Err(AuthError::UnsupportedType(kind.to_string()));
    }

    let payload = maker.verify_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        AuthError::from(e)
    })?;
    Ok(payload)
}
