//! Read-only decoding of the session token's claims.
//!
//! The client never verifies the signature (the backend owns that); it only
//! needs the `exp` claim to decide whether a persisted token is still worth
//! presenting, plus whatever identity the backend put in the payload.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::UserId;

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("token does not have three dot-separated segments")]
    Format,
    #[error("claims segment is not base64url: {0}")]
    Encoding(String),
    #[error("claims segment is not a JSON object with `exp`: {0}")]
    Claims(String),
    #[error("expiry {0} is out of range")]
    Expiry(i64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        DateTime::from_timestamp(self.exp, 0).ok_or(TokenError::Expiry(self.exp))
    }
}

/// Decode the payload segment of a JWT.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Format);
    };

    // Some encoders leave padding in place; the URL-safe engine rejects it.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Claims(e.to_string()))?;
    claims.expires_at()?;
    Ok(claims)
}

#[cfg(test)]
pub(crate) fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
