use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid access token format")]
    InvalidFormat,

    #[error("failed to decode access token payload")]
    PayloadDecode,

    #[error("failed to parse access token payload")]
    PayloadParse,
}

/// Claims carried in the access token payload. Signature verification is the
/// server's job; the client only reads the payload, e.g. to schedule a
/// refresh before `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

impl AccessTokenClaims {
    pub fn is_expired(&self, reference_secs: u64) -> bool {
        reference_secs >= self.exp
    }
}

/// Decodes the payload segment of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<AccessTokenClaims, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload_b64), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::InvalidFormat);
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::PayloadDecode)?;

    serde_json::from_slice(&payload).map_err(|_| TokenError::PayloadParse)
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
