use serde_json::Value;

use crate::auth::token::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Password must be at least 8 characters with an uppercase letter and a number")]
    WeakPassword,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Access token error: {0}")]
    Token(#[from] TokenError),
}

impl BeaconError {
    /// Maps a non-success response to an `Api` error, extracting the message
    /// the hosted service puts in its error body when one is present.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        BeaconError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

// The auth and data surfaces use different error envelopes; check the
// known keys before falling back to the raw body.
fn extract_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Success bodies deserialize; anything else becomes an `Api` error.
pub(crate) async fn expect_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(BeaconError::from_response(response).await)
    }
}

pub type Result<T> = std::result::Result<T, BeaconError>;
