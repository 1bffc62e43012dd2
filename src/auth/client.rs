use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::auth::{password, token};
use crate::config::ClientConfig;
use crate::db::models::{AuthUser, Session};
use crate::error::{expect_json, BeaconError, Result};
use crate::session::{AuthEvent, SessionStore};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpMetadata {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a SignUpMetadata,
}

#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrantRequest<'a> {
    refresh_token: &'a str,
}

// The signup endpoint answers with a full session when the project signs
// users in immediately, and with the bare user when email confirmation is
// still pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(AuthUser),
}

#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

impl SignUpOutcome {
    /// False while the account still needs email confirmation.
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Wrapper over the provider's auth endpoints; the sole writer of session
/// state. Each successful transition is applied to the shared store before
/// the call returns.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: SessionStore,
}

impl AuthClient {
    pub(crate) fn new(
        http: reqwest::Client,
        config: Arc<ClientConfig>,
        session: SessionStore,
    ) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome> {
        password::require_strong(password)?;

        log::info!("Sign-up attempt for {}", email);

        let request = SignUpRequest {
            email,
            password,
            data: &metadata,
        };
        let response = self
            .http
            .post(self.config.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&request)
            .send()
            .await?;

        let outcome = match expect_json::<SignUpResponse>(response).await? {
            SignUpResponse::Session(session) => SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            },
            SignUpResponse::User(user) => SignUpOutcome {
                user,
                session: None,
            },
        };

        if let Some(session) = &outcome.session {
            self.session
                .dispatch(AuthEvent::SignedIn, Some(session.clone()));
            log::info!("Signed up and in as {}", email);
        } else {
            log::info!("Signed up {}; awaiting email confirmation", email);
        }

        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        log::info!("Sign-in attempt for {}", email);

        let request = PasswordGrantRequest { email, password };
        let response = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&request)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            log::warn!("Failed sign-in attempt for {}", email);
            return Err(BeaconError::InvalidCredentials);
        }

        let session: Session = expect_json(response).await?;
        self.session
            .dispatch(AuthEvent::SignedIn, Some(session.clone()));

        log::info!("Signed in as {}", email);
        Ok(session)
    }

    /// Revokes the session remotely, then clears local state. The local
    /// sign-out happens even when revocation fails, so consumers always see
    /// a `SignedOut` transition; the remote error is still returned.
    pub async fn sign_out(&self) -> Result<()> {
        let mut remote: Result<()> = Ok(());

        if let Some(session) = self.session.current_session() {
            let response = self
                .http
                .post(self.config.auth_url("logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;

            remote = match response {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(BeaconError::from_response(resp).await),
                Err(err) => Err(err.into()),
            };

            if let Err(err) = &remote {
                log::warn!("Remote sign-out failed, clearing local session anyway: {}", err);
            }
        }

        self.session.dispatch(AuthEvent::SignedOut, None);
        log::info!("Signed out");

        remote
    }

    /// Whether the stored access token is expired or expires within
    /// `leeway_secs`, the usual cue to call [`refresh_session`].
    ///
    /// False when signed out; true when the token payload cannot be read,
    /// since such a token cannot be trusted to outlive the next request.
    ///
    /// [`refresh_session`]: AuthClient::refresh_session
    pub fn needs_refresh(&self, leeway_secs: u64) -> bool {
        match self.session.current_session() {
            Some(session) => match token::decode_claims(&session.access_token) {
                Ok(claims) => claims.is_expired(token::now_secs().saturating_add(leeway_secs)),
                Err(_) => true,
            },
            None => false,
        }
    }

    pub async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .session
            .current_session()
            .ok_or(BeaconError::NotAuthenticated)?;

        let request = RefreshGrantRequest {
            refresh_token: &current.refresh_token,
        };
        let response = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.config.anon_key)
            .json(&request)
            .send()
            .await?;

        let session: Session = expect_json(response).await?;
        self.session
            .dispatch(AuthEvent::TokenRefreshed, Some(session.clone()));

        log::debug!("Session refreshed for user {}", session.user.id);
        Ok(session)
    }

    /// Updates the signed-in user's metadata and broadcasts the new user
    /// value under the current tokens.
    pub async fn update_user(&self, metadata: Map<String, Value>) -> Result<AuthUser> {
        let current = self
            .session
            .current_session()
            .ok_or(BeaconError::NotAuthenticated)?;

        let response = self
            .http
            .put(self.config.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&current.access_token)
            .json(&serde_json::json!({ "data": metadata }))
            .send()
            .await?;

        let user: AuthUser = expect_json(response).await?;

        let mut session = current;
        session.user = user.clone();
        self.session
            .dispatch(AuthEvent::UserUpdated, Some(session));

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AuthClient {
        let config = ClientConfig::new("https://demo.beacon.dev", "anon-key-123").unwrap();
        AuthClient::new(
            reqwest::Client::new(),
            Arc::new(config),
            SessionStore::new(),
        )
    }

    #[test]
    fn sign_up_request_nests_metadata_under_data() {
        let metadata = SignUpMetadata {
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            phone: None,
        };
        let request = SignUpRequest {
            email: "dana@example.com",
            password: "Sturdy99pass",
            data: &metadata,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["data"]["first_name"], "Dana");
        assert_eq!(body["email"], "dana@example.com");
        assert!(body["data"].get("phone").is_none());
    }

    #[test]
    fn sign_up_response_parses_both_shapes() {
        let with_session = r#"{
            "access_token": "header.payload.sig",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {"id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214"}
        }"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(with_session).unwrap(),
            SignUpResponse::Session(_)
        ));

        let pending_confirmation = r#"{"id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214", "email": "dana@example.com"}"#;
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(pending_confirmation).unwrap(),
            SignUpResponse::User(_)
        ));
    }

    #[tokio::test]
    async fn sign_up_rejects_weak_password_before_any_network() {
        let client = test_client();
        let result = client
            .sign_up("dana@example.com", "weak", SignUpMetadata::default())
            .await;
        assert!(matches!(result, Err(BeaconError::WeakPassword)));
    }

    #[test]
    fn needs_refresh_tracks_token_expiry() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

        let client = test_client();
        assert!(!client.needs_refresh(60));

        let expired_payload = format!(
            r#"{{"sub":"9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214","exp":{}}}"#,
            crate::auth::token::now_secs() - 10
        );
        let access_token = format!(
            "header.{}.signature",
            URL_SAFE_NO_PAD.encode(expired_payload.as_bytes())
        );

        let session: Session = serde_json::from_value(serde_json::json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {"id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214"}
        }))
        .unwrap();
        client.session.dispatch(AuthEvent::SignedIn, Some(session));

        assert!(client.needs_refresh(0));
    }

    #[tokio::test]
    async fn refresh_without_session_is_not_authenticated() {
        let client = test_client();
        assert!(matches!(
            client.refresh_session().await,
            Err(BeaconError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn update_user_without_session_is_not_authenticated() {
        let client = test_client();
        assert!(matches!(
            client.update_user(Map::new()).await,
            Err(BeaconError::NotAuthenticated)
        ));
    }
}
