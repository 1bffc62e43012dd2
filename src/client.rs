use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthClient;
use crate::config::ClientConfig;
use crate::db::models::AuthUser;
use crate::db::RestContext;
use crate::error::Result;
use crate::session::{AuthEvent, SessionStore, Subscription};

/// Handle to one hosted Beacon project: shared HTTP client, shared session
/// store, and accessors for the auth and data surfaces. Cloning is cheap and
/// every clone observes the same session state.
#[derive(Clone)]
pub struct BeaconClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: SessionStore,
}

impl BeaconClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        log::info!("Beacon client initialized for {}", config.project_url);

        Ok(Self {
            http,
            config: Arc::new(config),
            session: SessionStore::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn auth(&self) -> AuthClient {
        AuthClient::new(self.http.clone(), self.config.clone(), self.session.clone())
    }

    pub fn db(&self) -> RestContext {
        RestContext::new(self.http.clone(), self.config.clone(), self.session.clone())
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Shorthand for [`SessionStore::current_user`].
    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.current_user()
    }

    /// Shorthand for [`SessionStore::subscribe`].
    pub fn on_auth_change<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Option<&AuthUser>, AuthEvent) + Send + Sync + 'static,
    {
        self.session.subscribe(observer)
    }
}
