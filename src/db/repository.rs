use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::models::{
    AlertStatus, AuthUser, CommunityPost, EmergencyAlert, EmergencyContact, NewAlert, NewContact,
    NewPost, PostComment, PostType, Profile, ProfileUpdate,
};
use crate::config::ClientConfig;
use crate::error::{expect_json, BeaconError, Result};
use crate::session::SessionStore;

// PostgREST conventions: single-object reads and representation-returning
// writes are negotiated through headers, relations are embedded via select.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

const AUTHOR_SELECT: &str = "*,profiles:user_id(first_name,last_name)";
const POST_SELECT: &str =
    "*,profiles:user_id(first_name,last_name),post_comments(id,content,created_at,profiles:user_id(first_name,last_name))";

/// Entry point to the hosted data API; hands out one repository per
/// resource, all sharing the HTTP client and the session store.
#[derive(Clone)]
pub struct RestContext {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: SessionStore,
}

impl RestContext {
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

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository { ctx: self.clone() }
    }

    pub fn community(&self) -> CommunityRepository {
        CommunityRepository { ctx: self.clone() }
    }

    pub fn emergency(&self) -> EmergencyRepository {
        EmergencyRepository { ctx: self.clone() }
    }

    // Authenticated requests carry the session's access token; public reads
    // fall back to the anon key.
    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        let bearer = self
            .session
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.http
            .request(method, self.config.rest_url(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    // The synchronous gate before any auth-required call: fail fast, no
    // network, when nobody is signed in.
    fn require_user(&self) -> Result<AuthUser> {
        self.session
            .current_user()
            .ok_or(BeaconError::NotAuthenticated)
    }
}

#[derive(Serialize)]
struct InsertPost<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    post: &'a NewPost,
}

#[derive(Serialize)]
struct InsertComment<'a> {
    post_id: Uuid,
    user_id: Uuid,
    content: &'a str,
}

#[derive(Serialize)]
struct InsertAlert<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    alert: &'a NewAlert,
}

#[derive(Serialize)]
struct InsertContact<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    contact: &'a NewContact,
}

#[derive(Clone)]
pub struct ProfileRepository {
    ctx: RestContext,
}

impl ProfileRepository {
    /// Fetches a profile by id, defaulting to the signed-in user's own.
    pub async fn fetch(&self, user_id: Option<Uuid>) -> Result<Profile> {
        let id = match user_id {
            Some(id) => id,
            None => self.ctx.require_user()?.id,
        };

        let response = self
            .ctx
            .request(Method::GET, "profiles")
            .query(&[("id", format!("eq.{}", id))])
            .query(&[("select", "*")])
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;

        expect_json(response).await
    }

    pub async fn update(&self, update: ProfileUpdate) -> Result<Profile> {
        let user = self.ctx.require_user()?;

        let mut payload = serde_json::to_value(&update)?;
        payload["updated_at"] = serde_json::json!(Utc::now());

        let response = self
            .ctx
            .request(Method::PATCH, "profiles")
            .query(&[("id", format!("eq.{}", user.id))])
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&payload)
            .send()
            .await?;

        expect_json(response).await
    }
}

#[derive(Clone)]
pub struct CommunityRepository {
    ctx: RestContext,
}

impl CommunityRepository {
    /// Lists posts newest-first with author and comments embedded,
    /// optionally filtered by type. Public read; no sign-in required.
    pub async fn list_posts(&self, post_type: Option<PostType>) -> Result<Vec<CommunityPost>> {
        let mut request = self
            .ctx
            .request(Method::GET, "community_posts")
            .query(&[("select", POST_SELECT), ("order", "created_at.desc")]);

        if let Some(post_type) = post_type {
            request = request.query(&[("post_type", format!("eq.{}", post_type.as_str()))]);
        }

        expect_json(request.send().await?).await
    }

    pub async fn create_post(&self, post: NewPost) -> Result<CommunityPost> {
        let user = self.ctx.require_user()?;

        let response = self
            .ctx
            .request(Method::POST, "community_posts")
            .query(&[("select", AUTHOR_SELECT)])
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&InsertPost {
                user_id: user.id,
                post: &post,
            })
            .send()
            .await?;

        expect_json(response).await
    }

    pub async fn add_comment(&self, post_id: Uuid, content: &str) -> Result<PostComment> {
        let user = self.ctx.require_user()?;

        let response = self
            .ctx
            .request(Method::POST, "post_comments")
            .query(&[("select", AUTHOR_SELECT)])
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&InsertComment {
                post_id,
                user_id: user.id,
                content,
            })
            .send()
            .await?;

        expect_json(response).await
    }
}

#[derive(Clone)]
pub struct EmergencyRepository {
    ctx: RestContext,
}

impl EmergencyRepository {
    pub async fn create_alert(&self, alert: NewAlert) -> Result<EmergencyAlert> {
        let user = self.ctx.require_user()?;

        let response = self
            .ctx
            .request(Method::POST, "emergency_alerts")
            .query(&[("select", AUTHOR_SELECT)])
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&InsertAlert {
                user_id: user.id,
                alert: &alert,
            })
            .send()
            .await?;

        let created: EmergencyAlert = expect_json(response).await?;
        log::info!(
            "Created {} emergency alert {}",
            created.alert_type.as_str(),
            created.id
        );
        Ok(created)
    }

    /// Lists alerts newest-first, optionally filtered by status. Public
    /// read; no sign-in required.
    pub async fn list_alerts(&self, status: Option<AlertStatus>) -> Result<Vec<EmergencyAlert>> {
        let mut request = self
            .ctx
            .request(Method::GET, "emergency_alerts")
            .query(&[("select", AUTHOR_SELECT), ("order", "created_at.desc")]);

        if let Some(status) = status {
            request = request.query(&[("status", format!("eq.{}", status.as_str()))]);
        }

        expect_json(request.send().await?).await
    }

    /// The signed-in user's contacts, primary contact first, then oldest
    /// first.
    pub async fn list_contacts(&self) -> Result<Vec<EmergencyContact>> {
        let user = self.ctx.require_user()?;

        let response = self
            .ctx
            .request(Method::GET, "emergency_contacts")
            .query(&[("user_id", format!("eq.{}", user.id))])
            .query(&[("select", "*"), ("order", "is_primary.desc,created_at.asc")])
            .send()
            .await?;

        expect_json(response).await
    }

    pub async fn add_contact(&self, contact: NewContact) -> Result<EmergencyContact> {
        let user = self.ctx.require_user()?;

        let response = self
            .ctx
            .request(Method::POST, "emergency_contacts")
            .query(&[("select", "*")])
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&InsertContact {
                user_id: user.id,
                contact: &contact,
            })
            .send()
            .await?;

        expect_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AlertType;

    fn signed_out_context() -> RestContext {
        let config = ClientConfig::new("https://demo.beacon.dev", "anon-key-123").unwrap();
        RestContext::new(reqwest::Client::new(), Arc::new(config), SessionStore::new())
    }

    #[test]
    fn insert_post_carries_user_id_next_to_fields() {
        let post = NewPost {
            title: "Street lights out".to_string(),
            content: "Whole block is dark".to_string(),
            post_type: PostType::Alert,
            location: Some("5th Ave".to_string()),
            is_urgent: false,
        };
        let user_id = Uuid::new_v4();

        let body = serde_json::to_value(InsertPost {
            user_id,
            post: &post,
        })
        .unwrap();

        assert_eq!(body["user_id"], serde_json::json!(user_id));
        assert_eq!(body["title"], "Street lights out");
        assert_eq!(body["post_type"], "alert");
    }

    #[test]
    fn insert_alert_omits_unknown_location() {
        let alert = NewAlert {
            alert_type: AlertType::Fire,
            message: "Emergency alert: fire".to_string(),
            location_lat: None,
            location_lng: None,
            address: None,
        };

        let body = serde_json::to_value(InsertAlert {
            user_id: Uuid::new_v4(),
            alert: &alert,
        })
        .unwrap();

        assert_eq!(body["alert_type"], "fire");
        assert!(body.get("location_lat").is_none());
    }

    #[tokio::test]
    async fn create_post_requires_sign_in() {
        let ctx = signed_out_context();
        let result = ctx
            .community()
            .create_post(NewPost {
                title: "t".to_string(),
                content: "c".to_string(),
                post_type: PostType::General,
                location: None,
                is_urgent: false,
            })
            .await;

        assert!(matches!(result, Err(BeaconError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn add_comment_requires_sign_in() {
        let ctx = signed_out_context();
        let result = ctx.community().add_comment(Uuid::new_v4(), "hello").await;
        assert!(matches!(result, Err(BeaconError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn contact_listing_requires_sign_in() {
        let ctx = signed_out_context();
        assert!(matches!(
            ctx.emergency().list_contacts().await,
            Err(BeaconError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn own_profile_fetch_requires_sign_in() {
        let ctx = signed_out_context();
        assert!(matches!(
            ctx.profiles().fetch(None).await,
            Err(BeaconError::NotAuthenticated)
        ));
    }
}
