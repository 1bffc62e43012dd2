use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The authenticated identity as the auth service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn is_email_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// A full session envelope as returned by the token endpoints. The tokens
/// authorize data API calls; `user` is the value broadcast to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let trimmed = name.trim();
        if trimmed.is_empty() {
            "User".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Partial profile update; unset fields are left untouched on the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The author projection embedded in post, comment, and alert rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub first_name: String,
    pub last_name: String,
}

impl AuthorRef {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let trimmed = name.trim();
        if trimmed.is_empty() {
            "Anonymous".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    General,
    SafetyTip,
    Alert,
    HelpRequest,
    Announcement,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::General => "general",
            PostType::SafetyTip => "safety_tip",
            PostType::Alert => "alert",
            PostType::HelpRequest => "help_request",
            PostType::Announcement => "announcement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommunityPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_urgent: bool,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "profiles")]
    pub author: Option<AuthorRef>,
    #[serde(rename = "post_comments", default)]
    pub comments: Vec<PostComment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostComment {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "profiles")]
    pub author: Option<AuthorRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub is_urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Medical,
    Fire,
    Police,
    Other,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Medical => "medical",
            AlertType::Fire => "fire",
            AlertType::Police => "police",
            AlertType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
    Cancelled,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "profiles")]
    pub author: Option<AuthorRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmergencyContact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    pub is_primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_trims_and_falls_back() {
        let author = AuthorRef {
            first_name: "Ada".to_string(),
            last_name: "".to_string(),
        };
        assert_eq!(author.display_name(), "Ada");

        let anonymous = AuthorRef {
            first_name: " ".to_string(),
            last_name: "".to_string(),
        };
        assert_eq!(anonymous.display_name(), "Anonymous");
    }

    #[test]
    fn test_post_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PostType::SafetyTip).unwrap(),
            "\"safety_tip\""
        );
        assert_eq!(PostType::HelpRequest.as_str(), "help_request");
    }

    #[test]
    fn test_parse_embedded_post_row() {
        let row = r#"{
            "id": "6e3c1b5a-32a1-4a8e-9a40-0f1f64de5a21",
            "user_id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214",
            "title": "Road closed on Main St",
            "content": "Flooding near the bridge, take 5th Ave instead.",
            "post_type": "alert",
            "location": "Main St",
            "is_urgent": true,
            "created_at": "2025-04-02T18:21:07Z",
            "profiles": {"first_name": "Dana", "last_name": "Reyes"},
            "post_comments": [
                {
                    "id": "0f1f64de-5a21-4a8e-9a40-6e3c1b5a32a1",
                    "content": "Thanks for the heads up",
                    "created_at": "2025-04-02T18:40:00Z",
                    "profiles": null
                }
            ]
        }"#;

        let post: CommunityPost = serde_json::from_str(row).unwrap();
        assert_eq!(post.post_type, PostType::Alert);
        assert!(post.is_urgent);
        assert_eq!(post.author.as_ref().unwrap().display_name(), "Dana Reyes");
        assert_eq!(post.comments.len(), 1);
        assert!(post.comments[0].author.is_none());
    }

    #[test]
    fn test_parse_alert_row_without_location() {
        let row = r#"{
            "id": "6e3c1b5a-32a1-4a8e-9a40-0f1f64de5a21",
            "user_id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214",
            "alert_type": "medical",
            "message": "Emergency alert: medical",
            "status": "active",
            "created_at": "2025-04-02T18:21:07Z",
            "profiles": {"first_name": "Dana", "last_name": "Reyes"}
        }"#;

        let alert: EmergencyAlert = serde_json::from_str(row).unwrap();
        assert_eq!(alert.alert_type, AlertType::Medical);
        assert_eq!(alert.status, AlertStatus::Active);
        assert!(alert.location_lat.is_none());
    }

    #[test]
    fn test_profile_display_name_falls_back_to_user() {
        let profile = Profile {
            id: Uuid::new_v4(),
            first_name: "".to_string(),
            last_name: "".to_string(),
            phone: None,
            updated_at: None,
        };
        assert_eq!(profile.display_name(), "User");
    }

    #[test]
    fn test_profile_update_omits_unset_fields() {
        let update = ProfileUpdate {
            phone: Some("555-0101".to_string()),
            ..ProfileUpdate::default()
        };

        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({"phone": "555-0101"}));
    }

    #[test]
    fn test_auth_user_verified_flag() {
        let unverified = r#"{"id": "9a1f0f64-de5a-4a8e-b32a-16e3c1b5a214"}"#;
        let user: AuthUser = serde_json::from_str(unverified).unwrap();
        assert!(!user.is_email_verified());
        assert!(user.user_metadata.is_empty());
    }
}
