use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{User, UserPage};

/// Writable user fields shared by create and full update. Timestamps are
/// RFC3339 strings; an empty string means "not set".
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub deleted_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Generated server-side when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub user: UserRequest,
}

/// PATCH body; every field is optional and only present ones are written.
#[derive(Debug, Default, Deserialize)]
pub struct PatchUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Raw `GET /user` parameters as they appear on the query string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub emails: Vec<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
    pub last_timestamp: Option<String>,
    pub order_created_at: Option<String>,
}

impl ListParams {
    /// Accepts `emails` repeated, as `emails[]`, or comma separated.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "emails" | "emails[]" => params.emails.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string),
                ),
                "limit" => params.limit = Some(value),
                "cursor" => params.cursor = Some(value),
                "lastTimestamp" => params.last_timestamp = Some(value),
                "orders[created_at]" => params.order_created_at = Some(value),
                _ => {}
            }
        }
        params
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public projection of a user; the password hash never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            created_at: u.created_at,
            updated_at: u.updated_at,
            deleted_at: u.deleted_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub list: Vec<UserResponse>,
    pub cursor: Option<Uuid>,
    #[serde(rename = "lastTimestamp", with = "time::serde::rfc3339::option")]
    pub last_timestamp: Option<OffsetDateTime>,
    pub total: i64,
}

impl From<UserPage> for UserListResponse {
    fn from(page: UserPage) -> Self {
        Self {
            list: page.users.into_iter().map(UserResponse::from).collect(),
            cursor: page.cursor,
            last_timestamp: page.last_timestamp,
            total: page.total,
        }
    }
}
