use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // argon2 PHC string, never serialized
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Fully resolved insert payload.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Field mask for PUT/PATCH: `None` leaves the column untouched.
/// `deleted_at: Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
    pub deleted_at: Option<Option<OffsetDateTime>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.created_at.is_none()
            && self.updated_at.is_none()
            && self.deleted_at.is_none()
    }
}

/// One page of `GET /user`.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub cursor: Option<Uuid>,
    pub last_timestamp: Option<OffsetDateTime>,
    pub total: i64,
}

impl UserPage {
    /// Cursor and last timestamp come from the last row; an empty page has neither.
    pub fn from_rows(users: Vec<User>, total: i64) -> Self {
        let (cursor, last_timestamp) = match users.last() {
            Some(last) => (Some(last.id), Some(last.created_at)),
            None => (None, None),
        };
        Self {
            users,
            cursor,
            last_timestamp,
            total,
        }
    }
}
