use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::password;

/// User record as stored. Deliberately not `Serialize`: convert to [`PublicUser`] before responding.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,               // lowercase, unique
    pub email: String,                  // lowercase, unique
    pub full_name: String,
    pub avatar: String,                 // hosted asset URL
    pub cover_image: String,            // hosted asset URL or ""
    pub watch_history: Vec<Uuid>,       // video ids
    pub password_hash: String,          // Argon2 PHC string
    pub refresh_token: Option<String>,  // the one valid refresh token, if any
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn compare_password(&self, plain: &str) -> anyhow::Result<bool> {
        password::verify_password(plain, &self.password_hash)
    }
}

/// Fields needed to create a user. `password_hash` is already derived.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: String,
}

impl NewUser {
    pub(crate) fn into_user(self, id: Uuid, now: OffsetDateTime) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            avatar: self.avatar,
            cover_image: self.cover_image,
            watch_history: Vec::new(),
            password_hash: self.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub watch_history: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar,
            cover_image: u.cover_image,
            watch_history: u.watch_history,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column (username or email) already holds this value.
    #[error("duplicate value for {0}")]
    Duplicate(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Backend(e.into())
    }
}
