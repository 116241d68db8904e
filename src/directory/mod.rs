//! User directory capability consumed by the credential and token services.
//!
//! The directory owns identity rows: it assigns ids and creation timestamps on
//! insert and persists password hash changes. Nothing else in the crate writes users.

mod memory;
mod postgres;

pub use memory::MemoryUserDirectory;
pub use postgres::PgUserDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub login_id: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("login_id", &self.login_id)
            .field("password_hash", &"***")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A user that has not been stored yet and so has no id.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub login_id: String,
    pub password_hash: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("login_id", &self.login_id)
            .field("password_hash", &"***")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("login id already registered")]
    DuplicateLogin,
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError>;

    async fn find_by_login(&self, login_id: &str) -> Result<Option<User>, DirectoryError>;

    async fn exists_by_login(&self, login_id: &str) -> Result<bool, DirectoryError>;

    /// Store a new user, assigning its id and `created_at`.
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Persist the mutable fields (username, password hash) of an existing user.
    async fn save(&self, user: &User) -> Result<(), DirectoryError>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}
