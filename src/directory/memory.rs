use super::{DirectoryError, NewUser, User, UserDirectory};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, User>,
}

/// Process-local directory for tests and throwaway local runs.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<Inner>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a user; tokens already issued for it stop resolving.
    pub async fn remove(&self, id: i64) -> Option<User> {
        self.inner.write().await.users.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_login(&self, login_id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|user| user.login_id == login_id)
            .cloned())
    }

    async fn exists_by_login(&self, login_id: &str) -> Result<bool, DirectoryError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .any(|user| user.login_id == login_id))
    }

    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut inner = self.inner.write().await;

        // uniqueness is checked under the write lock, like a unique index
        if inner.users.values().any(|u| u.login_id == user.login_id) {
            return Err(DirectoryError::DuplicateLogin);
        }

        inner.next_id += 1;
        let stored = User {
            id: inner.next_id,
            username: user.username,
            login_id: user.login_id,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        inner.users.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn save(&self, user: &User) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .users
            .get_mut(&user.id)
            .ok_or(DirectoryError::NotFound)?;

        existing.username.clone_from(&user.username);
        existing.password_hash.clone_from(&user.password_hash);

        Ok(())
    }
}
