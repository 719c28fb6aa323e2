use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::UserStore,
    repo_types::{NewUser, StoreError, User},
};

/// In-process store with the same uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        let found = users.values().find(|u| {
            username.is_some_and(|name| u.username == name)
                || email.is_some_and(|mail| u.email == mail)
        });
        Ok(found.cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate("users_username_key".into()));
        }
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }

        let user = new_user.into_user(Uuid::new_v4(), OffsetDateTime::now_utc());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.refresh_token = token.map(str::to_owned);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_owned();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != id && u.email == email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        user.full_name = full_name.to_owned();
        user.email = email.to_owned();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}
