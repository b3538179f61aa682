use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserRepository;
use crate::auth::repo_types::{NewUser, PendingReset, StoreInfo, UserRecord};

/// In-process user store, keyed by email. Used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, UserRecord>>> {
        self.users
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.lock()?.get(email).cloned())
    }

    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<Option<UserRecord>> {
        let mut users = self.lock()?;
        if users.contains_key(&user.email) {
            return Ok(None);
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email.clone(),
            password_hash: user.password_hash,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.created_at,
            reset: None,
        };
        users.insert(user.email, record.clone());
        Ok(Some(record))
    }

    async fn set_pending_reset(&self, user_id: Uuid, reset: &PendingReset) -> anyhow::Result<()> {
        if let Some(user) = self.lock()?.values_mut().find(|u| u.id == user_id) {
            user.reset = Some(reset.clone());
        }
        Ok(())
    }

    async fn consume_reset(
        &self,
        user_id: Uuid,
        code: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut users = self.lock()?;
        let Some(user) = users.values_mut().find(|u| u.id == user_id) else {
            return Ok(false);
        };
        match &user.reset {
            Some(pending) if pending.code == code => {
                user.password_hash = password_hash.to_string();
                user.updated_at = now;
                user.reset = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn describe(&self) -> anyhow::Result<StoreInfo> {
        Ok(StoreInfo {
            name: Some("memory".into()),
            collections: vec!["users".into()],
        })
    }
}
