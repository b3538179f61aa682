use std::sync::Arc;

use crate::auth::{
    memory::MemoryUserRepository,
    notify::{LogNotifier, ResetCodeNotifier},
    repo::UserRepository,
    AuthService, AuthSettings,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// The store's lifecycle stays with the caller; the state only borrows a handle.
    pub fn from_parts(
        config: Arc<AppConfig>,
        repo: Arc<dyn UserRepository>,
        notifier: Arc<dyn ResetCodeNotifier>,
    ) -> Self {
        let settings = AuthSettings::from(&config.reset);
        Self {
            auth: Arc::new(AuthService::new(repo, notifier, settings)),
            config,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            Arc::new(config),
            Arc::new(MemoryUserRepository::new()),
            Arc::new(LogNotifier),
        )
    }

    pub fn store(&self) -> &Arc<dyn UserRepository> {
        self.auth.repo()
    }
}
