use std::sync::Arc;

use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{
    dto::AuthResponse,
    errors::AuthError,
    notify::ResetCodeNotifier,
    password::{hash_password, verify_dummy, verify_password},
    repo::UserRepository,
    repo_types::{NewUser, PendingReset},
};
use crate::config::ResetConfig;

pub const FORGOT_GENERIC_MESSAGE: &str = "If the email exists, a reset code has been generated.";

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub reset_ttl: Duration,
    pub code_in_response: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            reset_ttl: Duration::minutes(15),
            code_in_response: true,
        }
    }
}

impl From<&ResetConfig> for AuthSettings {
    fn from(cfg: &ResetConfig) -> Self {
        Self {
            reset_ttl: Duration::minutes(cfg.ttl_minutes),
            code_in_response: cfg.code_in_response,
        }
    }
}

/// Uniform over 000000..=999999, left-zero-padded.
pub fn generate_reset_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

/// Signup, login and the password-reset workflow over an injected user store.
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    notifier: Arc<dyn ResetCodeNotifier>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        notifier: Arc<dyn ResetCodeNotifier>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            repo,
            notifier,
            settings,
        }
    }

    pub fn repo(&self) -> &Arc<dyn UserRepository> {
        &self.repo
    }

    /// Expects `name` and `email` already validated and normalized.
    #[instrument(skip(self, password))]
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let hash = hash_password(password)?;
        let new_user = NewUser::student(name.into(), email.into(), hash, OffsetDateTime::now_utc());

        let Some(user) = self.repo.create_if_absent(new_user).await? else {
            warn!(%email, "email already registered");
            return Err(AuthError::Conflict);
        };

        info!(user_id = %user.id, email = %user.email, "user signed up");
        Ok(AuthResponse {
            message: "Signup successful".into(),
            token: None,
            name: Some(user.name),
            email: Some(user.email),
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.repo.find_by_email(email).await? else {
            verify_dummy(password);
            warn!(%email, "login unknown email");
            return Err(AuthError::Unauthenticated);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(AuthError::Unauthenticated);
        }

        info!(user_id = %user.id, %email, "user logged in");
        Ok(AuthResponse {
            message: "Login successful".into(),
            token: Some(placeholder_token(&user.id)),
            name: Some(user.name),
            email: Some(user.email),
        })
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.repo.find_by_email(email).await? else {
            debug!(%email, "reset requested for unknown email");
            return Ok(AuthResponse::message(FORGOT_GENERIC_MESSAGE));
        };

        let pending = PendingReset {
            code: generate_reset_code(),
            expires_at: OffsetDateTime::now_utc() + self.settings.reset_ttl,
        };
        self.repo.set_pending_reset(user.id, &pending).await?;
        // The code is already stored; a failed delivery leaves it pending and the caller may
        // request another one.
        if let Err(e) = self
            .notifier
            .deliver(&user.email, &pending.code, pending.expires_at)
            .await
        {
            error!(error = %e, user_id = %user.id, "reset code delivery failed");
        }

        info!(user_id = %user.id, expires_at = %pending.expires_at, "reset code generated");
        if self.settings.code_in_response {
            Ok(AuthResponse {
                message: "Reset code generated (demo)".into(),
                token: Some(pending.code),
                ..AuthResponse::default()
            })
        } else {
            Ok(AuthResponse::message(FORGOT_GENERIC_MESSAGE))
        }
    }

    #[instrument(skip(self, code, new_password))]
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidRequest)?;

        let pending = match &user.reset {
            Some(pending) if pending.code == code => pending,
            _ => {
                warn!(%email, "reset with mismatched code");
                return Err(AuthError::InvalidRequest);
            }
        };

        let now = OffsetDateTime::now_utc();
        if pending.is_expired(now) {
            warn!(user_id = %user.id, "reset code expired");
            return Err(AuthError::Expired);
        }

        let hash = hash_password(new_password)?;
        if !self.repo.consume_reset(user.id, code, &hash, now).await? {
            // Consumed or replaced by a concurrent request since the read above.
            warn!(user_id = %user.id, "reset code no longer pending");
            return Err(AuthError::InvalidRequest);
        }

        info!(user_id = %user.id, "password reset");
        Ok(AuthResponse::message("Password reset successful"))
    }
}

/// Stand-in session identifier. Not signed, carries no expiry.
fn placeholder_token(user_id: &uuid::Uuid) -> String {
    format!("token_{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{memory::MemoryUserRepository, notify::LogNotifier};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl ResetCodeNotifier for RecordingNotifier {
        async fn deliver(&self, email: &str, code: &str, _at: OffsetDateTime) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((email.into(), code.into()));
            Ok(())
        }
    }

    fn service_with(settings: AuthSettings) -> (AuthService, Arc<MemoryUserRepository>) {
        let repo = Arc::new(MemoryUserRepository::new());
        let svc = AuthService::new(repo.clone(), Arc::new(LogNotifier), settings);
        (svc, repo)
    }

    fn service() -> (AuthService, Arc<MemoryUserRepository>) {
        service_with(AuthSettings::default())
    }

    #[test]
    fn reset_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn signup_then_login_succeeds() {
        let (svc, repo) = service();
        let res = svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        assert_eq!(res.name.as_deref(), Some("Ann"));
        assert_eq!(res.email.as_deref(), Some("ann@x.com"));
        assert!(res.token.is_none());

        let stored = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(stored.role, "student");
        assert!(stored.is_active);
        assert_eq!(stored.created_at, stored.updated_at);
        assert_ne!(stored.password_hash, "secret1");
        assert!(stored.reset.is_none());

        let res = svc.login("ann@x.com", "secret1").await.unwrap();
        assert_eq!(res.token, Some(format!("token_{}", stored.id)));
        assert_eq!(res.name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts_without_touching_record() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let before = repo.find_by_email("ann@x.com").await.unwrap().unwrap();

        let err = svc.signup("Other", "ann@x.com", "another1").await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));

        let after = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.password_hash, before.password_hash);
        assert!(svc.login("ann@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let (svc, _) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();

        let wrong = svc.login("ann@x.com", "wrong").await.unwrap_err();
        let unknown = svc.login("bob@x.com", "secret1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::Unauthenticated));
        assert!(matches!(unknown, AuthError::Unauthenticated));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn forgot_for_unknown_email_is_generic_and_silent() {
        let repo = Arc::new(MemoryUserRepository::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let svc = AuthService::new(repo.clone(), notifier.clone(), AuthSettings::default());
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let before = repo.find_by_email("ann@x.com").await.unwrap().unwrap();

        let res = svc.forgot_password("nobody@x.com").await.unwrap();
        assert_eq!(res, AuthResponse::message(FORGOT_GENERIC_MESSAGE));
        assert!(repo.find_by_email("nobody@x.com").await.unwrap().is_none());
        assert!(notifier.sent.lock().unwrap().is_empty());

        let after = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(after.reset.is_none());
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.password_hash, before.password_hash);
    }

    struct FailingNotifier;

    #[async_trait::async_trait]
    impl ResetCodeNotifier for FailingNotifier {
        async fn deliver(&self, _email: &str, _code: &str, _at: OffsetDateTime) -> anyhow::Result<()> {
            anyhow::bail!("smtp relay unreachable")
        }
    }

    #[tokio::test]
    async fn failed_delivery_still_answers_and_keeps_code_pending() {
        let repo = Arc::new(MemoryUserRepository::new());
        let settings = AuthSettings {
            code_in_response: false,
            ..AuthSettings::default()
        };
        let svc = AuthService::new(repo.clone(), Arc::new(FailingNotifier), settings);
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();

        let res = svc.forgot_password("ann@x.com").await.unwrap();
        assert_eq!(res, AuthResponse::message(FORGOT_GENERIC_MESSAGE));

        let pending = repo.find_by_email("ann@x.com").await.unwrap().unwrap().reset.unwrap();
        svc.reset_password("ann@x.com", &pending.code, "newpass1").await.unwrap();
        assert!(svc.login("ann@x.com", "newpass1").await.is_ok());
    }

    #[tokio::test]
    async fn forgot_sets_code_with_fifteen_minute_expiry() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();

        let before = OffsetDateTime::now_utc();
        let res = svc.forgot_password("ann@x.com").await.unwrap();
        let code = res.token.unwrap();
        assert_eq!(code.len(), 6);

        let pending = repo
            .find_by_email("ann@x.com")
            .await
            .unwrap()
            .unwrap()
            .reset
            .unwrap();
        assert_eq!(pending.code, code);
        let ttl = pending.expires_at - before;
        assert!(ttl > Duration::minutes(14) && ttl <= Duration::minutes(15) + Duration::seconds(5));
    }

    #[tokio::test]
    async fn full_reset_flow_swaps_passwords() {
        let (svc, _) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        assert!(svc.login("ann@x.com", "secret1").await.is_ok());
        assert!(matches!(
            svc.login("ann@x.com", "wrong").await,
            Err(AuthError::Unauthenticated)
        ));

        let code = svc.forgot_password("ann@x.com").await.unwrap().token.unwrap();
        let res = svc.reset_password("ann@x.com", &code, "newpass1").await.unwrap();
        assert_eq!(res.message, "Password reset successful");

        assert!(matches!(
            svc.login("ann@x.com", "secret1").await,
            Err(AuthError::Unauthenticated)
        ));
        assert!(svc.login("ann@x.com", "newpass1").await.is_ok());
    }

    #[tokio::test]
    async fn reset_code_cannot_be_replayed() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let code = svc.forgot_password("ann@x.com").await.unwrap().token.unwrap();
        svc.reset_password("ann@x.com", &code, "newpass1").await.unwrap();

        let stored = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(stored.reset.is_none());
        assert!(stored.updated_at >= stored.created_at);

        let err = svc.reset_password("ann@x.com", &code, "newpass2").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest));
        assert!(svc.login("ann@x.com", "newpass1").await.is_ok());
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_state_kept() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let user = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        let pending = PendingReset {
            code: "123456".into(),
            expires_at: OffsetDateTime::now_utc() - Duration::seconds(1),
        };
        repo.set_pending_reset(user.id, &pending).await.unwrap();

        let err = svc.reset_password("ann@x.com", "123456", "newpass1").await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));

        let after = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(after.password_hash, user.password_hash);
        assert_eq!(after.reset, Some(pending));
        assert!(svc.login("ann@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn reset_without_pending_code_or_account_is_invalid() {
        let (svc, _) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();

        let no_pending = svc.reset_password("ann@x.com", "000000", "newpass1").await.unwrap_err();
        assert!(matches!(no_pending, AuthError::InvalidRequest));

        let no_user = svc.reset_password("bob@x.com", "000000", "newpass1").await.unwrap_err();
        assert!(matches!(no_user, AuthError::InvalidRequest));
    }

    #[tokio::test]
    async fn wrong_code_is_invalid_even_when_expired() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let user = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        let pending = PendingReset {
            code: "123456".into(),
            expires_at: OffsetDateTime::now_utc() - Duration::minutes(1),
        };
        repo.set_pending_reset(user.id, &pending).await.unwrap();

        let err = svc.reset_password("ann@x.com", "654321", "newpass1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest));
    }

    #[tokio::test]
    async fn newer_forgot_replaces_older_code() {
        let (svc, repo) = service();
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();
        let user = repo.find_by_email("ann@x.com").await.unwrap().unwrap();

        let old = PendingReset {
            code: "111111".into(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(15),
        };
        repo.set_pending_reset(user.id, &old).await.unwrap();
        let fresh = svc.forgot_password("ann@x.com").await.unwrap().token.unwrap();

        if fresh != old.code {
            let err = svc.reset_password("ann@x.com", &old.code, "newpass1").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidRequest));
        }
        svc.reset_password("ann@x.com", &fresh, "newpass1").await.unwrap();
    }

    #[tokio::test]
    async fn code_is_delivered_but_withheld_when_configured() {
        let repo = Arc::new(MemoryUserRepository::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = AuthSettings {
            code_in_response: false,
            ..AuthSettings::default()
        };
        let svc = AuthService::new(repo.clone(), notifier.clone(), settings);
        svc.signup("Ann", "ann@x.com", "secret1").await.unwrap();

        let known = svc.forgot_password("ann@x.com").await.unwrap();
        let unknown = svc.forgot_password("bob@x.com").await.unwrap();
        assert_eq!(known, unknown);
        assert!(known.token.is_none());

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ann@x.com");
        let stored = repo.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(stored.reset.unwrap().code, sent[0].1);
    }
}
