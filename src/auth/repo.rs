use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PendingReset, StoreInfo, UserRecord, UserRow};

/// Persistence for user records, keyed by email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    /// Inserts unless the email is taken. `None` means another record already owns it.
    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<Option<UserRecord>>;

    /// Overwrites any pending reset on the record.
    async fn set_pending_reset(&self, user_id: Uuid, reset: &PendingReset) -> anyhow::Result<()>;

    /// Replaces the password hash and clears the pending reset in one write, provided
    /// the stored code still equals `code`. Returns whether the write happened.
    async fn consume_reset(
        &self,
        user_id: Uuid,
        code: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool>;

    async fn describe(&self) -> anyhow::Result<StoreInfo>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, created_at, updated_at, reset_code, reset_expires";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn create_if_absent(&self, user: NewUser) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn set_pending_reset(&self, user_id: Uuid, reset: &PendingReset) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = $1, reset_expires = $2
            WHERE id = $3
            "#,
        )
        .bind(&reset.code)
        .bind(reset.expires_at)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_reset(
        &self,
        user_id: Uuid,
        code: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = $2, reset_code = NULL, reset_expires = NULL
            WHERE id = $3 AND reset_code = $4
            "#,
        )
        .bind(password_hash)
        .bind(now)
        .bind(user_id)
        .bind(code)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn describe(&self) -> anyhow::Result<StoreInfo> {
        let name: String = sqlx::query_scalar("SELECT current_database()::text")
            .fetch_one(&self.db)
            .await?;
        let collections: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public'
            ORDER BY table_name
            LIMIT 10
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(StoreInfo {
            name: Some(name),
            collections,
        })
    }
}
