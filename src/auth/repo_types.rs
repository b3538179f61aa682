use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_ROLE: &str = "student";

/// A reset code waiting to be consumed. Code and expiry only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

impl PendingReset {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}

/// User record as the service sees it.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub reset: Option<PendingReset>,
}

/// Fields supplied by signup; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

impl NewUser {
    pub fn student(name: String, email: String, password_hash: String, now: OffsetDateTime) -> Self {
        Self {
            name,
            email,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            is_active: true,
            created_at: now,
        }
    }
}

/// Row in the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub reset_code: Option<String>,
    pub reset_expires: Option<OffsetDateTime>,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        // The table's CHECK constraint keeps the pair aligned; a half-set pair is no reset.
        let reset = match (r.reset_code, r.reset_expires) {
            (Some(code), Some(expires_at)) => Some(PendingReset { code, expires_at }),
            _ => None,
        };
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role: r.role,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
            reset,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreInfo {
    pub name: Option<String>,
    pub collections: Vec<String>,
}
