use crate::models::{AdminStats, BmiRecord, NewBmiRecord, NewUser, Role, User, UserSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A unique constraint (username, e-mail, reset token) was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers never see whether they
/// run against Postgres or the in-memory store.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn set_user_role(&self, id: i64, role: Role) -> Result<(), RepositoryError>;

    // --- Password reset ---
    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// Only returns a user whose token matches and whose expiry is after `now`.
    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;
    /// Replaces the hash and clears any outstanding reset token.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError>;

    // --- Measurements ---
    async fn create_bmi_record(&self, record: NewBmiRecord) -> Result<BmiRecord, RepositoryError>;
    /// Newest first.
    async fn list_bmi_records(&self, user_id: i64) -> Result<Vec<BmiRecord>, RepositoryError>;
    /// Inclusive bounds, oldest first.
    async fn bmi_records_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BmiRecord>, RepositoryError>;

    // --- Admin ---
    async fn get_stats(&self, recent_limit: i64) -> Result<AdminStats, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, reset_token, reset_token_expiry, created_at";
const RECORD_COLUMNS: &str = "id, user_id, weight, height, bmi, recorded_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(db.message().to_string());
        }
    }
    RepositoryError::Sqlx(e)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// create_user
    ///
    /// Inserts the account; unique violations on username or e-mail surface as `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique)
    }

    async fn set_user_role(&self, id: i64, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET reset_token = $1, reset_token_expiry = $2 WHERE id = $3")
            .bind(token)
            .bind(expiry)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_unique)?;
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1 AND reset_token_expiry > $2"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE users SET password_hash = $1, reset_token = NULL, reset_token_expiry = NULL WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_bmi_record(&self, record: NewBmiRecord) -> Result<BmiRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO bmi_records (user_id, weight, height, bmi, recorded_at) VALUES ($1, $2, $3, $4, $5) RETURNING {RECORD_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, BmiRecord>(&sql)
            .bind(record.user_id)
            .bind(record.weight)
            .bind(record.height)
            .bind(record.bmi)
            .bind(record.recorded_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_bmi_records(&self, user_id: i64) -> Result<Vec<BmiRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM bmi_records WHERE user_id = $1 ORDER BY recorded_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, BmiRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn bmi_records_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BmiRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM bmi_records WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at <= $3 ORDER BY recorded_at ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, BmiRecord>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?)
    }

    /// get_stats
    ///
    /// Compiles the admin dashboard counters and the most recent accounts.
    async fn get_stats(&self, recent_limit: i64) -> Result<AdminStats, RepositoryError> {
        let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let record_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bmi_records")
            .fetch_one(&self.pool)
            .await?;
        let recent_users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email, role, created_at FROM users ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(recent_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(AdminStats {
            user_count,
            record_count,
            recent_users,
        })
    }
}

// --- In-memory implementation (tests and database-less local runs) ---

#[derive(Default)]
struct MemoryStore {
    users: Vec<User>,
    records: Vec<BmiRecord>,
}

/// MemoryRepository
///
/// A `Repository` held entirely in process memory. Enforces the same uniqueness rules as the
/// schema so handler tests see realistic conflicts.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .store()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .store()
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut store = self.store();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict("username".to_string()));
        }
        if user.email.is_some() && store.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email".to_string()));
        }

        let created = User {
            id: store.users.len() as i64 + 1,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            reset_token: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn set_user_role(&self, id: i64, role: Role) -> Result<(), RepositoryError> {
        let mut store = self.store();
        let user = store
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store();
        let user = store
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.reset_token = Some(token.to_string());
        user.reset_token_expiry = Some(expiry);
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .store()
            .users
            .iter()
            .find(|u| {
                u.reset_token.as_deref() == Some(token)
                    && u.reset_token_expiry.is_some_and(|expiry| expiry > now)
            })
            .cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError> {
        let mut store = self.store();
        let user = store
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expiry = None;
        Ok(())
    }

    async fn create_bmi_record(&self, record: NewBmiRecord) -> Result<BmiRecord, RepositoryError> {
        let mut store = self.store();
        let created = BmiRecord {
            id: store.records.len() as i64 + 1,
            user_id: record.user_id,
            weight: record.weight,
            height: record.height,
            bmi: record.bmi,
            recorded_at: record.recorded_at,
        };
        store.records.push(created.clone());
        Ok(created)
    }

    async fn list_bmi_records(&self, user_id: i64) -> Result<Vec<BmiRecord>, RepositoryError> {
        let mut records: Vec<BmiRecord> = self
            .store()
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn bmi_records_between(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BmiRecord>, RepositoryError> {
        let mut records: Vec<BmiRecord> = self
            .store()
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.recorded_at >= start && r.recorded_at <= end)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn get_stats(&self, recent_limit: i64) -> Result<AdminStats, RepositoryError> {
        let store = self.store();
        let mut recent: Vec<&User> = store.users.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(AdminStats {
            user_count: store.users.len() as i64,
            record_count: store.records.len() as i64,
            recent_users: recent
                .into_iter()
                .take(recent_limit.max(0) as usize)
                .map(UserSummary::from)
                .collect(),
        })
    }
}
