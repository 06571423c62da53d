use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::bmi::BmiCategory;
use crate::reports::{ReportPeriod, TrendSummary};

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field carried in both the `users` table and the session token.
/// Serialized as `USER` / `ADMIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// User
///
/// The full account row from the `users` table. Never serialized: it carries the password
/// hash and the reset token. Use [`UserSummary`] or [`PublicUser`] for responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// PublicUser
///
/// The identity returned by a successful login: exactly what the session token carries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// UserSummary
///
/// Admin-facing view of an account (no credentials).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// BmiRecord
///
/// One measurement from the `bmi_records` table. Weight in kilograms, height in centimetres.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct BmiRecord {
    pub id: i64,
    pub user_id: i64,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    #[ts(type = "string")]
    pub recorded_at: DateTime<Utc>,
}

/// Insert payload for a measurement. `bmi` is computed by the handler.
#[derive(Debug, Clone)]
pub struct NewBmiRecord {
    pub user_id: i64,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub recorded_at: DateTime<Utc>,
}

/// BmiEntry
///
/// A record as returned to clients, annotated with its category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BmiEntry {
    #[serde(flatten)]
    pub record: BmiRecord,
    pub category: BmiCategory,
}

impl From<BmiRecord> for BmiEntry {
    fn from(record: BmiRecord) -> Self {
        let category = BmiCategory::of(record.bmi);
        Self { record, category }
    }
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input for `POST /api/auth/login`. The `login` field accepts either the username or the
/// e-mail address; `email` and `username` are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// RegisterUserRequest
///
/// Input for `POST /api/auth/register`. An empty e-mail string counts as no e-mail.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// CreateBmiRequest
///
/// Input for `POST /api/bmi`: weight in kilograms, height in centimetres.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateBmiRequest {
    #[validate(range(min = 1.0, message = "Weight must be greater than 0"))]
    pub weight: f64,
    #[validate(range(min = 1.0, message = "Height must be greater than 0"))]
    pub height: f64,
}

// --- Responses (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

/// ForgotPasswordResponse
///
/// The message is identical whether or not the account exists. `mock_token` is only
/// populated in the local environment, standing in for the e-mail that would carry it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ForgotPasswordResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BmiCreatedResponse {
    pub message: String,
    pub record: BmiEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BmiHistoryResponse {
    pub records: Vec<BmiEntry>,
}

/// ReportResponse
///
/// Records inside the requested window (oldest first) plus the window bounds and a summary.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReportResponse {
    pub records: Vec<BmiEntry>,
    #[serde(rename = "type")]
    pub period: ReportPeriod,
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    pub summary: TrendSummary,
}

/// AdminStats
///
/// Output schema for `GET /api/admin/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminStats {
    pub user_count: i64,
    pub record_count: i64,
    /// The five most recently created accounts.
    pub recent_users: Vec<UserSummary>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
