use crate::{
    AppState,
    auth::{AdminUser, AuthUser, expired_session_cookie, session_cookie},
    bmi::calculate_bmi,
    config::Env,
    error::AppError,
    extract::ValidatedJson,
    models::{
        AdminStats, BmiCreatedResponse, BmiEntry, BmiHistoryResponse, CreateBmiRequest,
        ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
        MessageResponse, NewBmiRecord, NewUser, PublicUser, RegisterResponse,
        RegisterUserRequest, ReportResponse, ResetPasswordRequest, Role, User,
    },
    password::{hash_password, verify_password},
    reports::{ReportPeriod, TrendSummary},
    routes::pages::Page,
    session::Session,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// How long a password-reset token stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
/// Number of accounts listed on the admin dashboard.
const RECENT_USERS_LIMIT: i64 = 5;

const FORGOT_PASSWORD_MESSAGE: &str = "If that email exists, we sent you a link.";

// --- Filter Structs ---

/// ReportQuery
///
/// Query parameters for `GET /api/reports`. `type` is one of daily, weekly, monthly, yearly.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ReportQuery {
    /// Report window; unknown values fall back to daily.
    #[serde(rename = "type")]
    pub period: Option<String>,
}

// --- Auth Handlers ---

/// login
///
/// [Public Route] Checks credentials, mints a session token, and sets it as the `session`
/// cookie. Unknown account and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    // Usernames may contain '@' too, so an e-mail miss falls back to the username.
    let by_email = if payload.login.contains('@') {
        state.repo.find_user_by_email(&payload.login).await?
    } else {
        None
    };
    let user = match by_email {
        Some(user) => Some(user),
        None => state.repo.find_user_by_username(&payload.login).await?,
    };

    let Some(user) = user else {
        tracing::info!("login rejected: unknown account");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let identity = public_identity(&user);
    let ttl = Duration::try_hours(state.config.session_ttl_hours)
        .ok_or_else(|| AppError::Internal("session TTL out of range".to_string()))?;
    let session = Session::issue(&identity, Utc::now(), ttl)?;
    let token = state.sessions.encode(&session)?;
    let cookie = session_cookie(token, &session, &state.config)?;

    tracing::info!(user_id = user.id, role = user.role.as_str(), "login succeeded");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user: identity,
        }),
    ))
}

/// logout
///
/// [Authenticated Route] Clears the session cookie. The token itself stays valid until it
/// expires; there is no server-side session to revoke.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(expired_session_cookie()),
        Json(MessageResponse::new("Logged out")),
    )
}

/// register_user
///
/// [Public Route] Creates a regular account. Usernames and e-mails are unique.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or duplicate account")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if state
        .repo
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }

    if let Some(email) = &payload.email {
        if state.repo.find_user_by_email(email).await?.is_some() {
            return Err(AppError::BadRequest("Email already exists".to_string()));
        }
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// forgot_password
///
/// [Public Route] Issues a one-hour reset token when the e-mail belongs to an account.
/// The response never reveals whether it does. Delivery is mocked: the link is logged, and
/// in the local environment the token is echoed back as `mock_token`.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset requested", body = ForgotPasswordResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let Some(user) = state.repo.find_user_by_email(&payload.email).await? else {
        return Ok(Json(ForgotPasswordResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
            mock_token: None,
        }));
    };

    let token = Uuid::new_v4().to_string();
    let expiry = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    state.repo.set_reset_token(user.id, &token, expiry).await?;

    tracing::info!(
        username = %user.username,
        email = %payload.email,
        link = %format!("/reset-password?token={token}"),
        "[MOCK EMAIL] password reset"
    );

    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
        mock_token: (state.config.env == Env::Local).then_some(token),
    }))
}

/// reset_password
///
/// [Public Route] Consumes an unexpired reset token and sets the new password.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let Some(user) = state
        .repo
        .find_user_by_reset_token(&payload.token, Utc::now())
        .await?
    else {
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    };

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    state.repo.update_password(user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "password reset");

    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// setup_admin
///
/// [Public Route] Bootstraps the administrator named in the configuration: creates it, or
/// promotes an existing account of that name to `ADMIN`. Idempotent.
#[utoipa::path(
    get,
    path = "/api/setup-admin",
    responses((status = 200, description = "Admin ready", body = MessageResponse))
)]
pub async fn setup_admin(State(state): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    let admin = &state.config.admin;

    if let Some(existing) = state.repo.find_user_by_username(&admin.username).await? {
        if existing.role != Role::Admin {
            state.repo.set_user_role(existing.id, Role::Admin).await?;
            tracing::info!(user_id = existing.id, "existing user promoted to admin");
            return Ok(Json(MessageResponse::new(format!(
                "Existing '{}' user updated to ADMIN role",
                admin.username
            ))));
        }
        return Ok(Json(MessageResponse::new("Admin user already exists")));
    }

    let password_hash = hash_password(admin.password.clone(), state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(NewUser {
            username: admin.username.clone(),
            email: Some(admin.email.clone()),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = user.id, "admin user created");

    Ok(Json(MessageResponse::new(format!(
        "Admin user created: {}",
        admin.username
    ))))
}

/// get_me
///
/// [Authenticated Route] The identity carried by the caller's session.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = PublicUser),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(AuthUser { id, username, role }: AuthUser) -> Json<PublicUser> {
    Json(PublicUser { id, username, role })
}

// --- BMI Handlers ---

/// create_bmi_record
///
/// [Authenticated Route] Records a measurement for the caller. Weight in kg, height in cm.
#[utoipa::path(
    post,
    path = "/api/bmi",
    request_body = CreateBmiRequest,
    responses(
        (status = 201, description = "Recorded", body = BmiCreatedResponse),
        (status = 400, description = "Invalid measurement"),
        (status = 401, description = "No session")
    )
)]
pub async fn create_bmi_record(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateBmiRequest>,
) -> Result<(StatusCode, Json<BmiCreatedResponse>), AppError> {
    let bmi = calculate_bmi(payload.weight, payload.height)?;

    let record = state
        .repo
        .create_bmi_record(NewBmiRecord {
            user_id: id,
            weight: payload.weight,
            height: payload.height,
            bmi,
            recorded_at: Utc::now(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BmiCreatedResponse {
            message: "Recorded successfully".to_string(),
            record: record.into(),
        }),
    ))
}

/// list_bmi_records
///
/// [Authenticated Route] The caller's full history, newest first.
#[utoipa::path(
    get,
    path = "/api/bmi",
    responses(
        (status = 200, description = "History", body = BmiHistoryResponse),
        (status = 401, description = "No session")
    )
)]
pub async fn list_bmi_records(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BmiHistoryResponse>, AppError> {
    let records = state.repo.list_bmi_records(id).await?;
    Ok(Json(BmiHistoryResponse {
        records: records.into_iter().map(BmiEntry::from).collect(),
    }))
}

/// get_report
///
/// [Authenticated Route] Records inside the requested window, oldest first, with a summary.
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report", body = ReportResponse),
        (status = 401, description = "No session")
    )
)]
pub async fn get_report(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, AppError> {
    let period = ReportPeriod::parse(query.period.as_deref());
    let (start_date, end_date) = period.window(Utc::now());

    let records = state
        .repo
        .bmi_records_between(id, start_date, end_date)
        .await?;
    let summary = TrendSummary::from_records(&records);

    Ok(Json(ReportResponse {
        records: records.into_iter().map(BmiEntry::from).collect(),
        period,
        start_date,
        end_date,
        summary,
    }))
}

// --- Admin Handlers ---

/// get_admin_stats
///
/// [Admin Route] Account and record counts plus the newest accounts.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminStats),
        (status = 401, description = "No session"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_admin_stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<AdminStats>, AppError> {
    Ok(Json(state.repo.get_stats(RECENT_USERS_LIMIT).await?))
}

// --- Pages & Fallback ---

/// render_page
///
/// Serves the HTML shell of a page. Rendering happens client-side; by the time this runs the
/// route guard has already admitted the request.
pub async fn render_page(page: &'static Page) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{} · BMI Tracker</title></head>\n<body><main id=\"app\" data-page=\"{}\"></main></body>\n</html>\n",
        page.title, page.path
    ))
}

/// Fallback for unrouted paths that made it past the guard.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}

fn public_identity(user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        username: user.username.clone(),
        role: user.role,
    }
}
