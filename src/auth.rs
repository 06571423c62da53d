use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use time::OffsetDateTime;

use crate::{
    config::AppConfig,
    error::AppError,
    guard::resolve_session,
    models::Role,
    session::{SESSION_COOKIE, Session, SessionCodec},
};

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated API request, taken from the session token.
/// Handlers use it for the user's id and for role checks.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<Session> for AuthUser {
    fn from(session: Session) -> Self {
        Self {
            id: session.user_id,
            username: session.username,
            role: session.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse the `Session` the route guard already decoded into the request extensions.
/// 2. Otherwise decode the `session` cookie directly. This is the usual case: the guard does
///    not intercept `/api`.
///
/// Rejection: `StatusCode::UNAUTHORIZED` for a missing, invalid, or expired session.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionCodec: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone().into());
        }

        let codec = SessionCodec::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        resolve_session(&jar, &codec, Utc::now())
            .map(AuthUser::from)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// AdminUser
///
/// An [`AuthUser`] whose role is `ADMIN`. Rejects with 401 when there is no session and 403
/// when the session belongs to a regular user.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    SessionCodec: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(AdminUser(user))
    }
}

/// session_cookie
///
/// The `HttpOnly` cookie carrying a freshly minted token; its expiry mirrors the session's.
pub fn session_cookie(
    token: String,
    session: &Session,
    config: &AppConfig,
) -> Result<Cookie<'static>, AppError> {
    let expires = OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp())
        .map_err(|e| AppError::Internal(format!("session expiry out of range: {e}")))?;

    Ok(Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .expires(expires)
        .build())
}

/// The removal counterpart of [`session_cookie`]; path must match for browsers to drop it.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
