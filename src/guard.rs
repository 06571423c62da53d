//! Session-authenticated route guard.
//!
//! Every request not excluded by the matcher passes through [`route_guard`] exactly once before
//! routing. The decision is a pure function of (path, session) computed by
//! [`RouteTable::decide`]; the middleware only resolves the session and turns the decision
//! into a response.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};

use crate::session::{SESSION_COOKIE, Session, SessionCodec};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";

/// RouteClass
///
/// Access level of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable without a session.
    Public,
    /// Requires a valid session.
    Protected,
    /// Requires a valid session with the admin role.
    AdminOnly,
}

/// Why a request was redirected. Logged, never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No cookie, or a cookie that failed to decode or has expired.
    AuthenticationAbsent,
    /// Valid session without the role an admin path requires.
    AuthorizationDenied,
    /// Signed-in user asked for the login or register page.
    AlreadySignedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect {
        to: &'static str,
        reason: DenialReason,
    },
}

/// RouteTable
///
/// Ordered `(prefix, class)` pairs evaluated first-match-wins, plus the prefixes the guard never
/// intercepts. A prefix matches the path itself and anything below it on a segment boundary,
/// so `/admin` covers `/admin/stats` but not `/administrator`. Unmatched paths are Protected.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<(&'static str, RouteClass)>,
    excluded: Vec<&'static str>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            rules: vec![
                // Auth-flow pages.
                (LOGIN_PATH, RouteClass::Public),
                (REGISTER_PATH, RouteClass::Public),
                ("/forgot-password", RouteClass::Public),
                ("/reset-password", RouteClass::Public),
                // Their API equivalents and the bootstrap endpoint. The default exclusions skip
                // `/api`; these keep tables without that exclusion correct.
                ("/api/auth/login", RouteClass::Public),
                ("/api/auth/register", RouteClass::Public),
                ("/api/auth/forgot-password", RouteClass::Public),
                ("/api/auth/reset-password", RouteClass::Public),
                ("/api/setup-admin", RouteClass::Public),
                ("/admin", RouteClass::AdminOnly),
            ],
            // JSON endpoints answer 401/403 through their extractors instead of redirecting.
            excluded: vec![
                "/api",
                "/static",
                "/favicon.ico",
                "/health",
                "/swagger-ui",
                "/api-docs",
            ],
        }
    }
}

impl RouteTable {
    pub fn new(rules: Vec<(&'static str, RouteClass)>, excluded: Vec<&'static str>) -> Self {
        Self { rules, excluded }
    }

    /// Paths the guard lets through without looking at them (the JSON API, static assets,
    /// docs, probes).
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = normalize(path);
        self.excluded.iter().any(|prefix| covers(prefix, path))
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize(path);
        self.rules
            .iter()
            .find(|(prefix, _)| covers(prefix, path))
            .map(|(_, class)| *class)
            .unwrap_or(RouteClass::Protected)
    }

    /// decide
    ///
    /// The decision table, evaluated in order:
    /// 1. not Public and no session: login.
    /// 2. login/register page with a session: home.
    /// 3. AdminOnly without an admin session: home.
    /// 4. pass.
    pub fn decide(&self, path: &str, session: Option<&Session>) -> GuardDecision {
        let class = self.classify(path);

        if class != RouteClass::Public && session.is_none() {
            return GuardDecision::Redirect {
                to: LOGIN_PATH,
                reason: DenialReason::AuthenticationAbsent,
            };
        }

        let path = normalize(path);
        if (path == LOGIN_PATH || path == REGISTER_PATH) && session.is_some() {
            return GuardDecision::Redirect {
                to: HOME_PATH,
                reason: DenialReason::AlreadySignedIn,
            };
        }

        if class == RouteClass::AdminOnly && !session.is_some_and(Session::is_admin) {
            return GuardDecision::Redirect {
                to: HOME_PATH,
                reason: DenialReason::AuthorizationDenied,
            };
        }

        GuardDecision::Pass
    }
}

// Trailing slashes are insignificant, except for the root itself.
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// resolve_session
///
/// Absent cookie and undecodable cookie collapse to the same `None`; which one happened is
/// only visible in debug logs.
pub fn resolve_session(
    jar: &CookieJar,
    codec: &SessionCodec,
    now: DateTime<Utc>,
) -> Option<Session> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match codec.decode_at(cookie.value(), now) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!(error = %e, "discarding unusable session cookie");
            None
        }
    }
}

/// route_guard
///
/// Middleware applied around the whole router. Resolves the session, consults the
/// [`RouteTable`], and either redirects or forwards the request with the decoded
/// [`Session`] in its extensions.
pub async fn route_guard(
    State(codec): State<SessionCodec>,
    State(table): State<Arc<RouteTable>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if table.is_excluded(&path) {
        return next.run(request).await;
    }

    let session = resolve_session(&jar, &codec, Utc::now());

    match table.decide(&path, session.as_ref()) {
        GuardDecision::Pass => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GuardDecision::Redirect { to, reason } => {
            tracing::debug!(%path, ?reason, redirect = to, "route guard redirect");
            Redirect::temporary(to).into_response()
        }
    }
}
