use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PublicUser, Role};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Session
///
/// The authenticated identity carried entirely inside the signed token. Nothing is stored
/// server-side: a session ends when the cookie is deleted or `expires_at` passes.
/// `expires_at` has whole-second precision because it travels as a unix timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Issues a session for `user` that expires `ttl` after `now`, truncated to the second.
    pub fn issue(
        user: &PublicUser,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, EncodeError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .and_then(|at| DateTime::from_timestamp(at.timestamp(), 0))
            .filter(|at| *at > now)
            .ok_or(EncodeError::Lifetime(ttl))?;

        Ok(Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn identity(&self) -> PublicUser {
        PublicUser {
            id: self.user_id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// SessionClaims
///
/// Wire form of a [`Session`] inside the JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User primary key.
    pub uid: i64,
    pub username: String,
    pub role: Role,
    /// Expiration Time (exp): unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to sign session token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
    /// The lifetime does not yield an expiry after the issue time.
    #[error("session lifetime {0} is out of range")]
    Lifetime(Duration),
}

/// DecodeError
///
/// Every variant means "unauthenticated". The distinction exists for logging only and is
/// never shown to the client.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bad signature, wrong algorithm, malformed token, or claims of the wrong shape.
    #[error("invalid session token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    /// Signature checks out but `expires_at` is not in the future.
    #[error("session expired at {0}")]
    Expired(DateTime<Utc>),
}

/// SessionCodec
///
/// Turns a [`Session`] into an opaque HS256-signed token and back. Built once at startup from
/// the process-wide secret and shared read-only; cloning it is cheap.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `decode_at` against an explicit clock with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode(&self, session: &Session) -> Result<String, EncodeError> {
        let claims = SessionClaims {
            uid: session.user_id,
            username: session.username.clone(),
            role: session.role,
            exp: session.expires_at.timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// decode
    ///
    /// Verifies the token against the current time.
    pub fn decode(&self, token: &str) -> Result<Session, DecodeError> {
        self.decode_at(token, Utc::now())
    }

    /// decode_at
    ///
    /// Verifies signature and shape, then requires `expires_at > now`.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, DecodeError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?.claims;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| DecodeError::Invalid(ErrorKind::InvalidToken.into()))?;
        if expires_at <= now {
            return Err(DecodeError::Expired(expires_at));
        }

        Ok(Session {
            user_id: claims.uid,
            username: claims.username,
            role: claims.role,
            expires_at,
        })
    }
}
