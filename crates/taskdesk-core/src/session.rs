//! Client-side session gate.
//!
//! The stored bearer token is decoded locally only to decide what to show;
//! signatures are never checked here and the backend stays the authority.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use taskdesk_shared::Role;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::token_store::TokenStorage;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token is empty")]
    Empty,
    #[error("token cannot be read: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    /// Unknown or absent roles are treated as the least privileged one.
    pub fn role(&self) -> Role {
        self.role
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// A token without `exp` never counts as live.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp <= now.timestamp(),
            None => true,
        }
    }
}

/// Reads the claims without checking the signature. The client holds no
/// signing key; it only needs the claims to pick screens, and expiry is
/// judged by [`Claims::is_expired`] so a missing `exp` is handled here too.
pub fn decode_claims(token: &str) -> Result<Claims, ClaimsError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ClaimsError::Empty);
    }
    // Segments are base64url without padding; tolerate tokens that carry it.
    let normalized = token
        .split('.')
        .map(|segment| segment.trim_end_matches('='))
        .collect::<Vec<_>>()
        .join(".");

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(&normalized, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    claims: Claims,
}

impl Session {
    pub fn from_token(token: impl Into<String>) -> Result<Self, ClaimsError> {
        let token = token.into();
        let claims = decode_claims(&token)?;
        Ok(Self { token, claims })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn role(&self) -> Role {
        self.claims.role()
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_elevated()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.claims.id
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims.expires_at()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Missing,
    Expired,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardState {
    #[default]
    Unchecked,
    Authenticated(Session),
    Unauthenticated(Reason),
}

#[derive(Debug, Default)]
pub struct SessionGuard {
    state: GuardState,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            GuardState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Reads the persisted token and settles the guard.
    ///
    /// Expired or undecodable tokens are removed from the store. Once
    /// unauthenticated, the guard stays there until a new one is built.
    #[tracing::instrument(skip(self, store, now))]
    pub fn check(
        &mut self,
        store: &dyn TokenStorage,
        now: DateTime<Utc>,
    ) -> anyhow::Result<&GuardState> {
        if matches!(self.state, GuardState::Unauthenticated(_)) {
            return Ok(&self.state);
        }

        let Some(token) = store.load()? else {
            debug!("no stored token");
            self.state = GuardState::Unauthenticated(Reason::Missing);
            return Ok(&self.state);
        };

        self.state = match Session::from_token(token) {
            Ok(session) if session.claims().is_expired(now) => {
                info!(exp = ?session.claims().exp, "stored token expired");
                store.clear()?;
                GuardState::Unauthenticated(Reason::Expired)
            }
            Ok(session) => {
                debug!(role = %session.role(), subject = ?session.subject(), "session authenticated");
                GuardState::Authenticated(session)
            }
            Err(err) => {
                warn!(error = %err, "stored token is invalid");
                store.clear()?;
                GuardState::Unauthenticated(Reason::Malformed)
            }
        };

        Ok(&self.state)
    }
}
