//! Screens and the navigation between them.
//!
//! Every screen except login is mounted behind the session guard; a missing,
//! expired or refused token sends the caller back to [`Route::Login`].

pub mod dashboard;
pub mod login;
pub mod tasks;
pub mod users;

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::session::{GuardState, Session, SessionGuard};
use crate::token_store::TokenStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Tasks,
    Users,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::Tasks => "/tareas",
            Route::Users => "/usuarios",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Result of opening a guarded screen.
#[derive(Debug)]
pub enum Mount<P> {
    Ready(P),
    Redirect(Route),
}

impl<P> Mount<P> {
    pub fn ready(self) -> Option<P> {
        match self {
            Mount::Ready(page) => Some(page),
            Mount::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<Route> {
        match self {
            Mount::Ready(_) => None,
            Mount::Redirect(route) => Some(*route),
        }
    }
}

/// Runs a fresh guard over the stored token.
pub fn authenticate(store: &dyn TokenStorage, now: DateTime<Utc>) -> anyhow::Result<Result<Session, Route>> {
    let mut guard = SessionGuard::new();
    match guard.check(store, now)? {
        GuardState::Authenticated(session) => Ok(Ok(session.clone())),
        state => {
            info!(?state, "redirecting to login");
            Ok(Err(Route::Login))
        }
    }
}

pub fn logout(store: &dyn TokenStorage) -> anyhow::Result<Route> {
    store.clear()?;
    info!("logged out");
    Ok(Route::Login)
}

/// State every guarded screen carries: the token store and where to go next
/// once the backend stops accepting the session.
pub(crate) struct PageContext<'a> {
    store: &'a dyn TokenStorage,
    session: Session,
    redirect: Option<Route>,
}

impl<'a> PageContext<'a> {
    pub(crate) fn new(store: &'a dyn TokenStorage, session: Session) -> Self {
        Self {
            store,
            session,
            redirect: None,
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn redirect(&self) -> Option<Route> {
        self.redirect
    }

    /// A 401 drops the stored token and schedules the login redirect.
    pub(crate) fn note(&mut self, err: &ApiError) -> anyhow::Result<()> {
        if err.is_unauthorized() {
            self.expire()?;
        }
        Ok(())
    }

    pub(crate) fn expire(&mut self) -> anyhow::Result<()> {
        warn!("credentials refused by backend; clearing token");
        self.store.clear()?;
        self.redirect = Some(Route::Login);
        Ok(())
    }

    pub(crate) fn logout(&mut self) -> anyhow::Result<Route> {
        let route = logout(self.store)?;
        self.redirect = Some(route);
        Ok(route)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::{PageContext, Route, authenticate, logout};
    use crate::error::ApiError;
    use crate::session::Session;
    use crate::token_store::{MemoryTokenStore, TokenStorage};

    pub(crate) fn token(role: &str, id: i64) -> String {
        let payload = serde_json::json!({
            "sub": "ana@example.com",
            "role": role,
            "id": id,
            "exp": Utc::now().timestamp() + 3600
        });
        encode(&Header::default(), &payload, &EncodingKey::from_secret(b"k")).expect("token")
    }

    #[test]
    fn guard_redirects_without_token() {
        let store = MemoryTokenStore::default();
        let result = authenticate(&store, Utc::now()).expect("authenticate");
        assert_eq!(result.err(), Some(Route::Login));
    }

    #[test]
    fn unauthorized_clears_token() {
        let store = MemoryTokenStore::with_token(token("USER", 2));
        let session = authenticate(&store, Utc::now())
            .expect("authenticate")
            .expect("session");
        let mut ctx = PageContext::new(&store, session);

        ctx.note(&ApiError::message("Error 500: Internal Server Error"))
            .expect("note");
        assert_eq!(ctx.redirect(), None);
        assert!(store.load().expect("load").is_some());

        let refused = ApiError::Generic {
            status: Some(401),
            message: "Error 401: Unauthorized".to_string(),
        };
        ctx.note(&refused).expect("note");
        assert_eq!(ctx.redirect(), Some(Route::Login));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn logout_removes_token() {
        let store = MemoryTokenStore::with_token(token("ADMIN", 1));
        assert_eq!(logout(&store).expect("logout"), Route::Login);
        assert_eq!(store.load().expect("load"), None);

        let session = Session::from_token(token("ADMIN", 1)).expect("session");
        let mut ctx = PageContext::new(&store, session);
        assert_eq!(ctx.logout().expect("logout"), Route::Login);
        assert_eq!(ctx.redirect(), Some(Route::Login));
    }
}
