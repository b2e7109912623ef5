use chrono::{DateTime, Utc};
use taskdesk_shared::{Role, User};
use tracing::{debug, warn};

use super::{Mount, PageContext, Route, authenticate};
use crate::api::ApiClient;
use crate::session::Session;
use crate::token_store::TokenStorage;

pub struct Dashboard<'a> {
    ctx: PageContext<'a>,
    api: ApiClient,
    profile: Option<User>,
}

impl<'a> Dashboard<'a> {
    pub fn mount(
        store: &'a dyn TokenStorage,
        api: &ApiClient,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Mount<Self>> {
        let session = match authenticate(store, now)? {
            Ok(session) => session,
            Err(route) => return Ok(Mount::Redirect(route)),
        };
        Ok(Mount::Ready(Self {
            api: api.with_session(&session),
            ctx: PageContext::new(store, session),
            profile: None,
        }))
    }

    pub fn session(&self) -> &Session {
        self.ctx.session()
    }

    pub fn subject(&self) -> Option<&str> {
        self.session().subject()
    }

    pub fn role(&self) -> Role {
        self.session().role()
    }

    /// Sections offered from here; user management only for admins.
    pub fn sections(&self) -> Vec<Route> {
        if self.session().is_admin() {
            vec![Route::Tasks, Route::Users]
        } else {
            vec![Route::Tasks]
        }
    }

    pub fn profile(&self) -> Option<&User> {
        self.profile.as_ref()
    }

    pub fn redirect(&self) -> Option<Route> {
        self.ctx.redirect()
    }

    /// Looks up the caller's user record. A lookup the backend refuses for
    /// any reason other than 401 leaves the profile empty.
    pub async fn load_profile(&mut self, page_size: u32) -> anyhow::Result<Option<&User>> {
        let Some(subject) = self.subject().map(str::to_string) else {
            debug!("token has no subject; skipping profile lookup");
            return Ok(None);
        };
        match self.api.current_user(&subject, page_size).await {
            Ok(found) => self.profile = found,
            Err(err) => {
                warn!(error = %err, "profile lookup failed");
                self.ctx.note(&err)?;
            }
        }
        Ok(self.profile.as_ref())
    }

    pub fn logout(&mut self) -> anyhow::Result<Route> {
        self.ctx.logout()
    }
}
