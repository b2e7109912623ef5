use taskdesk_shared::LoginRequest;
use tracing::{info, warn};

use super::Route;
use crate::api::ApiClient;
use crate::token_store::TokenStorage;

#[derive(Debug, Default)]
pub struct LoginPage {
    pub form: LoginRequest,
    error: Option<String>,
}

impl LoginPage {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            form: LoginRequest {
                username: username.into(),
                password: password.into(),
            },
            error: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sends the credentials; on success the token is stored and the
    /// dashboard is next. On failure the page keeps the message.
    #[tracing::instrument(skip(self, api, store), fields(username = %self.form.username))]
    pub async fn submit(&mut self, api: &ApiClient, store: &dyn TokenStorage) -> Option<Route> {
        self.error = None;
        match api.login(store, &self.form).await {
            Ok(_) => {
                info!("signed in");
                Some(Route::Dashboard)
            }
            Err(err) => {
                warn!(error = %err, "sign-in failed");
                self.error = Some(err.to_string());
                None
            }
        }
    }
}
