use anyhow::anyhow;
use chrono::{DateTime, Utc};
use taskdesk_shared::User;
use tracing::{info, instrument};

use super::{Mount, PageContext, Route, authenticate};
use crate::api::ApiClient;
use crate::forms::{ConfirmDialog, FormModal, UserForm};
use crate::list::{ListController, UserSource};
use crate::session::Session;
use crate::token_store::TokenStorage;

/// User administration. Every successful change reloads the current page.
pub struct UsersPage<'a> {
    ctx: PageContext<'a>,
    api: ApiClient,
    list: ListController<UserSource>,
    create: Option<FormModal<UserForm>>,
    edit: Option<(i64, FormModal<UserForm>)>,
    confirm: ConfirmDialog,
}

impl<'a> UsersPage<'a> {
    #[instrument(skip(store, api, now))]
    pub async fn mount(
        store: &'a dyn TokenStorage,
        api: &ApiClient,
        page_size: u32,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Mount<Self>> {
        let session = match authenticate(store, now)? {
            Ok(session) => session,
            Err(route) => return Ok(Mount::Redirect(route)),
        };

        let api = api.with_session(&session);
        let mut page = Self {
            list: ListController::new(UserSource::new(api.clone()), page_size),
            api,
            ctx: PageContext::new(store, session),
            create: None,
            edit: None,
            confirm: ConfirmDialog::default(),
        };

        page.reload(0).await?;
        Ok(match page.redirect() {
            Some(route) => Mount::Redirect(route),
            None => Mount::Ready(page),
        })
    }

    pub fn session(&self) -> &Session {
        self.ctx.session()
    }

    pub fn list(&self) -> &ListController<UserSource> {
        &self.list
    }

    pub fn items(&self) -> &[User] {
        self.list.items()
    }

    pub fn error(&self) -> Option<&str> {
        self.list.error()
    }

    pub fn redirect(&self) -> Option<Route> {
        self.ctx.redirect()
    }

    pub async fn reload(&mut self, page: u32) -> anyhow::Result<()> {
        if let Err(err) = self.list.load(page).await {
            self.ctx.note(&err)?;
        }
        Ok(())
    }

    pub async fn next_page(&mut self) -> anyhow::Result<bool> {
        if !self.list.can_next() {
            return Ok(false);
        }
        let before = self.list.current_page();
        self.reload(before + 1).await?;
        Ok(self.list.current_page() != before)
    }

    pub async fn previous_page(&mut self) -> anyhow::Result<bool> {
        if !self.list.can_previous() {
            return Ok(false);
        }
        let before = self.list.current_page();
        self.reload(before - 1).await?;
        Ok(self.list.current_page() != before)
    }

    pub fn open_create(&mut self) -> &mut FormModal<UserForm> {
        self.create.insert(FormModal::open(UserForm::default()))
    }

    pub fn create_form(&self) -> Option<&FormModal<UserForm>> {
        self.create.as_ref()
    }

    #[instrument(skip(self))]
    pub async fn submit_create(&mut self) -> anyhow::Result<Option<User>> {
        let Some(modal) = self.create.as_mut() else {
            return Err(anyhow!("no user form is open"));
        };

        let api = &self.api;
        let saved = modal
            .submit(|form| async move { api.create_user(&form.to_request()).await })
            .await;

        if modal.unauthorized() {
            self.ctx.expire()?;
            return Ok(None);
        }
        let Some(user) = saved else {
            return Ok(None);
        };

        info!(id = user.id, "user created");
        self.create = None;
        self.reload(self.list.current_page()).await?;
        Ok(Some(user))
    }

    /// Opens the edit dialog for a listed user; the password starts blank.
    pub fn open_edit(&mut self, id: i64) -> anyhow::Result<&mut FormModal<UserForm>> {
        let user = self
            .items()
            .iter()
            .find(|user| user.id == id)
            .ok_or_else(|| anyhow!("user {id} is not on the current page"))?;
        let form = UserForm::from_user(user);
        let (_, modal) = self.edit.insert((id, FormModal::open(form)));
        Ok(modal)
    }

    pub fn edit_form(&self) -> Option<&FormModal<UserForm>> {
        self.edit.as_ref().map(|(_, modal)| modal)
    }

    #[instrument(skip(self))]
    pub async fn submit_edit(&mut self) -> anyhow::Result<Option<User>> {
        let Some((id, modal)) = self.edit.as_mut() else {
            return Err(anyhow!("no edit form is open"));
        };

        let id = *id;
        let api = &self.api;
        let saved = modal
            .submit(|form| async move { api.update_user(id, &form.to_request()).await })
            .await;

        if modal.unauthorized() {
            self.ctx.expire()?;
            return Ok(None);
        }
        let Some(user) = saved else {
            return Ok(None);
        };

        info!(id, "user updated");
        self.edit = None;
        self.reload(self.list.current_page()).await?;
        Ok(Some(user))
    }

    pub fn ask_delete(&mut self, id: i64) {
        self.confirm.ask(id);
    }

    pub fn confirm_dialog(&self) -> &ConfirmDialog {
        &self.confirm
    }

    pub fn cancel_delete(&mut self) {
        self.confirm.cancel();
    }

    /// Deletes the pending user and reloads the current page. The dialog
    /// closes whatever the outcome.
    #[instrument(skip(self))]
    pub async fn confirm_delete(&mut self) -> anyhow::Result<bool> {
        let Some(id) = self.confirm.confirm() else {
            return Ok(false);
        };
        if let Err(err) = self.api.delete_user(id).await {
            self.list.set_error(err.to_string());
            self.ctx.note(&err)?;
            return Ok(false);
        }
        info!(id, "user deleted");
        self.reload(self.list.current_page()).await?;
        Ok(true)
    }

    pub fn logout(&mut self) -> anyhow::Result<Route> {
        self.ctx.logout()
    }
}
