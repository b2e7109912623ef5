use anyhow::anyhow;
use chrono::{DateTime, Utc};
use taskdesk_shared::{Task, TaskUpdate};
use tracing::{debug, info, instrument, warn};

use super::{Mount, PageContext, Route, authenticate};
use crate::api::ApiClient;
use crate::filter::FilterInput;
use crate::forms::{ConfirmDialog, FormModal, TaskCreateForm, TaskEditForm};
use crate::list::{ListController, TaskSource};
use crate::session::Session;
use crate::token_store::TokenStorage;

/// Task listing with filters, paging and the create/edit/delete dialogs.
///
/// Backend failures never abort an operation here: they end up in the list
/// error or in the open dialog, and a 401 turns into a login redirect. Only
/// bad local input and token store failures come back as `Err`.
pub struct TasksPage<'a> {
    ctx: PageContext<'a>,
    api: ApiClient,
    list: ListController<TaskSource>,
    filter_input: FilterInput,
    create: Option<FormModal<TaskCreateForm>>,
    edit: Option<FormModal<TaskEditForm>>,
    confirm: ConfirmDialog,
}

impl<'a> TasksPage<'a> {
    /// Guards the screen, seeds the owner pin, then loads the first
    /// unfiltered page.
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
        // Blank criteria still pin non-admins to their own id.
        let filter_input = FilterInput::default();
        let mut list = ListController::new(TaskSource::new(api.clone()), page_size);
        list.set_filters(filter_input.resolve(&session)?);

        let mut page = Self {
            list,
            api,
            ctx: PageContext::new(store, session),
            filter_input,
            create: None,
            edit: None,
            confirm: ConfirmDialog::default(),
        };

        if let Err(err) = page.list.load(0).await {
            page.ctx.note(&err)?;
        }
        Ok(match page.redirect() {
            Some(route) => Mount::Redirect(route),
            None => Mount::Ready(page),
        })
    }

    pub fn session(&self) -> &Session {
        self.ctx.session()
    }

    pub fn list(&self) -> &ListController<TaskSource> {
        &self.list
    }

    pub fn items(&self) -> &[Task] {
        self.list.items()
    }

    pub fn error(&self) -> Option<&str> {
        self.list.error()
    }

    pub fn redirect(&self) -> Option<Route> {
        self.ctx.redirect()
    }

    pub fn filter_input(&self) -> &FilterInput {
        &self.filter_input
    }

    /// Resolves `input` for this session and shows the first matching page.
    pub async fn filter(&mut self, input: FilterInput) -> anyhow::Result<()> {
        self.filter_page(input, 0).await
    }

    #[instrument(skip(self))]
    pub async fn filter_page(&mut self, input: FilterInput, page: u32) -> anyhow::Result<()> {
        let filters = input.resolve(self.ctx.session())?;
        self.filter_input = input;
        self.list.set_filters(filters);
        self.refresh(page).await
    }

    /// Reloads `page` with the active filters.
    pub async fn refresh(&mut self, page: u32) -> anyhow::Result<()> {
        if let Err(err) = self.list.apply_filters(page).await {
            self.ctx.note(&err)?;
        }
        Ok(())
    }

    pub async fn next_page(&mut self) -> anyhow::Result<bool> {
        match self.list.next_page().await {
            Ok(moved) => Ok(moved),
            Err(err) => {
                self.ctx.note(&err)?;
                Ok(false)
            }
        }
    }

    pub async fn previous_page(&mut self) -> anyhow::Result<bool> {
        match self.list.previous_page().await {
            Ok(moved) => Ok(moved),
            Err(err) => {
                self.ctx.note(&err)?;
                Ok(false)
            }
        }
    }

    pub fn open_create(&mut self) -> &mut FormModal<TaskCreateForm> {
        self.create.insert(FormModal::open(TaskCreateForm::default()))
    }

    pub fn create_form(&self) -> Option<&FormModal<TaskCreateForm>> {
        self.create.as_ref()
    }

    /// Creates the task, then reloads the current page so it shows up under
    /// the active filters.
    #[instrument(skip(self))]
    pub async fn submit_create(&mut self) -> anyhow::Result<Option<Task>> {
        let Some(modal) = self.create.as_mut() else {
            return Err(anyhow!("no task form is open"));
        };

        let api = &self.api;
        let session = self.ctx.session();
        let saved = modal
            .submit(|form| async move {
                let assignee = form.assignee(session);
                debug!(%assignee, "creating task");
                api.create_task(&form.to_request(), assignee).await
            })
            .await;

        if modal.unauthorized() {
            self.ctx.expire()?;
            return Ok(None);
        }
        let Some(task) = saved else {
            return Ok(None);
        };

        info!(id = task.id, "task created");
        self.create = None;
        self.refresh(self.list.current_page()).await?;
        Ok(Some(task))
    }

    /// Opens the edit dialog for a task on the visible page.
    pub fn open_edit(&mut self, id: i64) -> anyhow::Result<&mut FormModal<TaskEditForm>> {
        let task = self
            .items()
            .iter()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("task {id} is not on the current page"))?;
        let form = TaskEditForm::from_task(task);
        Ok(self.edit.insert(FormModal::open(form)))
    }

    pub fn edit_form(&self) -> Option<&FormModal<TaskEditForm>> {
        self.edit.as_ref()
    }

    /// Sends the full update and swaps the returned task into the list.
    #[instrument(skip(self))]
    pub async fn submit_edit(&mut self) -> anyhow::Result<Option<Task>> {
        let Some(modal) = self.edit.as_mut() else {
            return Err(anyhow!("no edit form is open"));
        };

        let api = &self.api;
        let saved = modal
            .submit(|form| async move { api.update_task(form.id, &form.to_update()).await })
            .await;

        if modal.unauthorized() {
            self.ctx.expire()?;
            return Ok(None);
        }
        let Some(task) = saved else {
            return Ok(None);
        };

        info!(id = task.id, "task updated");
        self.edit = None;
        self.list.patch_item_in_place(task.clone());
        Ok(Some(task))
    }

    /// Marks a task done and patches the visible copy. Nothing is refetched.
    #[instrument(skip(self))]
    pub async fn complete(&mut self, id: i64) -> anyhow::Result<Option<Task>> {
        match self.api.patch_task(id, &TaskUpdate::completed()).await {
            Ok(task) => {
                if !self.list.patch_item_in_place(task.clone()) {
                    debug!(id, "completed task is not on the visible page");
                }
                Ok(Some(task))
            }
            Err(err) => {
                warn!(id, error = %err, "could not complete task");
                self.list.set_error(err.to_string());
                self.ctx.note(&err)?;
                Ok(None)
            }
        }
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

    /// Deletes the pending task and reloads the current page. The dialog
    /// closes whatever the outcome; a failure keeps the list as it was.
    #[instrument(skip(self))]
    pub async fn confirm_delete(&mut self) -> anyhow::Result<bool> {
        let Some(id) = self.confirm.confirm() else {
            return Ok(false);
        };
        let removal = self.api.delete_task(id);
        match self.list.remove_and_refresh(id, removal).await {
            Ok(()) => Ok(true),
            Err(err) => {
                self.ctx.note(&err)?;
                Ok(false)
            }
        }
    }

    pub fn logout(&mut self) -> anyhow::Result<Route> {
        self.ctx.logout()
    }
}
