//! Create/edit dialogs and the delete confirmation.
//!
//! Every dialog is one `FormModal` over a field set; how errors are shown and
//! which fields are checked locally comes from its `FormConfig`.

use std::collections::BTreeMap;
use std::future::Future;

use taskdesk_shared::{Role, Task, TaskRequest, TaskUpdate, User, UserRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::Assignee;
use crate::error::ApiError;
use crate::session::Session;

pub const REQUIRED_MESSAGE: &str = "required";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    Unknown(String),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Errors land next to fields; anything without field detail goes to
    /// `fallback_field`.
    PerField { fallback_field: &'static str },
    /// A single message above the form.
    Banner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormConfig {
    pub error_mode: ErrorMode,
    /// Fields that must be non-blank before anything is sent.
    pub required: &'static [&'static str],
}

pub trait FormFields: Clone {
    const FIELDS: &'static [&'static str];

    fn config() -> FormConfig;

    fn value(&self, field: &str) -> Option<String>;

    fn set(&mut self, field: &str, value: &str) -> Result<(), FieldError>;
}

#[derive(Debug, Clone)]
pub struct FormModal<F> {
    fields: F,
    config: FormConfig,
    errors: BTreeMap<String, String>,
    banner: Option<String>,
    failed_status: Option<u16>,
    submitting: bool,
    open: bool,
}

impl<F: FormFields> FormModal<F> {
    pub fn open(fields: F) -> Self {
        Self {
            fields,
            config: F::config(),
            errors: BTreeMap::new(),
            banner: None,
            failed_status: None,
            submitting: false,
            open: true,
        }
    }

    pub fn with_config(mut self, config: FormConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fields(&self) -> &F {
        &self.fields
    }

    pub fn config(&self) -> FormConfig {
        self.config
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The last submission was refused for bad credentials.
    pub fn unauthorized(&self) -> bool {
        self.failed_status == Some(401)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Editing a field drops the error shown for it.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), FieldError> {
        self.fields.set(field, value)?;
        self.errors.remove(field);
        Ok(())
    }

    /// Sends the form through `action`.
    ///
    /// On success the dialog closes and the saved entity is handed back for
    /// the caller to refresh or patch its list with. On failure the dialog
    /// stays open with its errors populated. A closed dialog or one already
    /// submitting does nothing.
    pub async fn submit<T, A, Fut>(&mut self, action: A) -> Option<T>
    where
        A: FnOnce(F) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if !self.open || self.submitting {
            debug!(open = self.open, submitting = self.submitting, "submit ignored");
            return None;
        }

        self.errors.clear();
        self.banner = None;
        self.failed_status = None;

        let missing = self.missing_required();
        if !missing.is_empty() {
            debug!(?missing, "required fields blank");
            for field in missing {
                self.errors.insert(field.to_string(), REQUIRED_MESSAGE.to_string());
            }
            if self.config.error_mode == ErrorMode::Banner {
                self.banner = Some(summarize(&self.errors));
            }
            return None;
        }

        self.submitting = true;
        let result = action(self.fields.clone()).await;
        self.submitting = false;

        match result {
            Ok(saved) => {
                info!("form saved");
                self.open = false;
                Some(saved)
            }
            Err(err) => {
                warn!(error = %err, "form rejected");
                self.show_error(err);
                None
            }
        }
    }

    fn missing_required(&self) -> Vec<&'static str> {
        self.config
            .required
            .iter()
            .copied()
            .filter(|field| {
                self.fields
                    .value(field)
                    .is_none_or(|value| value.trim().is_empty())
            })
            .collect()
    }

    fn show_error(&mut self, err: ApiError) {
        self.failed_status = err.status();
        match (self.config.error_mode, err) {
            (ErrorMode::PerField { .. }, ApiError::Validation { fields, .. }) => {
                self.errors = fields;
            }
            (ErrorMode::PerField { fallback_field }, other) => {
                self.errors.insert(fallback_field.to_string(), other.to_string());
            }
            (ErrorMode::Banner, ApiError::Validation { fields, .. }) => {
                self.banner = Some(summarize(&fields));
                self.errors = fields;
            }
            (ErrorMode::Banner, other) => {
                self.banner = Some(other.to_string());
            }
        }
    }
}

fn summarize(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn unknown(field: &str) -> FieldError {
    FieldError::Unknown(field.to_string())
}

fn invalid(field: &str, message: impl Into<String>) -> FieldError {
    FieldError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCreateForm {
    pub title: String,
    pub description: String,
    pub due_date: String,
    /// Only honoured for admins; blank or zero means the caller.
    pub user_id: Option<i64>,
}

impl TaskCreateForm {
    pub fn to_request(&self) -> TaskRequest {
        TaskRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date.clone(),
        }
    }

    pub fn assignee(&self, session: &Session) -> Assignee {
        if session.is_admin() {
            Assignee::from_user_id(self.user_id)
        } else {
            Assignee::Me
        }
    }
}

impl FormFields for TaskCreateForm {
    const FIELDS: &'static [&'static str] = &["title", "description", "dueDate", "userId"];

    fn config() -> FormConfig {
        FormConfig {
            error_mode: ErrorMode::PerField {
                fallback_field: "title",
            },
            required: &[],
        }
    }

    fn value(&self, field: &str) -> Option<String> {
        match field {
            "title" => Some(self.title.clone()),
            "description" => Some(self.description.clone()),
            "dueDate" => Some(self.due_date.clone()),
            "userId" => self.user_id.map(|id| id.to_string()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), FieldError> {
        match field {
            "title" => self.title = value.to_string(),
            "description" => self.description = value.to_string(),
            "dueDate" => self.due_date = value.to_string(),
            "userId" => {
                let trimmed = value.trim();
                self.user_id = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.parse().map_err(|_| invalid(field, "expected a number"))?)
                };
            }
            other => return Err(unknown(other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEditForm {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub completed: bool,
}

impl TaskEditForm {
    /// Prefills from the listed task; the due date keeps only its day part.
    pub fn from_task(task: &Task) -> Self {
        let due_date = task.due_date.split('T').next().unwrap_or_default().to_string();
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            due_date,
            completed: task.completed,
        }
    }

    pub fn to_update(&self) -> TaskUpdate {
        TaskUpdate {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            completed: Some(self.completed),
            due_date: Some(self.due_date.clone()),
        }
    }
}

impl FormFields for TaskEditForm {
    const FIELDS: &'static [&'static str] = &["title", "description", "dueDate", "completed"];

    fn config() -> FormConfig {
        FormConfig {
            error_mode: ErrorMode::Banner,
            required: &["title", "dueDate"],
        }
    }

    fn value(&self, field: &str) -> Option<String> {
        match field {
            "title" => Some(self.title.clone()),
            "description" => Some(self.description.clone()),
            "dueDate" => Some(self.due_date.clone()),
            "completed" => Some(self.completed.to_string()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), FieldError> {
        match field {
            "title" => self.title = value.to_string(),
            "description" => self.description = value.to_string(),
            "dueDate" => self.due_date = value.to_string(),
            "completed" => {
                self.completed = match value.trim() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid(field, "expected true or false")),
                };
            }
            other => return Err(unknown(other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserForm {
    pub name: String,
    pub mail: String,
    pub password: String,
    pub role: Role,
}

impl UserForm {
    /// Prefills for editing; the password always starts blank.
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            mail: user.mail.clone(),
            password: String::new(),
            role: user.role,
        }
    }

    pub fn to_request(&self) -> UserRequest {
        UserRequest {
            name: self.name.clone(),
            password: self.password.clone(),
            mail: self.mail.clone(),
            role: self.role,
        }
    }
}

impl FormFields for UserForm {
    const FIELDS: &'static [&'static str] = &["name", "mail", "password", "role"];

    fn config() -> FormConfig {
        FormConfig {
            error_mode: ErrorMode::PerField {
                fallback_field: "name",
            },
            required: &[],
        }
    }

    fn value(&self, field: &str) -> Option<String> {
        match field {
            "name" => Some(self.name.clone()),
            "mail" => Some(self.mail.clone()),
            "password" => Some(self.password.clone()),
            "role" => Some(self.role.to_string()),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<(), FieldError> {
        match field {
            "name" => self.name = value.to_string(),
            "mail" => self.mail = value.to_string(),
            "password" => self.password = value.to_string(),
            "role" => self.role = value.parse().map_err(|msg: String| invalid(field, msg))?,
            other => return Err(unknown(other)),
        }
        Ok(())
    }
}

/// Pending "are you sure?" for deleting one item.
#[derive(Debug, Clone, Default)]
pub struct ConfirmDialog {
    pending: Option<i64>,
}

impl ConfirmDialog {
    pub fn ask(&mut self, id: i64) {
        self.pending = Some(id);
    }

    pub fn pending(&self) -> Option<i64> {
        self.pending
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Closes the dialog and yields the id to act on.
    pub fn confirm(&mut self) -> Option<i64> {
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
