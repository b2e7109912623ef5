use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};

/// Anything the list controller can patch in
/// place by id.
pub trait Identified {
  fn id(&self) -> i64;
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
  #[default]
  User,
  Admin
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      | Role::User => "USER",
      | Role::Admin => "ADMIN"
    }
  }

  pub fn is_elevated(&self) -> bool {
    matches!(self, Role::Admin)
  }
}

impl std::str::FromStr for Role {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_uppercase()
      .as_str()
    {
      | "USER" => Ok(Role::User),
      | "ADMIN" => Ok(Role::Admin),
      | other => Err(format!(
        "unknown role: {other}"
      ))
    }
  }
}

impl std::fmt::Display for Role {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskOwner {
  pub id:   i64,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub mail: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id:          i64,
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub completed:   bool,
  #[serde(default)]
  pub due_date:    String,
  #[serde(default)]
  pub created_at:  String,
  pub user:        TaskOwner
}

impl Identified for Task {
  fn id(&self) -> i64 {
    self.id
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct User {
  pub id:   i64,
  pub name: String,
  pub mail: String,
  #[serde(default)]
  pub role: Role
}

impl Identified for User {
  fn id(&self) -> i64 {
    self.id
  }
}

/// One window of a backend collection.
///
/// Mirrors the paging envelope the backend
/// returns; unknown envelope fields
/// (`pageable`, `sort`, ...) are ignored.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub content:        Vec<T>,
  #[serde(default)]
  pub number:         u32,
  #[serde(default)]
  pub size:           u32,
  #[serde(default)]
  pub total_pages:    u32,
  #[serde(default)]
  pub total_elements: u64,
  #[serde(default)]
  pub first:          bool,
  #[serde(default)]
  pub last:           bool
}

impl<T> Page<T> {
  pub fn is_empty(&self) -> bool {
    self.content.is_empty()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
  pub title:       String,
  pub description: String,
  pub due_date:    String
}

/// Body for both `PUT` and `PATCH`; absent
/// fields are not serialized.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<String>
}

impl TaskUpdate {
  pub fn completed() -> Self {
    Self {
      completed: Some(true),
      ..Self::default()
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct UserRequest {
  pub name:     String,
  pub password: String,
  pub mail:     String,
  pub role:     Role
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
)]
pub struct LoginRequest {
  pub username: String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginResponse {
  pub token: String,
  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

#[cfg(test)]
mod tests {
  use super::{
    Page,
    Role,
    Task,
    TaskUpdate,
    User
  };

  #[test]
  fn page_envelope_ignores_extra_fields()
  {
    let raw = serde_json::json!({
      "content": [{
        "id": 5,
        "title": "Write report",
        "description": "quarterly",
        "completed": false,
        "dueDate": "2026-11-01",
        "createdAt": "2026-10-01T09:30:00",
        "user": { "id": 2, "name": "Ana", "mail": "ana@example.com" }
      }],
      "pageable": { "pageNumber": 0, "pageSize": 10, "offset": 0 },
      "totalElements": 1,
      "totalPages": 1,
      "last": true,
      "first": true,
      "size": 10,
      "number": 0,
      "numberOfElements": 1,
      "empty": false
    });

    let page: Page<Task> =
      serde_json::from_value(raw)
        .expect("page should parse");
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.total_pages, 1);
    assert!(page.last);
    assert_eq!(
      page.content[0].due_date,
      "2026-11-01"
    );
    assert_eq!(
      page.content[0].user.mail,
      "ana@example.com"
    );
  }

  #[test]
  fn partial_update_omits_absent_fields()
  {
    let body = serde_json::to_value(
      TaskUpdate::completed()
    )
    .expect("serialize");
    assert_eq!(
      body,
      serde_json::json!({ "completed": true })
    );
  }

  #[test]
  fn user_role_defaults_and_parses() {
    let user: User =
      serde_json::from_value(
        serde_json::json!({
          "id": 1,
          "name": "Root",
          "mail": "root@example.com"
        })
      )
      .expect("user should parse");
    assert_eq!(user.role, Role::User);

    assert_eq!(
      "admin".parse::<Role>(),
      Ok(Role::Admin)
    );
    assert!("owner".parse::<Role>().is_err());
  }
}
