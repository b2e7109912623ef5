use chrono::NaiveDate;
use thiserror::Error;
use tracing::{trace, warn};

use crate::session::Session;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("completed must be empty, true or false, got {0:?}")]
    Completed(String),
    #[error("due-before must be a YYYY-MM-DD date, got {0:?}")]
    DueBefore(String),
    #[error("user id must be a number, got {0:?}")]
    UserId(String),
}

/// Criteria sent to the filtered task listing. Nothing is evaluated locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilters {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub due_before: Option<NaiveDate>,
    pub user_id: Option<i64>,
}

impl TaskFilters {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Query parameters in wire order; absent criteria and a zero user id are
    /// left out.
    pub fn query_pairs(&self, page: u32, size: u32) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("title", title.to_string()));
        }
        if let Some(completed) = self.completed {
            pairs.push(("completed", completed.to_string()));
        }
        if let Some(due) = self.due_before {
            pairs.push(("dueBefore", due.format(DATE_FORMAT).to_string()));
        }
        if let Some(user_id) = self.user_id.filter(|id| *id != 0) {
            pairs.push(("userId", user_id.to_string()));
        }
        pairs.push(("page", page.to_string()));
        pairs.push(("size", size.to_string()));
        trace!(?pairs, "built filter query");
        pairs
    }
}

/// Raw filter fields as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterInput {
    pub title: String,
    pub completed: String,
    pub due_before: String,
    pub user_id: String,
}

impl FilterInput {
    /// Parses the fields for the acting session.
    ///
    /// Non-admin sessions always filter on their own user id, whatever the
    /// `user_id` field holds.
    pub fn resolve(&self, session: &Session) -> Result<TaskFilters, FilterError> {
        let title = non_empty(&self.title).map(str::to_string);

        let completed = match non_empty(&self.completed) {
            None => None,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => return Err(FilterError::Completed(raw.to_string())),
            },
        };

        let due_before = non_empty(&self.due_before)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .map_err(|_| FilterError::DueBefore(raw.to_string()))
            })
            .transpose()?;

        let user_id = if session.is_admin() {
            non_empty(&self.user_id)
                .map(|raw| {
                    raw.parse::<i64>()
                        .map_err(|_| FilterError::UserId(raw.to_string()))
                })
                .transpose()?
        } else {
            if session.user_id().is_none() {
                warn!("session has no user id claim; owner filter left to the backend");
            }
            session.user_id()
        };

        Ok(TaskFilters {
            title,
            completed,
            due_before,
            user_id,
        })
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::{FilterError, FilterInput, TaskFilters};
    use crate::session::Session;

    fn session(role: &str, id: Option<i64>) -> Session {
        let payload = serde_json::json!({ "sub": "x@example.com", "role": role, "id": id, "exp": 4_000_000_000_i64 });
        let token = encode(&Header::default(), &payload, &EncodingKey::from_secret(b"k")).expect("token");
        Session::from_token(token).expect("session")
    }

    #[test]
    fn query_pairs_follow_wire_order() {
        let filters = TaskFilters {
            title: Some("report".to_string()),
            completed: Some(false),
            due_before: NaiveDate::from_ymd_opt(2026, 12, 31),
            user_id: Some(4),
        };
        let pairs = filters.query_pairs(2, 10);
        let keys: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["title", "completed", "dueBefore", "userId", "page", "size"]);
        assert_eq!(pairs[2].1, "2026-12-31");
    }

    #[test]
    fn empty_filters_only_carry_paging() {
        let pairs = TaskFilters {
            user_id: Some(0),
            ..TaskFilters::default()
        }
        .query_pairs(0, 10);
        assert_eq!(pairs, vec![("page", "0".to_string()), ("size", "10".to_string())]);
    }

    #[test]
    fn non_admin_is_pinned_to_own_id() {
        let input = FilterInput {
            user_id: "99".to_string(),
            completed: "true".to_string(),
            ..FilterInput::default()
        };
        let filters = input.resolve(&session("USER", Some(12))).expect("resolve");
        assert_eq!(filters.user_id, Some(12));
        assert_eq!(filters.completed, Some(true));

        let blank = FilterInput::default()
            .resolve(&session("USER", Some(12)))
            .expect("resolve");
        assert_eq!(blank.user_id, Some(12));
    }

    #[test]
    fn admin_uses_field_value_or_nothing() {
        let admin = session("ADMIN", Some(1));
        let filters = FilterInput {
            user_id: " 42 ".to_string(),
            ..FilterInput::default()
        }
        .resolve(&admin)
        .expect("resolve");
        assert_eq!(filters.user_id, Some(42));

        let filters = FilterInput::default().resolve(&admin).expect("resolve");
        assert!(filters.is_empty());
    }

    #[test]
    fn rejects_unparseable_fields() {
        let admin = session("ADMIN", None);
        let bad_completed = FilterInput {
            completed: "maybe".to_string(),
            ..FilterInput::default()
        };
        assert_eq!(
            bad_completed.resolve(&admin),
            Err(FilterError::Completed("maybe".to_string()))
        );

        let bad_date = FilterInput {
            due_before: "31/12/2026".to_string(),
            ..FilterInput::default()
        };
        assert!(matches!(bad_date.resolve(&admin), Err(FilterError::DueBefore(_))));

        let bad_user = FilterInput {
            user_id: "abc".to_string(),
            ..FilterInput::default()
        };
        assert!(matches!(bad_user.resolve(&admin), Err(FilterError::UserId(_))));
    }
}
