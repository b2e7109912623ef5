use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single backend call.
///
/// Every variant is terminal for the attempt that produced it; nothing in the
/// client retries on its own.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No token was available, so no request was sent.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The backend rejected the payload field by field.
    #[error("validation failed: {}", summarize(.fields))]
    Validation {
        status: u16,
        fields: BTreeMap<String, String>,
    },

    #[error("{message}")]
    Generic {
        status: Option<u16>,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("token storage failed: {0}")]
    Storage(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Generic {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. } => Some(*status),
            ApiError::Generic { status, .. } => *status,
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The credentials were refused; callers drop the stored token.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Classifies a non-2xx response body.
    ///
    /// An object with a non-blank string `message` is a flat error, whatever
    /// else it carries. Otherwise a JSON object of string values is a
    /// per-field report. Any other non-empty text is used as is, and an empty
    /// body falls back to the status line.
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        let trimmed = body.trim();

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            if let Some(Value::String(message)) = map.get("message")
                && !message.trim().is_empty()
            {
                return ApiError::Generic {
                    status: Some(code),
                    message: message.clone(),
                };
            }

            if !map.is_empty() && map.values().all(Value::is_string) {
                let fields = map
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::String(text) => Some((key, text)),
                        _ => None,
                    })
                    .collect();
                return ApiError::Validation {
                    status: code,
                    fields,
                };
            }
        }

        let message = if trimmed.is_empty() {
            status_line(status)
        } else {
            trimmed.to_string()
        };

        ApiError::Generic {
            status: Some(code),
            message,
        }
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Error {}: {}", status.as_u16(), reason),
        None => format!("Error {}", status.as_u16()),
    }
}

fn summarize(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::ApiError;

    #[test]
    fn string_object_becomes_field_errors() {
        let err = ApiError::from_response_body(
            StatusCode::BAD_REQUEST,
            r#"{"title":"must not be blank","dueDate":"must be in the future"}"#,
        );
        match err {
            ApiError::Validation { status, fields } => {
                assert_eq!(status, 400);
                assert_eq!(fields["title"], "must not be blank");
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn error_envelope_uses_message() {
        let err = ApiError::from_response_body(
            StatusCode::CONFLICT,
            r#"{"status":409,"error":"Conflict","message":"mail already registered"}"#,
        );
        assert_eq!(err.to_string(), "mail already registered");
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn message_wins_over_string_only_objects() {
        let err = ApiError::from_response_body(StatusCode::NOT_FOUND, r#"{"message":"Usuario no encontrado"}"#);
        assert!(matches!(err, ApiError::Generic { status: Some(404), .. }));
        assert_eq!(err.to_string(), "Usuario no encontrado");

        let err = ApiError::from_response_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Bad Request","message":"mail duplicado","path":"/usuarios"}"#,
        );
        assert_eq!(err.to_string(), "mail duplicado");

        let err = ApiError::from_response_body(StatusCode::BAD_REQUEST, r#"{"message":" ","mail":"invalid"}"#);
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn plain_text_and_empty_bodies() {
        let err = ApiError::from_response_body(StatusCode::FORBIDDEN, "Access denied");
        assert_eq!(err.to_string(), "Access denied");

        let err = ApiError::from_response_body(StatusCode::UNAUTHORIZED, "");
        assert_eq!(err.to_string(), "Error 401: Unauthorized");
        assert!(err.is_unauthorized());

        let err = ApiError::from_response_body(StatusCode::INTERNAL_SERVER_ERROR, "[1,2]");
        assert_eq!(err.to_string(), "[1,2]");
    }

    #[test]
    fn not_authenticated_has_no_status() {
        assert_eq!(ApiError::NotAuthenticated.status(), None);
        assert!(!ApiError::NotAuthenticated.is_unauthorized());
    }
}
