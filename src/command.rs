// src/command.rs

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CairnError;

/// Server endpoint table. Owns the path exceptions for the built-in classes:
/// `_User` lives at `/users` and `_Installation` at `/installations` instead
/// of under `/classes/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Classes(String),
    Object {
        class_name: String,
        object_id: String,
    },
    Aggregate(String),
    Batch,
    Login,
    Logout,
    PasswordReset,
    Config,
}

impl Endpoint {
    pub fn class(class_name: &str) -> Self {
        Endpoint::Classes(class_name.to_string())
    }

    pub fn object(class_name: &str, object_id: &str) -> Self {
        Endpoint::Object {
            class_name: class_name.to_string(),
            object_id: object_id.to_string(),
        }
    }

    pub fn aggregate(class_name: &str) -> Self {
        Endpoint::Aggregate(class_name.to_string())
    }

    /// The URL path component, starting with `/`, relative to the API mount.
    pub fn url_component(&self) -> String {
        match self {
            Endpoint::Classes(class_name) => match class_name.as_str() {
                "_User" => "/users".to_string(),
                "_Installation" => "/installations".to_string(),
                _ => format!("/classes/{}", class_name),
            },
            Endpoint::Object {
                class_name,
                object_id,
            } => match class_name.as_str() {
                "_User" => format!("/users/{}", object_id),
                "_Installation" => format!("/installations/{}", object_id),
                _ => format!("/classes/{}/{}", class_name, object_id),
            },
            Endpoint::Aggregate(class_name) => format!("/aggregate/{}", class_name),
            Endpoint::Batch => "/batch".to_string(),
            Endpoint::Login => "/login".to_string(),
            Endpoint::Logout => "/logout".to_string(),
            Endpoint::PasswordReset => "/requestPasswordReset".to_string(),
            Endpoint::Config => "/config".to_string(),
        }
    }
}

/// Decodes a transport response: success bodies into `R`, error bodies into
/// the mapped `CairnError`. Empty success bodies decode as JSON null so
/// callers expecting nothing can use `Option` or `Value`.
pub(crate) fn process_response<R: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<R, CairnError> {
    if status.is_success() {
        if status == StatusCode::NO_CONTENT || body.is_empty() {
            return serde_json::from_value(Value::Null)
                .map_err(|e| CairnError::Decode(format!("{} (empty response body)", e)));
        }
        serde_json::from_slice(body)
            .map_err(|e| CairnError::Decode(format!("{} (body: {})", e, body_snippet(body))))
    } else {
        let error_body: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "Failed to parse error response body as JSON. Status: {}. Body: {}",
                    status,
                    body_snippet(body)
                );
                Value::Null
            }
        };
        Err(CairnError::from_response(status.as_u16(), error_body))
    }
}

/// First 256 bytes of a body, lossily decoded, for error context and logs.
pub(crate) fn body_snippet(body: &[u8]) -> String {
    let end = body.len().min(256);
    let mut snippet = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > end {
        snippet.push_str("...");
    }
    snippet
}
