use reqwest::header::InvalidHeaderValue;
// src/error.rs
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CairnError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response decoding failed: {0}")]
    Decode(String),

    #[error("Cairn API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Cannot set a pointer to an unsaved object")]
    MissingObjectId,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid class name: {0}")]
    InvalidClassName(String),

    #[error("Invalid session token: {0}")]
    InvalidSessionToken(String),

    #[error("Master key required: {0}")]
    MasterKeyRequired(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Operation forbidden: {0}")]
    OperationForbidden(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Username taken: {0}")]
    UsernameTaken(String),

    #[error("Email taken: {0}")]
    EmailTaken(String),

    #[error("Internal server error: {0}")]
    InternalServer(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(InvalidHeaderValue),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl CairnError {
    /// Creates a `CairnError` from an HTTP status code and a JSON error body.
    pub(crate) fn from_response(status_code: u16, response_body: Value) -> Self {
        let error_code = response_body
            .get("code")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u16;
        let error_message = response_body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Self::from_api_code(error_code, status_code, error_message)
    }

    /// Maps a Cairn numeric error code to a variant. Batch sub-responses reuse
    /// this with a synthetic 200 status since only the item failed.
    pub(crate) fn from_api_code(error_code: u16, status_code: u16, error_message: String) -> Self {
        match error_code {
            100 => CairnError::ConnectionFailed(format!("({}) {}", error_code, error_message)),
            101 => CairnError::ObjectNotFound(format!("({}) {}", error_code, error_message)), // Invalid credentials or object not found
            102 => CairnError::InvalidQuery(format!("({}) {}", error_code, error_message)),
            111 => CairnError::InvalidInput(format!(
                "Invalid field type: ({}) {}",
                error_code, error_message
            )),
            119 => CairnError::OperationForbidden(format!(
                "Missing master key for operation: ({}) {}",
                error_code, error_message
            )),
            202 => CairnError::UsernameTaken(format!("({}) {}", error_code, error_message)),
            203 => CairnError::EmailTaken(format!("({}) {}", error_code, error_message)),
            209 => CairnError::InvalidSessionToken(format!("({}) {}", error_code, error_message)),
            _ => {
                if status_code >= 500 {
                    CairnError::InternalServer(format!(
                        "Server error (HTTP {}): ({}) {}",
                        status_code, error_code, error_message
                    ))
                } else if status_code == 401 || status_code == 403 {
                    CairnError::Authentication(format!(
                        "Auth error (HTTP {}): ({}) {}",
                        status_code, error_code, error_message
                    ))
                } else if status_code == 404 {
                    CairnError::ObjectNotFound(format!(
                        "Not found (HTTP {}): ({}) {}",
                        status_code, error_code, error_message
                    ))
                } else {
                    CairnError::ApiError {
                        code: error_code,
                        message: error_message,
                    }
                }
            }
        }
    }
}
