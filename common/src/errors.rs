//! Error types shared by every layer of the provider.
//!
//! The variants follow the layers a failure can originate from: bad
//! connection settings, the network, the server rejecting a statement, and
//! the reconcilers' own decisions (duplicates, immutable attributes). Drift is
//! not an error: reads report it as an absent resource.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used throughout the provider.
pub type AppResult<T> = Result<T, AppError>;

/// Provider error.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configured endpoint could not be parsed.
    #[error("invalid InfluxDB URL: {0}")]
    InvalidUrl(String),

    /// A connection setting had a value that could not be interpreted.
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// The liveness probe failed at setup time.
    #[error("error pinging server: {0}")]
    Unreachable(String),

    /// The request never produced a well-formed response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected a well-formed statement. Carries the server message verbatim.
    #[error("{0}")]
    Semantic(String),

    /// Create found a resource with the same identity already on the server.
    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// The declared configuration failed validation; nothing was sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// Update was asked to change an attribute that can only change by replacement.
    #[error("changing {attribute} of {kind} {name:?} requires recreating it")]
    RecreateRequired {
        kind: &'static str,
        name: String,
        attribute: &'static str,
    },
}

impl AppError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidUrl(_) => "INVALID_URL",
            AppError::InvalidSetting { .. } => "INVALID_SETTING",
            AppError::Unreachable(_) => "UNREACHABLE",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Semantic(_) => "SEMANTIC_ERROR",
            AppError::AlreadyExists { .. } => "ALREADY_EXISTS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RecreateRequired { .. } => "RECREATE_REQUIRED",
        }
    }

    /// Whether this error belongs to the setup-time configuration family.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidUrl(_) | AppError::InvalidSetting { .. } | AppError::Unreachable(_)
        )
    }

    /// Whether the server reported a duplicate-name error.
    pub fn is_already_exists(&self) -> bool {
        match self {
            AppError::AlreadyExists { .. } => true,
            AppError::Semantic(msg) => is_already_exists_message(msg),
            _ => false,
        }
    }

    /// Whether the server reported that the target object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Semantic(msg) if is_not_found_message(msg))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl(_)
            | AppError::InvalidSetting { .. }
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unreachable(_) | AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Semantic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AlreadyExists { .. } | AppError::RecreateRequired { .. } => {
                StatusCode::CONFLICT
            }
        }
    }
}

/// Classifies a server message as a duplicate-name error.
pub fn is_already_exists_message(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains("already exists")
}

/// Classifies a server message as an absent-object error.
///
/// InfluxDB phrases these as `database not found: x`, `user not found` and
/// `continuous query not found`.
pub fn is_not_found_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("not found") || msg.contains("does not exist")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        AppError::Validation(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_server_messages() {
        assert!(is_already_exists_message("user already exists"));
        assert!(is_not_found_message("database not found: metrics"));
        assert!(is_not_found_message("continuous query not found"));
        assert!(!is_not_found_message("error parsing query"));
    }

    #[test]
    fn test_semantic_error_keeps_server_message() {
        let err = AppError::Semantic("error parsing query: found EOF".to_string());
        assert_eq!(err.to_string(), "error parsing query: found EOF");
        assert!(!err.is_already_exists());
        assert_eq!(err.code(), "SEMANTIC_ERROR");
    }

    #[test]
    fn test_config_family() {
        assert!(AppError::InvalidUrl("x".into()).is_config_error());
        assert!(AppError::Unreachable("refused".into()).is_config_error());
        assert!(!AppError::Transport("reset".into()).is_config_error());
    }
}
