//! API error type and HTTP status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use closetrack_automation::{
    DispatchError, ExecutionError, ExecutionStoreError, RuleStoreError, TransactionReadError,
};
use serde_json::json;
use std::fmt;

/// Errors building the application state at startup.
#[derive(Debug)]
pub enum StartupError {
    /// The configured automation user id does not parse.
    InvalidAutomationUser { value: String, reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAutomationUser { value, reason } => {
                write!(f, "invalid automation user id '{value}': {reason}")
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// An error surfaced to an API client.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request input.
    BadRequest { message: String },
    /// The addressed entity does not exist.
    NotFound { message: String },
    /// The request conflicts with the entity's current state.
    Conflict { message: String },
    /// Internal failure; details are logged, not returned.
    Internal { message: String },
}

impl ApiError {
    /// Creates a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Internal { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Internal { message } => {
                tracing::error!(error = %message, "internal API error");
                json!({"error": "internal server error"})
            }
            other => json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ExecutionError> for ApiError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Store(ExecutionStoreError::NotFound { id }) => Self::NotFound {
                message: format!("execution not found: {id}"),
            },
            ExecutionError::NotRetryable { .. } | ExecutionError::InvalidTransition { .. } => {
                Self::Conflict {
                    message: e.to_string(),
                }
            }
            ExecutionError::LookupFailed { .. } => Self::Conflict {
                message: e.to_string(),
            },
            ExecutionError::Store(_) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<ExecutionStoreError> for ApiError {
    fn from(e: ExecutionStoreError) -> Self {
        match e {
            ExecutionStoreError::NotFound { id } => Self::NotFound {
                message: format!("execution not found: {id}"),
            },
            ExecutionStoreError::StorageFailed { .. } => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<RuleStoreError> for ApiError {
    fn from(e: RuleStoreError) -> Self {
        match e {
            RuleStoreError::NotFound { id } => Self::NotFound {
                message: format!("rule not found: {id}"),
            },
            RuleStoreError::StorageFailed { .. } => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<TransactionReadError> for ApiError {
    fn from(e: TransactionReadError) -> Self {
        match e {
            TransactionReadError::NotFound { id } => Self::NotFound {
                message: format!("transaction not found: {id}"),
            },
            TransactionReadError::ReadFailed { .. } => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}
