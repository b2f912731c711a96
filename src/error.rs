//! Application error type and its HTTP mapping.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

/// Errors surfaced by services and handlers.
///
/// The gating failures carry their retry semantics: [`AppError::NotVerified`] is
/// transient and tells the caller when to poll again, [`AppError::Unsafe`] and
/// [`AppError::NotFound`] are permanent.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    InvalidUrl { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("{message}")]
    NotVerified {
        message: String,
        retry_after_secs: u64,
        details: Value,
    },

    #[error("{message}")]
    Unsafe { message: String, details: Value },

    /// The derived key already belongs to a different target.
    #[error("{message}")]
    HashConflict { message: String, details: Value },

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: format!("[{}] does not follow a supported schema", url),
            details: json!({ "url": url, "reason": reason.into() }),
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn not_verified(hash: &str, retry_after_secs: u64) -> Self {
        Self::NotVerified {
            message: format!("[{}] is not verified yet", hash),
            retry_after_secs,
            details: json!({ "hash": hash, "retry_after": retry_after_secs }),
        }
    }

    pub fn unsafe_target(hash: &str) -> Self {
        Self::Unsafe {
            message: format!("[{}] is not safe", hash),
            details: json!({ "hash": hash }),
        }
    }

    pub fn hash_conflict(hash: &str, url: &str) -> Self {
        Self::HashConflict {
            message: format!("[{}] is already taken by another target", hash),
            details: json!({ "hash": hash, "url": url }),
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Returns true when the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotVerified { .. } | Self::Internal { .. })
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NotVerified { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unsafe { .. } => StatusCode::FORBIDDEN,
            Self::HashConflict { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into its serializable payload.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (code, message, details) = match self {
            Self::Validation { message, details } => ("validation_error", message, details),
            Self::InvalidUrl { message, details } => ("invalid_url", message, details),
            Self::NotFound { message, details } => ("not_found", message, details),
            Self::NotVerified {
                message, details, ..
            } => ("not_verified", message, details),
            Self::Unsafe { message, details } => ("unsafe", message, details),
            Self::HashConflict { message, details } => ("hash_conflict", message, details),
            Self::Internal { message, details } => ("internal_error", message, details),
        };

        ErrorInfo {
            code,
            message: message.clone(),
            details: details.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_error_info(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Self::NotVerified {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", e);
        AppError::internal("Database error", json!({}))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::bad_request(
            "Request validation failed",
            serde_json::to_value(errors.field_errors()).unwrap_or_else(|_| json!({})),
        )
    }
}
