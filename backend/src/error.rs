//! Error handling for the AgriTrace services
//!
//! Every service returns [`AppResult`]. Errors raised while a store
//! transaction is open abort it, so nothing is ever half-applied.

use serde::Serialize;
use shared::FieldErrors;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authorization errors
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Cannot modify {resource}: {message}")]
    DependencyConflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // External service errors
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        let mut reported: Vec<_> = errors.field_errors().into_iter().collect();
        reported.sort_by_key(|(field, _)| *field);
        for (field, failures) in reported {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({})", failure.code));
                fields.add(field, message);
            }
        }
        AppError::Validation(fields)
    }
}

/// Serializable error description for callers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Shorthand for a validation failure on one field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(resource.to_string())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InsufficientPermissions(_) => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DependencyConflict { .. } => "DEPENDENCY_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the user-facing description. Payment and upstream failures are
    /// reported generically; their details only go to the log.
    pub fn detail(&self) -> ErrorDetail {
        let (message, field) = match self {
            AppError::InsufficientPermissions(msg) => (msg.clone(), None),
            AppError::Validation(errors) => {
                let first = errors.first();
                (
                    first
                        .map(|e| e.message.clone())
                        .unwrap_or_else(|| "Invalid input".to_string()),
                    first.map(|e| e.field.clone()),
                )
            }
            AppError::DependencyConflict { resource, message } => {
                (message.clone(), Some(resource.clone()))
            }
            AppError::NotFound(resource) => (format!("{} not found", resource), None),
            AppError::InvalidStateTransition(msg) => (msg.clone(), None),
            AppError::InsufficientStock(msg) => (msg.clone(), None),
            AppError::PaymentDeclined(_) => (
                "The payment could not be completed. Please check your wallet and try again."
                    .to_string(),
                None,
            ),
            AppError::ExternalService(_) => (
                "An external service is temporarily unavailable".to_string(),
                None,
            ),
            AppError::Configuration(_) | AppError::Internal(_) => {
                ("An internal error occurred".to_string(), None)
            }
        };

        ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
        }
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
