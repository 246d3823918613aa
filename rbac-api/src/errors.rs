use crate::db::errors::DbError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Why a request could not be tied to an identity.
///
/// The sub-kind is only ever logged: every variant except [`AuthFailure::NotAuthenticated`]
/// reaches the client as the same 401.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No Authorization header
    #[error("missing credential")]
    MissingCredential,

    /// Authorization header present but not `Bearer <token>`
    #[error("malformed credential")]
    MalformedCredential,

    /// Token failed signature, expiry or shape checks
    #[error("invalid token")]
    InvalidToken,

    /// Token was valid but its subject no longer exists
    #[error("unknown user")]
    UnknownUser,

    /// Username/password pair did not match
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A permission gate ran without identity resolution in front of it
    #[error("no resolved identity on request")]
    NotAuthenticated,
}

/// A single offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Field-level input faults, all of them at once
    #[error("Validation failed: {}", .errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>().join(", "))]
    Validation { errors: Vec<FieldError> },

    /// Uniqueness violation surfaced to the caller
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Authentication required but not established
    #[error("Not authenticated: {reason}")]
    Unauthenticated { reason: AuthFailure },

    /// Authenticated caller lacks the named permission
    #[error("Permission '{permission}' required")]
    Forbidden { permission: String },

    /// Self-registration is switched off in configuration
    #[error("Registration is disabled")]
    RegistrationDisabled,

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<AuthFailure> for Error {
    fn from(reason: AuthFailure) -> Self {
        Error::Unauthenticated { reason }
    }
}

/// A request body that is not the expected JSON is a validation failure like any other.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        let field = detail
            .split_once("missing field `")
            .and_then(|(_, rest)| rest.split_once('`'))
            .map_or("body", |(name, _)| name);

        Error::Validation {
            errors: vec![FieldError::new(field, detail.clone())],
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated {
                reason: AuthFailure::NotAuthenticated,
            } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::RegistrationDisabled => StatusCode::FORBIDDEN,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { .. } => "Validation failed".to_string(),
            Error::Conflict { message } => message.clone(),
            Error::Unauthenticated {
                reason: AuthFailure::NotAuthenticated,
            } => "Internal server error".to_string(),
            Error::Unauthenticated {
                reason: AuthFailure::InvalidCredentials,
            } => "invalid credentials".to_string(),
            Error::Unauthenticated { .. } => "Authentication required".to_string(),
            Error::Forbidden { permission } => format!("permission '{permission}' required"),
            Error::RegistrationDisabled => "Registration is disabled".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => conflict_message(table.as_deref(), constraint.as_deref()),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }

    /// Turn a store-level uniqueness violation into a [`Error::Conflict`]; anything else passes
    /// through as a database error.
    pub fn conflict_from(err: DbError) -> Self {
        match &err {
            DbError::UniqueViolation { constraint, table, .. } => Error::Conflict {
                message: conflict_message(table.as_deref(), constraint.as_deref()),
            },
            _ => Error::Database(err),
        }
    }
}

fn conflict_message(table: Option<&str>, constraint: Option<&str>) -> String {
    match (table, constraint) {
        (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
        (Some("users"), Some(c)) if c.contains("username") => "This username is already taken".to_string(),
        (Some("roles"), _) => "A role with this name already exists".to_string(),
        (Some("permissions"), _) => "A permission with this name already exists".to_string(),
        _ => "Resource already exists".to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_))
            | Error::Internal { .. }
            | Error::Unauthenticated {
                reason: AuthFailure::NotAuthenticated,
            } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } | Error::RegistrationDisabled => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            Error::Validation { errors } => {
                let body = json!({
                    "message": self.user_message(),
                    "errors": errors,
                });
                (status, Json(body)).into_response()
            }
            Error::Conflict { message } => (status, Json(json!({ "message": message }))).into_response(),
            Error::Database(DbError::UniqueViolation { .. }) => (status, Json(json!({ "message": self.user_message() }))).into_response(),
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
