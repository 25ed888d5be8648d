use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data (empty path, malformed fields, missing payload)
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} at {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Object store operation error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Storage(storage_err) => match storage_err {
                StorageError::NotFound => StatusCode::NOT_FOUND,
                StorageError::Denied { .. } => StatusCode::FORBIDDEN,
                StorageError::Unavailable { .. } => StatusCode::BAD_GATEWAY,
                // A payload that stops short of its declared length is a
                // malformed client transfer, not a backend fault.
                StorageError::PartialWrite { .. } => StatusCode::BAD_REQUEST,
                StorageError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking backend internals
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} at {id} not found"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Storage(storage_err) => match storage_err {
                StorageError::NotFound => "Object not found".to_string(),
                StorageError::Denied { .. } => "Access to the storage backend was denied".to_string(),
                StorageError::Unavailable { .. } => "Storage backend is unavailable".to_string(),
                StorageError::PartialWrite { expected, written } => {
                    format!("Payload ended after {written} of {expected} declared bytes")
                }
                StorageError::Other(_) => "Storage error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::Storage(StorageError::Other(_)) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Storage(StorageError::Unavailable { .. }) => {
                tracing::error!("Storage backend unavailable: {}", self);
            }
            Error::Storage(StorageError::Denied { .. }) => {
                tracing::warn!("Storage backend denied access: {}", self);
            }
            Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::Storage(StorageError::NotFound)
            | Error::Storage(StorageError::PartialWrite { .. }) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
