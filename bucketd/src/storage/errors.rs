use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Unified error type for object store operations that application code can
/// handle. A failed backend call always surfaces as one of these variants,
/// never as an empty or partial success value.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object exists at the requested path
    #[error("object not found")]
    NotFound,

    /// The backend rejected the caller's credentials or policy
    #[error("storage access denied: {message}")]
    Denied { message: String },

    /// The backend could not be reached or did not answer in time
    #[error("storage backend unavailable: {message}")]
    Unavailable { message: String },

    /// The payload stream ended before the declared length was transferred.
    /// The partially-transferred upload has been aborted at the backend.
    #[error("payload stream ended after {written} of {expected} bytes")]
    PartialWrite { expected: u64, written: u64 },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Categorize an AWS SDK error into the storage taxonomy.
///
/// Service-level codes are matched first (S3-compatible servers agree on
/// these), then transport-level failures. Anything unrecognized is kept with
/// its full source chain.
pub(crate) fn from_sdk_error<E>(err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let classified = match &err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().code().unwrap_or("");
            let message = ctx
                .err()
                .message()
                .unwrap_or("backend rejected the request")
                .to_string();
            match code {
                "NoSuchKey" | "NoSuchBucket" | "NotFound" => Some(StorageError::NotFound),
                "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AllAccessDisabled" => {
                    Some(StorageError::Denied { message })
                }
                "SlowDown" | "ServiceUnavailable" | "InternalError" => Some(StorageError::Unavailable { message }),
                _ => None,
            }
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            Some(StorageError::Unavailable { message: err.to_string() })
        }
        _ => None,
    };

    match classified {
        Some(storage_err) => storage_err,
        None => StorageError::Other(anyhow::Error::new(err)),
    }
}

/// Type alias for object store operation results
pub type Result<T> = std::result::Result<T, StorageError>;
