use service_core::error::{AppError, FieldErrors};
use thiserror::Error;
use uuid::Uuid;

use super::store::StoreError;

/// Body of every ownership-chain denial, whichever check failed.
pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No valid session")]
    Unauthenticated,

    #[error("Resource is owned by another principal")]
    Unauthorized,

    #[error("Resource does not belong to the addressed parent")]
    ChainMismatch,

    #[error("Resource not found")]
    NotFound,

    #[error("Validation failed on {} field(s)", .0.len())]
    ValidationFailed(FieldErrors),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config {config_id} was created but its header was not")]
    PartialFailure { config_id: Uuid },

    #[error("Invalid OAuth state")]
    InvalidOAuthState,

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
            }
            ServiceError::Unauthorized | ServiceError::ChainMismatch | ServiceError::NotFound => {
                AppError::NotFound(anyhow::anyhow!(NOT_FOUND_MESSAGE))
            }
            ServiceError::ValidationFailed(fields) => AppError::FieldValidation(fields),
            ServiceError::DecryptionFailed => {
                AppError::InternalError(anyhow::anyhow!("Stored header value could not be decrypted"))
            }
            ServiceError::EncryptionFailed => {
                AppError::InternalError(anyhow::anyhow!("Header value could not be encrypted"))
            }
            ServiceError::Store(StoreError::Timeout(op)) => {
                tracing::warn!(operation = op, "Store timeout surfaced to client");
                AppError::ServiceUnavailable
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::PartialFailure { config_id } => AppError::PartialFailure(format!(
                "Config {} was created without its header replacement",
                config_id
            )),
            ServiceError::InvalidOAuthState => {
                AppError::BadRequest(anyhow::anyhow!("Invalid OAuth state"))
            }
            ServiceError::IdentityProvider(e) => AppError::BadGateway(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
