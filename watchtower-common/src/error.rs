use std::error::Error;

use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum WatchtowerError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),
    #[error("controller {0} not found")]
    ControllerNotFound(Uuid),
    #[error("controller with callsign {0:?} not found")]
    CallsignNotFound(String),
    #[error("access token {0} not found")]
    TokenNotFound(Uuid),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("invalid status code: {0:?}")]
    InvalidStatus(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Deliberately carries nothing about which check failed.
    #[error("not authenticated")]
    Unauthenticated,
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl WatchtowerError {
    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Other(Box::new(err))
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether the caller may simply repeat the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ControllerNotFound(_)
                | Self::CallsignNotFound(_)
                | Self::TokenNotFound(_)
                | Self::UserNotFound(_)
        )
    }
}

/// `true` when a database error is a unique-constraint violation.
pub fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}
