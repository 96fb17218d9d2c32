use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("authentication required")]
    Authentication,
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn authorization(message: impl Into<String>) -> Self {
        ApplicationError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApplicationError::NotFound(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
