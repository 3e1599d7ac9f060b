use thiserror::Error;

use offerank_core::catalog::ports::StoreError;

pub mod candidate;

pub use candidate::{CacheStats, SqlCandidateRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("candidate `{0}` does not exist")]
    Missing(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Decode(message) => Self::Decode(message),
            other => Self::Backend(other.to_string()),
        }
    }
}
