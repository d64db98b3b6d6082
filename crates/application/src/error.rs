use domain::{DomainError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
