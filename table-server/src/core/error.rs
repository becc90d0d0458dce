//! Startup errors

use crate::service::{ServiceError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
