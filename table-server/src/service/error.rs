//! Service errors and their translation to request-layer codes

use super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Table not found: {0}")]
    TableNotFound(u32),

    #[error("Round not found: {0}")]
    RoundNotFound(String),

    #[error("Line item {line_id} not found in round {round_id}")]
    LineItemNotFound { round_id: String, line_id: String },

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Table {0} has no open rounds")]
    NoOpenRounds(u32),

    #[error("Round already paid: {0}")]
    RoundAlreadyPaid(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Fixed table {0} cannot be removed")]
    TableIsFixed(u32),

    #[error("Table is not free: {0}")]
    TableOccupied(u32),

    #[error("Table name already exists: {0}")]
    TableNameExists(String),

    #[error("Insufficient quantity on line {line_id}: requested {requested}, available {available}")]
    InsufficientQuantity {
        line_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Ticket sequence exhausted for day {0}")]
    SequenceExhausted(String),

    #[error("Ticket sequence contention for day {0}")]
    SequenceContention(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error taxonomy seen by callers, independent of the concrete variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidState,
    Conflict,
    SequenceExhausted,
    Internal,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) | ServiceError::InsufficientQuantity { .. } => {
                ErrorKind::Validation
            }
            ServiceError::TableNotFound(_)
            | ServiceError::RoundNotFound(_)
            | ServiceError::LineItemNotFound { .. }
            | ServiceError::TicketNotFound(_)
            | ServiceError::NoOpenRounds(_) => ErrorKind::NotFound,
            ServiceError::RoundAlreadyPaid(_)
            | ServiceError::InvalidState(_)
            | ServiceError::TableIsFixed(_) => ErrorKind::InvalidState,
            ServiceError::TableOccupied(_)
            | ServiceError::TableNameExists(_)
            | ServiceError::SequenceContention(_) => ErrorKind::Conflict,
            ServiceError::SequenceExhausted(_) => ErrorKind::SequenceExhausted,
            ServiceError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SequenceExhausted(day) => ServiceError::SequenceExhausted(day),
            StorageError::SequenceContention(day) => ServiceError::SequenceContention(day),
            other => ServiceError::Storage(other),
        }
    }
}

/// Map a storage failure to an error code (clients localize by code)
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    // Exact variant matches first
    match e {
        StorageError::Serialization(_) | StorageError::TableNumbersExhausted => {
            return ErrorCode::InternalError;
        }
        StorageError::SequenceExhausted(_) => return ErrorCode::TicketSequenceExhausted,
        StorageError::SequenceContention(_) => return ErrorCode::TicketSequenceContention,
        _ => {}
    }

    // redb errors are classified by message
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("out of memory") || err_str.contains("cannot allocate") {
        return ErrorCode::OutOfMemory;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // Default: system busy (redb Database/Transaction/Table/Storage/Commit errors)
    ErrorCode::SystemBusy
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_) => AppError::with_message(ErrorCode::ValidationFailed, message),
            ServiceError::TableNotFound(n) => {
                AppError::with_message(ErrorCode::TableNotFound, message).with_detail("table_number", n)
            }
            ServiceError::RoundNotFound(id) => {
                AppError::with_message(ErrorCode::RoundNotFound, message).with_detail("round_id", id)
            }
            ServiceError::LineItemNotFound { round_id, line_id } => {
                AppError::with_message(ErrorCode::LineItemNotFound, message)
                    .with_detail("round_id", round_id)
                    .with_detail("line_id", line_id)
            }
            ServiceError::TicketNotFound(id) => {
                AppError::with_message(ErrorCode::TicketNotFound, message).with_detail("ticket", id)
            }
            ServiceError::NoOpenRounds(n) => {
                AppError::with_message(ErrorCode::NotFound, message).with_detail("table_number", n)
            }
            ServiceError::RoundAlreadyPaid(id) => {
                AppError::with_message(ErrorCode::RoundAlreadyPaid, message).with_detail("round_id", id)
            }
            ServiceError::InvalidState(_) => AppError::with_message(ErrorCode::InvalidState, message),
            ServiceError::TableIsFixed(n) => {
                AppError::with_message(ErrorCode::TableIsFixed, message).with_detail("table_number", n)
            }
            ServiceError::TableOccupied(n) => {
                AppError::with_message(ErrorCode::TableOccupied, message).with_detail("table_number", n)
            }
            ServiceError::TableNameExists(name) => {
                AppError::with_message(ErrorCode::TableNameExists, message).with_detail("name", name)
            }
            ServiceError::InsufficientQuantity { line_id, .. } => {
                AppError::with_message(ErrorCode::InsufficientQuantity, message)
                    .with_detail("line_id", line_id)
            }
            ServiceError::SequenceExhausted(day) => {
                AppError::with_message(ErrorCode::TicketSequenceExhausted, message).with_detail("day", day)
            }
            ServiceError::SequenceContention(day) => {
                AppError::with_message(ErrorCode::TicketSequenceContention, message)
                    .with_detail("day", day)
            }
            ServiceError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::with_message(code, message)
            }
        }
    }
}
