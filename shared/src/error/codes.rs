//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Round errors
//! - 5xxx: Ticket / payment errors
//! - 7xxx: Table errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Illegal lifecycle transition
    InvalidState = 9,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Round ====================
    /// Round not found
    RoundNotFound = 4001,
    /// Round has already been paid
    RoundAlreadyPaid = 4002,
    /// Line item not found in round
    LineItemNotFound = 4006,
    /// Requested quantity exceeds what is left on the line
    InsufficientQuantity = 4008,

    // ==================== 5xxx: Ticket ====================
    /// Ticket not found
    TicketNotFound = 5006,
    /// Daily ticket sequence exhausted
    TicketSequenceExhausted = 5007,
    /// Ticket number allocation kept colliding
    TicketSequenceContention = 5008,

    // ==================== 7xxx: Table ====================
    /// Table not found
    TableNotFound = 7001,
    /// Table is occupied
    TableOccupied = 7002,
    /// Table name already exists
    TableNameExists = 7005,
    /// Fixed tables cannot be deleted
    TableIsFixed = 7006,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Out of memory
    OutOfMemory = 9402,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidState => "Operation not allowed in the current state",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",

            // Permission
            ErrorCode::AdminRequired => "Administrator role is required",

            // Round
            ErrorCode::RoundNotFound => "Round not found",
            ErrorCode::RoundAlreadyPaid => "Round has already been paid",
            ErrorCode::LineItemNotFound => "Line item not found",
            ErrorCode::InsufficientQuantity => "Insufficient quantity",

            // Ticket
            ErrorCode::TicketNotFound => "Ticket not found",
            ErrorCode::TicketSequenceExhausted => "Daily ticket sequence exhausted",
            ErrorCode::TicketSequenceContention => "Ticket number allocation failed, retry",

            // Table
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::TableOccupied => "Table is occupied",
            ErrorCode::TableNameExists => "Table name already exists",
            ErrorCode::TableIsFixed => "Fixed tables cannot be removed",

            // System
            ErrorCode::InternalError => "Internal server error",

            // Storage
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            9 => Ok(ErrorCode::InvalidState),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Permission
            2003 => Ok(ErrorCode::AdminRequired),

            // Round
            4001 => Ok(ErrorCode::RoundNotFound),
            4002 => Ok(ErrorCode::RoundAlreadyPaid),
            4006 => Ok(ErrorCode::LineItemNotFound),
            4008 => Ok(ErrorCode::InsufficientQuantity),

            // Ticket
            5006 => Ok(ErrorCode::TicketNotFound),
            5007 => Ok(ErrorCode::TicketSequenceExhausted),
            5008 => Ok(ErrorCode::TicketSequenceContention),

            // Table
            7001 => Ok(ErrorCode::TableNotFound),
            7002 => Ok(ErrorCode::TableOccupied),
            7005 => Ok(ErrorCode::TableNameExists),
            7006 => Ok(ErrorCode::TableIsFixed),

            // System
            9001 => Ok(ErrorCode::InternalError),

            // Storage
            9401 => Ok(ErrorCode::StorageFull),
            9402 => Ok(ErrorCode::OutOfMemory),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}
