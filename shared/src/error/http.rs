//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::ValidationFailed | Self::InsufficientQuantity => StatusCode::BAD_REQUEST,

            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,

            Self::AdminRequired => StatusCode::FORBIDDEN,

            Self::NotFound
            | Self::RoundNotFound
            | Self::LineItemNotFound
            | Self::TicketNotFound
            | Self::TableNotFound => StatusCode::NOT_FOUND,

            Self::TableOccupied
            | Self::TableNameExists
            | Self::TicketSequenceContention => StatusCode::CONFLICT,

            Self::InvalidState | Self::RoundAlreadyPaid | Self::TableIsFixed => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            Self::TicketSequenceExhausted | Self::SystemBusy => StatusCode::SERVICE_UNAVAILABLE,

            Self::Unknown
            | Self::InternalError
            | Self::StorageFull
            | Self::OutOfMemory
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
