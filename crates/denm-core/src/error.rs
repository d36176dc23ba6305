//! Error types for the DEN basic service

use thiserror::Error;

use crate::ActionId;

/// DEN basic service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenmError {
    // Service state errors
    #[error("Station id or station type not configured")]
    AttributesUnset,

    #[error("Transport not attached")]
    TransportUnavailable,

    #[error("Transport error: {0}")]
    TransportError(String),

    // Data errors
    #[error("Allocation failed while building message")]
    AllocError,

    #[error("Mandatory event data fields are not set")]
    WrongDeData,

    #[error("Inconsistent table data for {0}")]
    WrongTableData(ActionId),

    #[error("Validity duration out of range: {0}s (max 86400s)")]
    InvalidValidityDuration(u32),

    #[error("Event validity expired")]
    ValidityExpired,

    // Codec errors
    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unexpected message id: {0}")]
    UnexpectedMessageId(u8),

    // Table errors
    #[error("Unknown action id {0}")]
    UnknownActionId(ActionId),

    #[error("Unknown action id {0} in originating table")]
    UnknownActionIdOriginating(ActionId),

    #[error("Unknown action id {0} in receiving table")]
    UnknownActionIdReceiving(ActionId),

    #[error("Action id {0} is not active in originating table")]
    NonActiveActionIdOriginating(ActionId),

    #[error("Action id {0} is not active in receiving table")]
    NonActiveActionIdReceiving(ActionId),
}

impl DenmError {
    /// Stable numeric code (0 is reserved for success)
    pub fn code(&self) -> u8 {
        match self {
            DenmError::AttributesUnset => 1,
            DenmError::AllocError => 2,
            DenmError::WrongDeData | DenmError::InvalidValidityDuration(_) => 3,
            DenmError::WrongTableData(_) => 4,
            DenmError::ValidityExpired => 5,
            DenmError::EncodeError(_) => 6,
            DenmError::UnknownActionId(_) => 7,
            DenmError::UnknownActionIdReceiving(_) => 8,
            DenmError::UnknownActionIdOriginating(_) => 9,
            DenmError::NonActiveActionIdReceiving(_) => 10,
            DenmError::NonActiveActionIdOriginating(_) => 11,
            DenmError::TransportUnavailable => 12,
            DenmError::TransportError(_) => 14,
            DenmError::InvalidWireFormat(_)
            | DenmError::BufferTooShort { .. }
            | DenmError::UnexpectedMessageId(_) => 13,
        }
    }
}

/// Result type for DEN basic service operations
pub type DenmResult<T> = Result<T, DenmError>;
