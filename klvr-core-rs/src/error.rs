//! Error taxonomy for device operations

use crate::types::Board;
use thiserror::Error;

/// Errors surfaced by slot and firmware operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("slot {slot} out of range (0..{count})", count = crate::types::SLOT_COUNT)]
    OutOfRange { slot: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("{0} board is already rebooting")]
    AlreadyRebooting(Board),
}

impl DeviceError {
    /// Stable machine-readable kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::OutOfRange { .. } => "out_of_range",
            DeviceError::InvalidArgument(_) => "invalid_argument",
            DeviceError::MalformedRequest(_) => "malformed_request",
            DeviceError::Unavailable(_) => "unavailable",
            DeviceError::AlreadyRebooting(_) => "already_rebooting",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DeviceError::OutOfRange { slot: 48 };
        assert_eq!(err.to_string(), "slot 48 out of range (0..48)");
        assert_eq!(err.kind(), "out_of_range");

        let err = DeviceError::AlreadyRebooting(Board::Rear);
        assert_eq!(err.to_string(), "rear board is already rebooting");
        assert_eq!(err.kind(), "already_rebooting");
    }
}
