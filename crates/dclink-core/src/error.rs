//! Error types for dclink core.
//!
//! Only the text-parsing surfaces are fallible. Attribute reads and writes
//! and connectivity resolution are total and never produce an [`Error`].

use thiserror::Error;

/// Core errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// CID text is not valid base-32 of the expected length
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    /// SID text is not four base-32 characters
    #[error("invalid SID: {0}")]
    InvalidSid(String),

    /// Attribute code is not exactly two ASCII characters
    #[error("invalid attribute code: {0:?}")]
    InvalidAttrCode(String),

    /// Feature code is not exactly four ASCII characters
    #[error("invalid feature code: {0:?}")]
    InvalidFeature(String),

    /// A settings value could not be accepted
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting {
        /// Setting name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidAttrCode("NIC".to_string());
        assert_eq!(err.to_string(), "invalid attribute code: \"NIC\"");

        let err = Error::InvalidSetting {
            name: "slots",
            reason: "not a number".to_string(),
        };
        assert_eq!(err.to_string(), "invalid setting slots: not a number");
    }
}
