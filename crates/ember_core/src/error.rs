//! Error types for the core library

use thiserror::Error;

/// The core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Id was never issued or has already been destroyed
    #[error("Id {0} is not live")]
    NotLive(u64),

    /// Invalid (zero) id used where a live one is required
    #[error("Invalid id")]
    InvalidId,

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Create a message error
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Message(msg.into())
    }
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::NotLive(7).to_string(), "Id 7 is not live");
        assert_eq!(Error::message("boom").to_string(), "boom");
    }
}
