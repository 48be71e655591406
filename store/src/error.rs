//! Error types for the `store` crate.
//!
//! Follows the same shape as the other layers: a root `Error` struct carrying an
//! `error_kind` plus the optional underlying `source`.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: StoreErrorKind,
}

/// Kinds of failures a durable store call can produce.
#[derive(Debug, PartialEq)]
pub enum StoreErrorKind {
    /// The call did not complete within the configured store timeout.
    Timeout,
    /// The store could not be reached or rejected the command.
    Network,
    /// A stored record could not be encoded or decoded.
    Serialization,
    /// The store URL or client settings are unusable.
    Config,
}

impl Error {
    pub fn new(error_kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Error {
            source: Some(message.into().into()),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Store error ({:?}): {}", self.error_kind, source),
            None => write!(f, "Store error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let error_kind = if err.is_timeout() {
            StoreErrorKind::Timeout
        } else if err.kind() == redis::ErrorKind::InvalidClientConfig {
            StoreErrorKind::Config
        } else {
            StoreErrorKind::Network
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: StoreErrorKind::Serialization,
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: StoreErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = Error::new(StoreErrorKind::Network, "connection refused");
        let rendered = err.to_string();
        assert!(rendered.contains("Network"));
        assert!(rendered.contains("connection refused"));
    }
}
