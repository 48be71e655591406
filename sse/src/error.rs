//! Error types for the `sse` layer.
//!
//! Every component boundary returns `Result<_, Error>` and callers branch on
//! `error_kind`, never on message text. A store failure is `StoreUnavailable`
//! whether it happens during registration (fatal to the connection) or during
//! reconciliation (logged, retried next tick); the caller decides which.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

pub const MISSING_SESSION_ID_MESSAGE: &str = "Missing sessionId parameter";
pub const UNKNOWN_SESSION_MESSAGE: &str = "No active session for the provided sessionId";

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: RelayErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    /// The inbound request lacks context needed to set up a stream.
    Configuration,
    /// The durable store failed or timed out.
    StoreUnavailable,
    /// No live session record for the requested id.
    UnknownSession,
    /// The request omitted the session id.
    MissingParameter,
    /// The request's query string could not be decoded.
    InvalidParameter,
    /// The message body is not valid JSON.
    MalformedPayload,
    /// A frame could not be written to the stream.
    TransportSendFailure,
}

impl Error {
    pub fn new(error_kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Error {
            source: Some(message.into().into()),
            error_kind,
        }
    }

    pub fn missing_parameter() -> Self {
        Error {
            source: None,
            error_kind: RelayErrorKind::MissingParameter,
        }
    }

    pub fn unknown_session() -> Self {
        Error {
            source: None,
            error_kind: RelayErrorKind::UnknownSession,
        }
    }

    /// Errors caused by the caller's request rather than by this service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.error_kind,
            RelayErrorKind::UnknownSession
                | RelayErrorKind::MissingParameter
                | RelayErrorKind::InvalidParameter
                | RelayErrorKind::MalformedPayload
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.error_kind, &self.source) {
            (RelayErrorKind::MissingParameter, _) => f.write_str(MISSING_SESSION_ID_MESSAGE),
            (RelayErrorKind::UnknownSession, _) => f.write_str(UNKNOWN_SESSION_MESSAGE),
            (RelayErrorKind::Configuration, Some(source)) => write!(f, "{source}"),
            (RelayErrorKind::InvalidParameter, Some(source)) => {
                write!(f, "Invalid query string: {source}")
            }
            (RelayErrorKind::StoreUnavailable, Some(source)) => {
                write!(f, "Session store unavailable: {source}")
            }
            (RelayErrorKind::MalformedPayload, Some(source)) => {
                write!(f, "Malformed message payload: {source}")
            }
            (RelayErrorKind::TransportSendFailure, Some(source)) => {
                write!(f, "Transport send failed: {source}")
            }
            (kind, None) => write!(f, "{kind:?}"),
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

// Translate failures from the `store` layer.
impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: RelayErrorKind::StoreUnavailable,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: RelayErrorKind::MalformedPayload,
        }
    }
}
