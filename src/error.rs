// src/error.rs

//! Error types for pushreq
//!
//! Every failure the index layer and the push request core can report is a
//! variant here. The server maps them onto HTTP status codes through
//! [`Error::status_code`]; validation failures keep the complete list of
//! messages so a client sees every violation in one response.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the index layer and the push request workflow
#[derive(Debug, Error)]
pub enum Error {
    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Initialization or internal invariant failure
    #[error("Initialization error: {0}")]
    InitError(String),

    /// The index configuration was rejected; carries every violation
    #[error("{}", .0.join("; "))]
    InvalidIndexConfig(Vec<String>),

    /// The index name does not satisfy the naming rules
    #[error("{0}")]
    InvalidIndexName(String),

    /// The acting principal may not perform the operation (HTTP 401)
    #[error("{0}")]
    Unauthorized(String),

    /// The acting principal lacks a capability on the index (HTTP 403)
    #[error("{0}")]
    Forbidden(String),

    /// Approval attempted without the serial header
    #[error("missing X-Devpi-PR-Serial request header")]
    MissingSerialHeader,

    /// The serial header is not an integer
    #[error("invalid X-Devpi-PR-Serial request header: {0:?}")]
    InvalidSerialHeader(String),

    /// The staging index changed since the approver looked at it
    #[error("got X-Devpi-PR-Serial {got}, expected {expected}")]
    SerialMismatch { got: i64, expected: i64 },

    /// A file with the same name already exists in a non-volatile index
    #[error("{file} already exists in non-volatile index {index}")]
    TransferConflict { file: String, index: String },

    /// Entity lookup failed
    #[error("{0}")]
    NotFound(String),

    /// Entity already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// Malformed request
    #[error("{0}")]
    BadRequest(String),
}

impl Error {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidIndexConfig(_)
            | Error::InvalidIndexName(_)
            | Error::MissingSerialHeader
            | Error::InvalidSerialHeader(_)
            | Error::SerialMismatch { .. }
            | Error::BadRequest(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) | Error::TransferConflict { .. } => 409,
            Error::Database(_) | Error::Io(_) | Error::Json(_) | Error::InitError(_) => 500,
        }
    }

    /// Individual messages of this error, one per violation
    pub fn messages(&self) -> Vec<String> {
        match self {
            Error::InvalidIndexConfig(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidIndexConfig(vec![]).status_code(), 400);
        assert_eq!(Error::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(Error::Forbidden("x".into()).status_code(), 403);
        assert_eq!(Error::SerialMismatch { got: 1, expected: 2 }.status_code(), 400);
        assert_eq!(
            Error::TransferConflict {
                file: "a.tgz".into(),
                index: "u/i".into()
            }
            .status_code(),
            409
        );
    }

    #[test]
    fn test_validation_messages_are_kept() {
        let err = Error::InvalidIndexConfig(vec!["first".into(), "second".into()]);
        assert_eq!(err.messages(), vec!["first", "second"]);
        assert_eq!(err.to_string(), "first; second");
    }

    #[test]
    fn test_serial_mismatch_names_both_values() {
        let err = Error::SerialMismatch { got: 7, expected: 9 };
        assert_eq!(err.to_string(), "got X-Devpi-PR-Serial 7, expected 9");
    }
}
