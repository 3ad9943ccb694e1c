//! Error types for perfdata-influxdb.

use thiserror::Error;

/// Error type for perfdata-influxdb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The server could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport gave up waiting for the server.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP error: {status} - {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
    },

    /// A row of the CSV response could not be decoded.
    #[error("Decode error at row {row}: {message}")]
    Decode {
        /// 1-based row index within the response body.
        row: u64,
        /// Description of what failed to decode.
        message: String,
    },

    /// The CSV reader failed before a row could be produced.
    #[error("CSV parse error: {0}")]
    Csv(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other transport failure.
    #[error("Request error: {0}")]
    Request(String),

    /// I/O error while reading a response body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Error::Timeout(e.to_string());
        }
        if e.is_connect() {
            return Error::Connection(e.to_string());
        }
        if let Some(status) = e.status() {
            return Error::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            };
        }
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Classify an error raised while reading a response body.
    ///
    /// Transport errors wrapped by the body reader are unwrapped again, so a
    /// timeout mid-body still surfaces as [`Error::Timeout`].
    pub(crate) fn from_body_io(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            return Error::Timeout(e.to_string());
        }
        if !e.get_ref().is_some_and(|inner| inner.is::<reqwest::Error>()) {
            return Error::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
            Some(Ok(reqwest_error)) => Error::from(*reqwest_error),
            _ => Error::Request("response body read failed".to_string()),
        }
    }

    pub(crate) fn decode(row: u64, message: impl Into<String>) -> Self {
        Error::Decode {
            row,
            message: message.into(),
        }
    }
}

/// Result type alias for perfdata-influxdb operations.
pub type Result<T> = std::result::Result<T, Error>;
