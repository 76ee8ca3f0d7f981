//! Error types for printer telemetry polling.

use serde::Serialize;
use thiserror::Error;

/// Errors from a single command round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The printer could not be reached.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// No complete response arrived in time.
    #[error("timeout after {0} ms")]
    Timeout(u64),

    /// The response stream was broken or oversized.
    #[error("read error: {0}")]
    ReadError(String),
}

/// A response that could not be recognized as a reply to the command sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing but whitespace came back.
    #[error("empty response")]
    Empty,

    /// The reply did not end with the `ok` line.
    #[error("missing terminator")]
    MissingTerminator,

    /// Header line absent or naming another command.
    #[error("garbled framing: {0}")]
    Framing(String),
}

/// Failure of one sub-query, from either layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Round trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reply could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl QueryError {
    /// Cycle-level classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) => e.into(),
            Self::Parse(_) => ErrorKind::ParseError,
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the config schema.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Errors from the polling coordinator's lifecycle calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// `start` was called while the poll loop is already running.
    #[error("coordinator already running")]
    AlreadyRunning,

    /// `start` was given a zero interval or cycle timeout.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),
}

/// Why a whole poll cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The printer refused the first connection.
    Unreachable,
    /// The cycle or a sub-query ran out of time.
    Timeout,
    /// Broken or oversized response.
    ReadError,
    /// Response received but not recognizable.
    ParseError,
}

impl From<&TransportError> for ErrorKind {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::ConnectionRefused(_) => Self::Unreachable,
            TransportError::Timeout(_) => Self::Timeout,
            TransportError::ReadError(_) => Self::ReadError,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
            Self::ReadError => "read error",
            Self::ParseError => "parse error",
        };
        f.write_str(s)
    }
}

/// Result type for telemetry operations.
pub type Result<T, E = TransportError> = std::result::Result<T, E>;
