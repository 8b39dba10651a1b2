use thiserror::Error;

use crate::numeric::Numeric;

/// An error that might occur on a single connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("TLS handshake failed: {0}")]
    TlsError(String),
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// How a command handler fails. The common case carries the numeric reply
/// owed to the issuing client; the dispatcher sends it.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{}", .0.code())]
    Numeric(Numeric),
    #[error("Connection closed")]
    Disconnected,
}

impl From<Numeric> for CommandError {
    fn from(n: Numeric) -> Self {
        Self::Numeric(n)
    }
}

pub type HandleResult = Result<(), CommandError>;
