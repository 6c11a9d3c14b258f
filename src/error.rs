//! Error types for the Negotiate authentication handshake.

use std::io;

use thiserror::Error;

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised while driving a Negotiate/NTLM handshake.
///
/// Provider failures during a token exchange are normally swallowed by the
/// handshake (the best available prior response is returned instead), so the
/// variants a caller actually observes are [`Error::Protocol`] for malformed
/// server challenges and [`Error::Transport`] for failures in the underlying
/// HTTP layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Local credential acquisition or validation failed inside the
    /// security provider.
    #[error("credential failure: {0}")]
    Credential(String),

    /// The security provider reported a failure unrelated to credentials.
    #[error("security context failure: {0}")]
    Context(String),

    /// The server challenge was malformed or ambiguous; no forward
    /// progress is possible.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Failure in the underlying HTTP layer, propagated unchanged.
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// The outgoing request could not be constructed.
    #[error("invalid request: {0}")]
    Request(String),
}

impl Error {
    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Transport(err.into())
    }

    pub fn is_credential(&self) -> bool {
        matches!(self, Error::Credential(_))
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Error::Context(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<sspi::Error> for Error {
    fn from(err: sspi::Error) -> Self {
        use sspi::ErrorKind;

        match err.error_type {
            ErrorKind::NoCredentials
            | ErrorKind::UnknownCredentials
            | ErrorKind::IncompleteCredentials
            | ErrorKind::LogonDenied => Error::Credential(err.to_string()),
            _ => Error::Context(err.to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::transport(err)
    }
}
