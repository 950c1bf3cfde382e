//! Error types for session-keeper.

use thiserror::Error;

use crate::codec::CodecError;

/// Boxed error used to carry opaque backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for session-keeper operations.
///
/// A missing session is never an error: providers return empty bytes and
/// stores return `None`, so "not found" can't be confused with "backend down".
#[derive(Error, Debug)]
pub enum SessionError {
    /// The manager has no provider attached.
    #[error("no session provider configured")]
    NotConfigured,

    /// The session id generator produced a zero-length id.
    #[error("session id generator returned an empty id")]
    EmptySessionId,

    /// The id can't be used as a key by the backend.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Opaque backend failure, passed through unmodified.
    #[error("provider error: {0}")]
    Provider(BoxError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A provider with this name is already registered.
    #[error("provider already registered: {0}")]
    ProviderAlreadyRegistered(String),

    /// Providers can't be registered under an empty name.
    #[error("provider name must not be empty")]
    InvalidProviderName,

    /// No provider is registered under this name.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl SessionError {
    /// Wrap any backend error as an opaque provider failure.
    pub fn provider<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Provider(err.into())
    }
}

/// Convenience Result type for session-keeper operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_display() {
        let err = SessionError::NotConfigured;
        assert!(err.to_string().contains("no session provider"));
    }

    #[test]
    fn test_invalid_session_id_display() {
        let err = SessionError::InvalidSessionId("../etc".into());
        assert!(err.to_string().contains("../etc"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SessionError = io_err.into();
        assert!(matches!(err, SessionError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_codec_error_conversion() {
        let err: SessionError = CodecError::Truncated.into();
        assert!(matches!(err, SessionError::Codec(CodecError::Truncated)));
        assert!(err.to_string().contains("codec error"));
    }

    #[test]
    fn test_provider_error_keeps_source_message() {
        let err = SessionError::provider("connection refused");
        assert!(matches!(err, SessionError::Provider(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_already_registered_display() {
        let err = SessionError::ProviderAlreadyRegistered("memory".into());
        assert!(err.to_string().contains("memory"));
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_unknown_provider_display() {
        let err = SessionError::UnknownProvider("redis".into());
        assert_eq!(err.to_string(), "unknown provider: redis");
    }
}
