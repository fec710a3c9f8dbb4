// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the connection pool and its transport layer

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the remote service collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),
}

impl TransportError {
    /// True when the failure means the server already reaped the session
    /// (its lifetime ran out), so closing it again has nothing left to do.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, TransportError::ConnectionRefused(_))
    }
}

/// Errors surfaced by pool construction and pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Pool exhausted: no connection available after {waited:?}")]
    Exhausted { waited: Duration },

    #[error("Pool is closed")]
    Closed,

    #[error("Destroy error: {0}")]
    Destroy(String),
}

impl From<TransportError> for PoolError {
    fn from(err: TransportError) -> Self {
        PoolError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        PoolError::Configuration(err.to_string())
    }
}

impl PoolError {
    /// Returns true if this is an exhaustion error
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_refused_counts_as_expired() {
        assert!(TransportError::ConnectionRefused("port 55321".to_string()).is_session_expired());
        assert!(!TransportError::Timeout("read".to_string()).is_session_expired());
        assert!(!TransportError::Http {
            status: 500,
            message: "boom".to_string()
        }
        .is_session_expired());
    }

    #[test]
    fn test_transport_error_converts_to_connection_error() {
        let err: PoolError = TransportError::NotFound("repo".to_string()).into();
        assert_eq!(err, PoolError::Connection("Not found: repo".to_string()));
    }

    #[test]
    fn test_exhausted_display() {
        let err = PoolError::Exhausted {
            waited: Duration::from_millis(0),
        };
        assert!(err.is_exhausted());
        assert!(err.to_string().starts_with("Pool exhausted"));
    }
}
