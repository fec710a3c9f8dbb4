// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Session modes enforced on every borrow

use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transactional disposition a pooled session must have when it is lent out
///
/// The factory enforces the mode every time a connection is activated, so a
/// borrower may change autocommit freely and the next borrower still gets the
/// configured contract.
///
/// # Modes
///
/// - **Shared**: autocommit on, no dedicated session required. Requests go
///   through the server's shared front end.
///
/// - **Dedicated**: a dedicated server-side session in autocommit mode.
///
/// - **Transactional**: a dedicated server-side session with autocommit off.
///   Work accumulates until the borrower commits or rolls back.
///
/// # Examples
///
/// ```rust,no_run
/// use triplepool::SessionMode;
///
/// let mode: SessionMode = "tx".parse()?;
/// assert_eq!(mode, SessionMode::Transactional);
/// # Ok::<(), triplepool::PoolError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionMode {
    /// Autocommit through the shared front end (default)
    ///
    /// If a borrower switches autocommit off, the session becomes dedicated
    /// on the server and stays dedicated; activation only restores autocommit.
    #[default]
    Shared,

    /// Dedicated session, autocommit on
    Dedicated,

    /// Dedicated session, autocommit off
    #[serde(alias = "TX")]
    Transactional,
}

impl SessionMode {
    /// Returns true if this mode requires a dedicated server session
    pub fn is_dedicated(&self) -> bool {
        matches!(self, SessionMode::Dedicated | SessionMode::Transactional)
    }

    /// The autocommit value every borrower must observe at hand-off
    pub fn expects_auto_commit(&self) -> bool {
        !matches!(self, SessionMode::Transactional)
    }

    /// Property value used in configuration maps
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Shared => "SHARED",
            SessionMode::Dedicated => "DEDICATED",
            SessionMode::Transactional => "TX",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHARED" => Ok(SessionMode::Shared),
            "DEDICATED" => Ok(SessionMode::Dedicated),
            "TX" | "TRANSACTIONAL" => Ok(SessionMode::Transactional),
            other => Err(PoolError::Configuration(format!(
                "Unknown session mode '{}', expected SHARED, DEDICATED or TX",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(SessionMode::default(), SessionMode::Shared);
    }

    #[test]
    fn test_is_dedicated() {
        assert!(!SessionMode::Shared.is_dedicated());
        assert!(SessionMode::Dedicated.is_dedicated());
        assert!(SessionMode::Transactional.is_dedicated());
    }

    #[test]
    fn test_expects_auto_commit() {
        assert!(SessionMode::Shared.expects_auto_commit());
        assert!(SessionMode::Dedicated.expects_auto_commit());
        assert!(!SessionMode::Transactional.expects_auto_commit());
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("shared".parse::<SessionMode>().unwrap(), SessionMode::Shared);
        assert_eq!("Dedicated".parse::<SessionMode>().unwrap(), SessionMode::Dedicated);
        assert_eq!("tx".parse::<SessionMode>().unwrap(), SessionMode::Transactional);
        assert_eq!(
            "TRANSACTIONAL".parse::<SessionMode>().unwrap(),
            SessionMode::Transactional
        );
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "exclusive".parse::<SessionMode>().unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for mode in [
            SessionMode::Shared,
            SessionMode::Dedicated,
            SessionMode::Transactional,
        ] {
            assert_eq!(mode.to_string().parse::<SessionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_serde_accepts_tx_alias() {
        let mode: SessionMode = serde_json::from_str("\"TX\"").unwrap();
        assert_eq!(mode, SessionMode::Transactional);
    }
}
