// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Remote service abstraction
//!
//! The pool never speaks the wire protocol itself. It drives the remote
//! triple store through these traits, which mirror the three handles a client
//! holds for one session:
//!
//! - `RemoteServer`: the transport to one server, scoped to one set of credentials
//! - `RemoteRepository`: an opened repository inside a catalog
//! - `RemoteSession`: the session-bound client issuing requests
//!
//! Every pooled connection owns its own instance of all three, so tearing one
//! connection down never affects another.
//!
//! [`memory`] provides an in-process implementation.

pub mod memory;

use crate::config::{ConnectionConfig, WarmupConfig};
use crate::error::TransportError;
use std::time::Duration;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Opens transports to a server
///
/// One connector is shared by every connection a factory creates.
pub trait Connector: Send + Sync {
    /// Open a transport handle for the server named in `config`
    ///
    /// Implementations apply `config.socket_timeout` to every request made
    /// through the returned handle.
    fn connect(&self, config: &ConnectionConfig) -> TransportResult<Box<dyn RemoteServer>>;
}

/// Transport to one server
///
/// Catalog arguments use `None` for the root catalog.
pub trait RemoteServer: Send {
    /// Base URL this handle talks to
    fn url(&self) -> &str;

    /// Check whether a repository exists
    fn has_repository(&self, catalog: Option<&str>, name: &str) -> TransportResult<bool>;

    /// Create a repository and open it
    ///
    /// # Returns
    /// * `Err(TransportError::AlreadyExists)` - if another client created it first
    fn create_repository(
        &self,
        catalog: Option<&str>,
        name: &str,
    ) -> TransportResult<Box<dyn RemoteRepository>>;

    /// Open an existing repository
    fn open_repository(
        &self,
        catalog: Option<&str>,
        name: &str,
    ) -> TransportResult<Box<dyn RemoteRepository>>;

    /// Release the transport
    fn close(&mut self) -> TransportResult<()>;
}

/// An opened repository
pub trait RemoteRepository: Send {
    fn name(&self) -> &str;

    /// Start a session-bound client against this repository
    fn open_session(&mut self) -> TransportResult<Box<dyn RemoteSession>>;

    /// Release the repository handle
    fn shutdown(&mut self) -> TransportResult<()>;
}

/// Session-bound client
///
/// A fresh session talks to the shared front end with autocommit on.
/// Calling [`set_auto_commit`](RemoteSession::set_auto_commit) with either
/// value turns it into a dedicated session on the server.
pub trait RemoteSession: Send {
    /// URL requests are currently sent to (differs once dedicated)
    fn root(&self) -> String;

    /// Number of triples in the repository
    fn size(&mut self) -> TransportResult<u64>;

    /// Ask the server to roll back as part of each following request
    fn set_rollback_hint(&mut self, enabled: bool);

    fn is_auto_commit(&self) -> bool;

    /// Switch autocommit; makes the session dedicated if it is not already
    fn set_auto_commit(&mut self, enabled: bool) -> TransportResult<()>;

    fn is_dedicated(&self) -> bool;

    fn commit(&mut self) -> TransportResult<()>;

    fn rollback(&mut self) -> TransportResult<()>;

    /// Idle time after which the server reaps a dedicated session
    fn set_session_lifetime(&mut self, lifetime: Duration) -> TransportResult<()>;

    /// Load server-side structures into memory
    fn warmup(&mut self, config: &WarmupConfig) -> TransportResult<()>;

    /// End the session on the server
    ///
    /// # Returns
    /// * `Err(TransportError::ConnectionRefused)` - if the session already expired
    fn close(&mut self) -> TransportResult<()>;
}
