// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! TriplePool - Session-aware connection pooling for remote triple stores
//!
//! TriplePool keeps a bounded set of live repository sessions against a
//! remote triple store and lends them to threads on demand.
//!
//! # Features
//!
//! - **Session modes**: every borrow is handed over in the configured mode
//!   (shared autocommit, dedicated autocommit, or dedicated transactional),
//!   whatever the previous borrower did with the session
//! - **Blocking borrow**: bounded capacity with an optional wait limit
//! - **Idle management**: LIFO reuse, validation on borrow/return, and a
//!   background evictor with hard and soft idle limits
//! - **Repository bootstrap**: the target repository is created on first use,
//!   at most once even under concurrent creation
//! - **Configuration**: typed structs, property maps, key/value lists or JSON
//! - **Shutdown hooks** and leak detection for pools that are never closed
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triplepool::{ConnectionConfig, ConnectionPool, PoolTuning, SessionMode};
//!
//! let config = ConnectionConfig::new("http://localhost:10035", "test", "xyzzy", "people")?
//!     .with_session_mode(SessionMode::Transactional);
//! let pool = ConnectionPool::create(connector, config, PoolTuning::default())?;
//!
//! let mut conn = pool.borrow()?;
//! let triples = conn.size()?;
//! conn.commit()?;
//! conn.close()?;
//!
//! pool.close();
//! ```
//!
//! The remote service is reached through the [`transport`] traits;
//! [`MemoryServer`] is an in-process implementation.

pub mod config;
pub mod error;
pub mod factory;
pub mod pool;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use config::{
    ConnectionConfig, ConnectionProperties, ConnectionProperty, PoolProperties, PoolProperty,
    PoolTuning, Property, PropertySet, WarmupConfig,
};
pub use error::{PoolError, Result, TransportError};
pub use factory::ConnectionFactory;
pub use pool::{
    ConnectionPool, GenericPool, LeakDetector, LeakStatus, ObjectFactory, PoolStats,
    PooledConnection,
};
pub use session::{RepositoryConnection, SessionMode};
pub use shutdown::{run_shutdown_hooks, HookId, HookRegistry, ShutdownHook, ShutdownRegistry};
pub use transport::memory::{MemoryConnector, MemoryServer, MemoryStats};
pub use transport::{Connector, RemoteRepository, RemoteServer, RemoteSession};

/// TriplePool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TriplePool crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
