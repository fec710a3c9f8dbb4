// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Connection factory
//!
//! The factory is the only component that opens or closes remote sessions,
//! and the only one that decides whether a session's transactional
//! disposition is acceptable for the next borrower.

use crate::config::ConnectionConfig;
use crate::error::{PoolError, Result, TransportError};
use crate::pool::ObjectFactory;
use crate::session::RepositoryConnection;
use crate::transport::{Connector, RemoteRepository, RemoteServer, TransportResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type RepositoryKey = (Option<String>, String);

/// Creates, activates, validates and destroys repository connections
pub struct ConnectionFactory {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    /// Serializes check-and-create per (catalog, repository)
    repository_locks: Mutex<HashMap<RepositoryKey, Arc<Mutex<()>>>>,
}

impl ConnectionFactory {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            repository_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open a new session, creating the repository if it does not exist
    ///
    /// The returned connection is in autocommit mode on the shared front end.
    /// Handles opened before a failure are released before returning.
    ///
    /// # Returns
    /// * `Err(PoolError::Connection)` - if the server cannot be reached or the
    ///   repository cannot be opened or created
    pub fn create_connection(&self) -> Result<RepositoryConnection> {
        let mut server = self.connector.connect(&self.config)?;

        let mut repository = match self.resolve_repository(&*server) {
            Ok(repository) => repository,
            Err(e) => {
                if let Err(close_err) = server.close() {
                    log::debug!("Closing transport after failed open: {}", close_err);
                }
                return Err(e.into());
            }
        };

        let session = match repository.open_session() {
            Ok(session) => session,
            Err(e) => {
                if let Err(shutdown_err) = repository.shutdown() {
                    log::debug!("Releasing repository after failed open: {}", shutdown_err);
                }
                if let Err(close_err) = server.close() {
                    log::debug!("Closing transport after failed open: {}", close_err);
                }
                return Err(e.into());
            }
        };

        let mut conn = RepositoryConnection::new(server, repository, session);
        if let Some(lifetime) = self.config.session_lifetime {
            if let Err(e) = conn.set_session_lifetime(lifetime) {
                if let Err(teardown_err) = teardown(conn) {
                    log::debug!("Releasing connection after failed open: {}", teardown_err);
                }
                return Err(e);
            }
        }

        log::debug!("Opened connection {} to {}", conn.id(), conn.root());
        Ok(conn)
    }

    /// Prepare a connection for hand-off to a borrower
    ///
    /// Uncommitted work left by the previous borrower is rolled back, then
    /// the configured session mode is enforced.
    pub fn activate_connection(&self, conn: &mut RepositoryConnection) -> Result<()> {
        if !conn.is_auto_commit() {
            conn.rollback()?;
        }

        let mode = self.config.session_mode;
        let auto_commit = mode.expects_auto_commit();
        if mode.is_dedicated() {
            if !conn.is_dedicated() || conn.is_auto_commit() != auto_commit {
                conn.set_auto_commit(auto_commit)?;
            }
        } else if !conn.is_auto_commit() {
            // The session went dedicated when autocommit was switched off
            // and stays that way; only autocommit is restored.
            log::debug!(
                "Connection {} restored to autocommit, session remains dedicated at {}",
                conn.id(),
                conn.root()
            );
            conn.set_auto_commit(true)?;
        }

        conn.touch();
        Ok(())
    }

    /// Check the session with a size request that rolls back
    ///
    /// Never fails; any error makes the connection invalid.
    pub fn validate_connection(&self, conn: &mut RepositoryConnection) -> bool {
        conn.set_rollback_hint(true);
        let result = conn.size();
        conn.set_rollback_hint(false);

        match result {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Connection {} failed validation: {}", conn.id(), e);
                false
            }
        }
    }

    /// Tear a connection down
    ///
    /// A session the server already reaped is not an error. The repository
    /// and server handles are released even when closing the session fails.
    pub fn destroy_connection(&self, conn: RepositoryConnection) -> Result<()> {
        teardown(conn)
    }

    fn resolve_repository(
        &self,
        server: &dyn RemoteServer,
    ) -> TransportResult<Box<dyn RemoteRepository>> {
        let catalog = self.config.catalog_name();
        let name = self.config.repository.as_str();

        if server.has_repository(catalog, name)? {
            return server.open_repository(catalog, name);
        }

        let lock = self.repository_lock(catalog, name);
        let _guard = lock.lock();

        if server.has_repository(catalog, name)? {
            return server.open_repository(catalog, name);
        }

        match server.create_repository(catalog, name) {
            Ok(repository) => {
                log::info!(
                    "Created repository {} in catalog {}",
                    name,
                    catalog.unwrap_or("/")
                );
                Ok(repository)
            }
            // Another client won the race
            Err(TransportError::AlreadyExists(_)) => server.open_repository(catalog, name),
            Err(e) => Err(e),
        }
    }

    fn repository_lock(&self, catalog: Option<&str>, name: &str) -> Arc<Mutex<()>> {
        let key = (catalog.map(str::to_string), name.to_string());
        self.repository_locks
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Close a connection's session, then release its handles
///
/// Used by the factory and by handles that outlive their pool.
pub(crate) fn teardown(mut conn: RepositoryConnection) -> Result<()> {
    let id = conn.id();

    let session = match conn.close_session() {
        Ok(()) => Ok(()),
        Err(e) if e.is_session_expired() => {
            log::debug!("Session {} had already expired: {}", id, e);
            Ok(())
        }
        Err(e) => Err(PoolError::Destroy(format!("closing session {}: {}", id, e))),
    };

    let handles = conn
        .release_handles()
        .map_err(|e| PoolError::Destroy(format!("releasing handles of {}: {}", id, e)));

    session.and(handles)
}

impl ObjectFactory for ConnectionFactory {
    type Object = RepositoryConnection;

    fn create(&self) -> Result<RepositoryConnection> {
        self.create_connection()
    }

    fn activate(&self, conn: &mut RepositoryConnection) -> Result<()> {
        self.activate_connection(conn)
    }

    fn validate(&self, conn: &mut RepositoryConnection) -> bool {
        self.validate_connection(conn)
    }

    fn destroy(&self, conn: RepositoryConnection) -> Result<()> {
        self.destroy_connection(conn)
    }
}
