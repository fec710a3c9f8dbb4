// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Pool of repository connections
//!
//! `ConnectionPool` wraps a [`GenericPool`] of [`RepositoryConnection`]s made
//! by a [`ConnectionFactory`]. Borrowers receive a [`PooledConnection`]
//! whose `close()` (or drop) hands the connection back instead of ending the
//! remote session.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triplepool::{ConnectionPool, MemoryServer};
//!
//! let server = MemoryServer::new();
//! let pool = ConnectionPool::from_key_values(
//!     Arc::new(server.connector()),
//!     &[
//!         "serverUrl", "http://localhost:10035",
//!         "username", "test",
//!         "password", "xyzzy",
//!         "repository", "people",
//!         "session", "TX",
//!         "maxActive", "4",
//!     ],
//! )?;
//!
//! let mut conn = pool.borrow()?;
//! conn.commit()?;
//! conn.close()?;
//! pool.close();
//! ```

use crate::config::{
    ConnectionConfig, ConnectionProperties, PoolProperties, PoolTuning, PropertySet,
};
use crate::error::{PoolError, Result};
use crate::factory::{self, ConnectionFactory};
use crate::pool::generic::{GenericPool, PoolStats};
use crate::pool::leak::LeakDetector;
use crate::session::RepositoryConnection;
use crate::shutdown::{HookId, HookRegistry, ShutdownRegistry};
use crate::transport::Connector;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::Duration;

struct HookRegistration {
    registry: Arc<dyn ShutdownRegistry>,
    id: HookId,
}

/// State shared by every handle to one pool
pub(crate) struct PoolCore {
    delegate: Arc<GenericPool<ConnectionFactory>>,
    hook: Mutex<Option<HookRegistration>>,
}

impl PoolCore {
    pub(crate) fn num_active(&self) -> usize {
        self.delegate.num_active()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn release(&self, conn: RepositoryConnection) -> Result<()> {
        self.delegate.return_object(conn)
    }

    fn invalidate(&self, conn: RepositoryConnection) -> Result<()> {
        self.delegate.invalidate(conn)
    }

    pub(crate) fn close(&self) {
        let closed_now = self.delegate.close();

        if let Some(registration) = self.hook.lock().take() {
            registration.registry.unregister(registration.id);
        }

        if closed_now {
            let config = self.delegate.factory().config();
            log::info!(
                "Closed connection pool for {} at {}",
                config.repository,
                config.server_url
            );
        }
    }
}

impl Drop for PoolCore {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let active = self.num_active();
        if active > 0 {
            log::warn!(
                "Connection pool dropped without close() with {} connection(s) still borrowed",
                active
            );
        }
        self.close();
    }
}

/// Thread-safe pool of repository connections
///
/// Cloning is cheap; all clones share one pool. The pool is closed by
/// [`close`](ConnectionPool::close), or when the last clone is dropped.
#[derive(Clone)]
pub struct ConnectionPool {
    core: Arc<PoolCore>,
}

impl ConnectionPool {
    /// Build a pool, registering its shutdown hook (if enabled) with the
    /// process-wide registry
    pub fn create(
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
        tuning: PoolTuning,
    ) -> Result<Self> {
        Self::with_registry(connector, config, tuning, HookRegistry::global())
    }

    /// Build a pool from parsed property maps
    pub fn from_properties(
        connector: Arc<dyn Connector>,
        connection: &ConnectionProperties,
        pool: &PoolProperties,
    ) -> Result<Self> {
        let config = ConnectionConfig::from_properties(connection)?;
        let tuning = PoolTuning::from_properties(pool)?;
        Self::create(connector, config, tuning)
    }

    /// Build a pool from an alternating key/value sequence
    ///
    /// Keys that are neither connection nor pool properties are ignored.
    ///
    /// # Returns
    /// * `Err(PoolError::Configuration)` - if the sequence has odd length or a
    ///   value does not parse
    pub fn from_key_values<S: AsRef<str>>(
        connector: Arc<dyn Connector>,
        key_values: &[S],
    ) -> Result<Self> {
        let props = PropertySet::from_key_values(key_values)?;
        Self::from_properties(connector, &props.connection, &props.pool)
    }

    /// Build a pool from a JSON object of property names and values
    pub fn from_json(connector: Arc<dyn Connector>, json: &str) -> Result<Self> {
        let props = PropertySet::from_json(json)?;
        Self::from_properties(connector, &props.connection, &props.pool)
    }

    /// Build a pool with an injected shutdown registry
    ///
    /// Any failure while priming `initial_size` connections or running the
    /// warm-up closes the pool and is returned.
    pub fn with_registry(
        connector: Arc<dyn Connector>,
        config: ConnectionConfig,
        tuning: PoolTuning,
        registry: Arc<dyn ShutdownRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        tuning.validate()?;

        log::info!(
            "Creating connection pool for {} at {} ({} sessions, max {:?})",
            config.repository,
            config.server_url,
            config.session_mode,
            tuning.max_total
        );

        let factory = ConnectionFactory::new(config, connector);
        let delegate = Arc::new(GenericPool::new(factory, tuning));
        let pool = Self {
            core: Arc::new(PoolCore {
                delegate,
                hook: Mutex::new(None),
            }),
        };

        if let Err(e) = pool.prime().and_then(|_| pool.run_warmup()) {
            log::warn!("Connection pool initialization failed: {}", e);
            pool.close();
            return Err(e);
        }

        if pool.tuning().register_shutdown_hook {
            pool.register_hook(registry);
        }

        if let Err(e) = pool.core.delegate.start_evictor() {
            pool.close();
            return Err(e);
        }

        Ok(pool)
    }

    /// Borrow `initial_size` connections at once, then return them all
    fn prime(&self) -> Result<()> {
        let initial_size = self.tuning().initial_size;
        if initial_size == 0 {
            return Ok(());
        }

        let mut borrowed = Vec::with_capacity(initial_size);
        let mut failure = None;
        for _ in 0..initial_size {
            match self.core.delegate.borrow() {
                Ok(conn) => borrowed.push(conn),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        for conn in borrowed {
            let released = if failure.is_some() {
                self.core.delegate.invalidate(conn)
            } else {
                self.core.delegate.return_object(conn)
            };
            if let Err(e) = released {
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                log::debug!("Primed {} connection(s)", initial_size);
                Ok(())
            }
        }
    }

    fn run_warmup(&self) -> Result<()> {
        let Some(warmup) = self.tuning().warmup else {
            return Ok(());
        };

        let mut conn = self.core.delegate.borrow()?;
        match conn.warmup(&warmup) {
            Ok(()) => {
                log::info!("Warmed up repository {}", conn.repository_name());
                self.core.delegate.return_object(conn)
            }
            Err(e) => {
                if let Err(destroy_err) = self.core.delegate.invalidate(conn) {
                    log::debug!("Destroying connection after failed warm-up: {}", destroy_err);
                }
                Err(e)
            }
        }
    }

    fn register_hook(&self, registry: Arc<dyn ShutdownRegistry>) {
        let weak = Arc::downgrade(&self.core);
        let id = registry.register(Box::new(move || {
            if let Some(core) = weak.upgrade() {
                log::info!("Closing connection pool from shutdown hook");
                core.close();
            }
        }));
        *self.core.hook.lock() = Some(HookRegistration { registry, id });
    }

    /// Borrow a connection in the configured session mode
    ///
    /// Blocks up to `max_wait` when every connection is in use.
    ///
    /// # Returns
    /// * `Err(PoolError::Exhausted)` - if no connection became available in time
    /// * `Err(PoolError::Closed)` - if the pool is closed
    /// * `Err(PoolError::Connection)` - if a new session could not be opened
    pub fn borrow(&self) -> Result<PooledConnection> {
        let conn = self.core.delegate.borrow()?;
        Ok(PooledConnection {
            conn: Some(conn),
            owner_pool: Some(Arc::downgrade(&self.core)),
        })
    }

    /// Hand a borrowed connection back
    ///
    /// Equivalent to [`PooledConnection::close`] for a handle borrowed from
    /// this pool.
    pub fn return_connection(&self, mut conn: PooledConnection) -> Result<()> {
        self.check_owner(&conn)?;
        conn.owner_pool = None;
        match conn.conn.take() {
            Some(inner) => self.core.release(inner),
            None => Ok(()),
        }
    }

    /// Destroy a borrowed connection instead of returning it
    pub fn invalidate(&self, mut conn: PooledConnection) -> Result<()> {
        self.check_owner(&conn)?;
        conn.owner_pool = None;
        match conn.conn.take() {
            Some(inner) => self.core.invalidate(inner),
            None => Ok(()),
        }
    }

    fn check_owner(&self, conn: &PooledConnection) -> Result<()> {
        let owned = conn
            .owner_pool
            .as_ref()
            .is_none_or(|owner| Weak::ptr_eq(owner, &Arc::downgrade(&self.core)));
        if owned {
            Ok(())
        } else {
            Err(PoolError::Configuration(
                "connection was borrowed from a different pool".to_string(),
            ))
        }
    }

    /// Keep at least `n` connections idle and create `n` of them now
    ///
    /// Raises `min_idle` to `n` and `max_idle` far enough to hold `n` more
    /// idle connections. Creation stops early at `max_total`.
    ///
    /// # Returns
    /// Number of connections created
    pub fn ensure_idle(&self, n: usize) -> Result<usize> {
        let delegate = &self.core.delegate;
        if delegate.is_closed() {
            return Err(PoolError::Closed);
        }
        if delegate.min_idle() < n {
            delegate.set_min_idle(n);
        }
        let wanted = delegate.num_idle() + n;
        if delegate.max_idle().is_some_and(|max| max < wanted) {
            delegate.set_max_idle(Some(wanted));
        }

        let mut added = 0;
        for _ in 0..n {
            if !delegate.add_object()? {
                break;
            }
            added += 1;
        }
        log::debug!("Added {} idle connection(s)", added);
        Ok(added)
    }

    /// Create one idle connection
    ///
    /// # Returns
    /// `false` if the pool is full
    pub fn add_idle(&self) -> Result<bool> {
        self.core.delegate.add_object()
    }

    /// Destroy every idle connection
    pub fn clear(&self) -> usize {
        self.core.delegate.clear()
    }

    /// Connections lent out or being opened
    pub fn num_active(&self) -> usize {
        self.core.num_active()
    }

    pub fn num_idle(&self) -> usize {
        self.core.delegate.num_idle()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        self.core.delegate.stats()
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.core.delegate.factory().config()
    }

    pub fn tuning(&self) -> &PoolTuning {
        self.core.delegate.tuning()
    }

    /// Close the pool
    ///
    /// Idle connections are destroyed now; borrowed ones when they are
    /// returned. Calling it again does nothing.
    pub fn close(&self) {
        self.core.close();
    }

    /// Watch for borrowed connections still outstanding after `deadline`
    pub fn leak_detector(&self, deadline: Duration) -> LeakDetector {
        LeakDetector::new(Arc::downgrade(&self.core), deadline)
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        f.debug_struct("ConnectionPool")
            .field("server_url", &config.server_url)
            .field("repository", &config.repository)
            .field("session_mode", &config.session_mode)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection borrowed from a [`ConnectionPool`]
///
/// Dereferences to [`RepositoryConnection`]. `close()` returns the connection
/// to the pool it came from; if that pool is gone the session is ended
/// instead. Dropping an open handle closes it.
///
/// # Panics
/// Dereferencing after `close()` panics; use [`get`](PooledConnection::get)
/// to check first.
pub struct PooledConnection {
    conn: Option<RepositoryConnection>,
    /// Pool the connection goes back to; never keeps the pool alive
    owner_pool: Option<Weak<PoolCore>>,
}

impl PooledConnection {
    pub fn get(&self) -> Option<&RepositoryConnection> {
        self.conn.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut RepositoryConnection> {
        self.conn.as_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Return the connection to its pool
    ///
    /// Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match self.owner_pool.take().and_then(|owner| owner.upgrade()) {
            Some(core) => core.release(conn),
            None => {
                log::debug!("Pool of connection {} is gone, closing it", conn.id());
                factory::teardown(conn)
            }
        }
    }

    /// Destroy the connection instead of returning it
    pub fn invalidate(mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match self.owner_pool.take().and_then(|owner| owner.upgrade()) {
            Some(core) => core.invalidate(conn),
            None => factory::teardown(conn),
        }
    }

    /// The pool this connection returns to, if it is still alive
    pub fn pool(&self) -> Option<ConnectionPool> {
        self.owner_pool
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|core| ConnectionPool { core })
    }
}

impl Deref for PooledConnection {
    type Target = RepositoryConnection;

    fn deref(&self) -> &RepositoryConnection {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => panic!("PooledConnection used after close()"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut RepositoryConnection {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => panic!("PooledConnection used after close()"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Closing dropped connection failed: {}", e);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("pooled", &self.owner_pool.is_some())
            .finish()
    }
}
