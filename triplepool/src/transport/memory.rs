// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! In-process triple store for embedding and testing
//!
//! `MemoryServer` keeps repositories in memory and counts every remote call a
//! pool makes, so tests can assert on session creation, teardown, rollbacks
//! and warm-ups. Faults (refused connections, failing requests, failing
//! repository or session opens, expired sessions, slow repository creation)
//! can be switched on at any time.

use super::{Connector, RemoteRepository, RemoteServer, RemoteSession, TransportResult};
use crate::config::{ConnectionConfig, WarmupConfig};
use crate::error::TransportError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ROOT_CATALOG: &str = "/";
const FIRST_SESSION_PORT: u16 = 55_000;
const SESSION_PORTS: u32 = 10_000;

/// Snapshot of the calls a [`MemoryServer`] has served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub connections_opened: usize,
    pub servers_closed: usize,
    pub repositories_created: usize,
    pub repositories_shut_down: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub size_requests: usize,
    pub rollbacks: usize,
    pub warmups: usize,
}

#[derive(Default)]
struct Counters {
    connections_opened: AtomicUsize,
    servers_closed: AtomicUsize,
    repositories_created: AtomicUsize,
    repositories_shut_down: AtomicUsize,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    size_requests: AtomicUsize,
    rollbacks: AtomicUsize,
    warmups: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> MemoryStats {
        MemoryStats {
            connections_opened: self.connections_opened.load(Ordering::SeqCst),
            servers_closed: self.servers_closed.load(Ordering::SeqCst),
            repositories_created: self.repositories_created.load(Ordering::SeqCst),
            repositories_shut_down: self.repositories_shut_down.load(Ordering::SeqCst),
            sessions_opened: self.sessions_opened.load(Ordering::SeqCst),
            sessions_closed: self.sessions_closed.load(Ordering::SeqCst),
            size_requests: self.size_requests.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
            warmups: self.warmups.load(Ordering::SeqCst),
        }
    }
}

struct MemoryState {
    /// (catalog, repository) -> triple count
    repositories: RwLock<HashMap<(String, String), u64>>,
    counters: Counters,
    refuse_connections: AtomicBool,
    fail_requests: AtomicBool,
    fail_repository_open: AtomicBool,
    fail_session_open: AtomicBool,
    create_delay: Mutex<Duration>,
    /// Bumped to expire every dedicated session opened before
    session_epoch: AtomicU64,
    /// Dedicated sessions handed out so far; ports cycle through
    /// `SESSION_PORTS` values from `FIRST_SESSION_PORT`
    sessions_dedicated: AtomicU32,
    last_socket_timeout: Mutex<Option<Duration>>,
    last_session_lifetime: Mutex<Option<Duration>>,
    last_warmup: Mutex<Option<WarmupConfig>>,
}

fn repository_key(catalog: Option<&str>, name: &str) -> (String, String) {
    (
        catalog.unwrap_or(ROOT_CATALOG).to_string(),
        name.to_string(),
    )
}

/// In-process server shared by every handle opened through its connector
#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<MemoryState>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState {
                repositories: RwLock::new(HashMap::new()),
                counters: Counters::default(),
                refuse_connections: AtomicBool::new(false),
                fail_requests: AtomicBool::new(false),
                fail_repository_open: AtomicBool::new(false),
                fail_session_open: AtomicBool::new(false),
                create_delay: Mutex::new(Duration::ZERO),
                session_epoch: AtomicU64::new(0),
                sessions_dedicated: AtomicU32::new(0),
                last_socket_timeout: Mutex::new(None),
                last_session_lifetime: Mutex::new(None),
                last_warmup: Mutex::new(None),
            }),
        }
    }

    /// Add a repository without counting it as a remote create call
    pub fn with_repository(self, catalog: Option<&str>, name: &str, triples: u64) -> Self {
        self.state
            .repositories
            .write()
            .insert(repository_key(catalog, name), triples);
        self
    }

    /// Connector handing out transports to this server
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        self.state.counters.snapshot()
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        let stats = self.stats();
        stats.sessions_opened.saturating_sub(stats.sessions_closed)
    }

    pub fn repository_exists(&self, catalog: Option<&str>, name: &str) -> bool {
        self.state
            .repositories
            .read()
            .contains_key(&repository_key(catalog, name))
    }

    /// Refuse every new transport from now on
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Make size, warm-up and session-lifetime requests fail, so validation
    /// of every connection fails
    pub fn fail_requests(&self, fail: bool) {
        self.state.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Make opening or creating a repository fail after the transport is up
    pub fn fail_repository_open(&self, fail: bool) {
        self.state.fail_repository_open.store(fail, Ordering::SeqCst);
    }

    /// Make opening a session fail once the repository is resolved
    pub fn fail_session_open(&self, fail: bool) {
        self.state.fail_session_open.store(fail, Ordering::SeqCst);
    }

    /// Reap all dedicated sessions opened so far, as if their lifetime ran out
    pub fn expire_sessions(&self) {
        self.state.session_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Slow down repository creation to widen race windows
    pub fn set_create_delay(&self, delay: Duration) {
        *self.state.create_delay.lock() = delay;
    }

    pub fn last_socket_timeout(&self) -> Option<Duration> {
        *self.state.last_socket_timeout.lock()
    }

    pub fn last_session_lifetime(&self) -> Option<Duration> {
        *self.state.last_session_lifetime.lock()
    }

    pub fn last_warmup(&self) -> Option<WarmupConfig> {
        *self.state.last_warmup.lock()
    }
}

/// [`Connector`] for a [`MemoryServer`]
#[derive(Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ConnectionConfig) -> TransportResult<Box<dyn RemoteServer>> {
        let state = &self.server.state;
        if state.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionRefused(format!(
                "{} refused the connection",
                config.server_url
            )));
        }

        Counters::bump(&state.counters.connections_opened);
        *state.last_socket_timeout.lock() = config.socket_timeout;

        Ok(Box::new(MemoryServerHandle {
            state: state.clone(),
            url: config.server_url.trim_end_matches('/').to_string(),
            closed: false,
        }))
    }
}

struct MemoryServerHandle {
    state: Arc<MemoryState>,
    url: String,
    closed: bool,
}

impl MemoryServerHandle {
    fn check_open(&self) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Protocol(format!(
                "transport to {} is closed",
                self.url
            )));
        }
        Ok(())
    }

    fn check_repository_open(&self) -> TransportResult<()> {
        if self.state.fail_repository_open.load(Ordering::SeqCst) {
            return Err(TransportError::Http {
                status: 503,
                message: "repository unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn repository_handle(&self, key: (String, String)) -> Box<dyn RemoteRepository> {
        Box::new(MemoryRepositoryHandle {
            state: self.state.clone(),
            url: self.url.clone(),
            key,
            shut_down: false,
        })
    }
}

impl RemoteServer for MemoryServerHandle {
    fn url(&self) -> &str {
        &self.url
    }

    fn has_repository(&self, catalog: Option<&str>, name: &str) -> TransportResult<bool> {
        self.check_open()?;
        Ok(self
            .state
            .repositories
            .read()
            .contains_key(&repository_key(catalog, name)))
    }

    fn create_repository(
        &self,
        catalog: Option<&str>,
        name: &str,
    ) -> TransportResult<Box<dyn RemoteRepository>> {
        self.check_open()?;
        self.check_repository_open()?;
        let delay = *self.state.create_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let key = repository_key(catalog, name);
        {
            let mut repositories = self.state.repositories.write();
            if repositories.contains_key(&key) {
                return Err(TransportError::AlreadyExists(format!(
                    "repository {}{}",
                    key.0, key.1
                )));
            }
            repositories.insert(key.clone(), 0);
        }
        Counters::bump(&self.state.counters.repositories_created);
        Ok(self.repository_handle(key))
    }

    fn open_repository(
        &self,
        catalog: Option<&str>,
        name: &str,
    ) -> TransportResult<Box<dyn RemoteRepository>> {
        self.check_open()?;
        self.check_repository_open()?;
        let key = repository_key(catalog, name);
        if !self.state.repositories.read().contains_key(&key) {
            return Err(TransportError::NotFound(format!(
                "repository {} in catalog {}",
                key.1, key.0
            )));
        }
        Ok(self.repository_handle(key))
    }

    fn close(&mut self) -> TransportResult<()> {
        if !self.closed {
            self.closed = true;
            Counters::bump(&self.state.counters.servers_closed);
        }
        Ok(())
    }
}

struct MemoryRepositoryHandle {
    state: Arc<MemoryState>,
    url: String,
    key: (String, String),
    shut_down: bool,
}

impl RemoteRepository for MemoryRepositoryHandle {
    fn name(&self) -> &str {
        &self.key.1
    }

    fn open_session(&mut self) -> TransportResult<Box<dyn RemoteSession>> {
        if self.shut_down {
            return Err(TransportError::Protocol(format!(
                "repository {} is shut down",
                self.key.1
            )));
        }
        if self.state.fail_session_open.load(Ordering::SeqCst) {
            return Err(TransportError::Http {
                status: 503,
                message: "no session slots left".to_string(),
            });
        }
        Counters::bump(&self.state.counters.sessions_opened);
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            url: self.url.clone(),
            key: self.key.clone(),
            epoch: self.state.session_epoch.load(Ordering::SeqCst),
            port: None,
            auto_commit: true,
            rollback_hint: false,
            closed: false,
        }))
    }

    fn shutdown(&mut self) -> TransportResult<()> {
        if !self.shut_down {
            self.shut_down = true;
            Counters::bump(&self.state.counters.repositories_shut_down);
        }
        Ok(())
    }
}

struct MemorySession {
    state: Arc<MemoryState>,
    url: String,
    key: (String, String),
    epoch: u64,
    /// Set once the session is dedicated
    port: Option<u16>,
    auto_commit: bool,
    rollback_hint: bool,
    closed: bool,
}

impl MemorySession {
    fn check_alive(&self) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::SessionClosed(self.root()));
        }
        if self.port.is_some() && self.epoch != self.state.session_epoch.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionRefused(
                "Connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn fail_if_requested(&self) -> TransportResult<()> {
        if self.state.fail_requests.load(Ordering::SeqCst) {
            return Err(TransportError::Http {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteSession for MemorySession {
    fn root(&self) -> String {
        match self.port {
            Some(port) => format!("http://127.0.0.1:{}/sessions/{}", port, self.key.1),
            None if self.key.0 == ROOT_CATALOG => {
                format!("{}/repositories/{}", self.url, self.key.1)
            }
            None => format!(
                "{}/catalogs/{}/repositories/{}",
                self.url, self.key.0, self.key.1
            ),
        }
    }

    fn size(&mut self) -> TransportResult<u64> {
        self.check_alive()?;
        Counters::bump(&self.state.counters.size_requests);
        self.fail_if_requested()?;
        if self.rollback_hint {
            Counters::bump(&self.state.counters.rollbacks);
        }
        Ok(self
            .state
            .repositories
            .read()
            .get(&self.key)
            .copied()
            .unwrap_or(0))
    }

    fn set_rollback_hint(&mut self, enabled: bool) {
        self.rollback_hint = enabled;
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> TransportResult<()> {
        self.check_alive()?;
        if self.port.is_none() {
            let n = self.state.sessions_dedicated.fetch_add(1, Ordering::SeqCst);
            self.port = Some(FIRST_SESSION_PORT + (n % SESSION_PORTS) as u16);
            self.epoch = self.state.session_epoch.load(Ordering::SeqCst);
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn is_dedicated(&self) -> bool {
        self.port.is_some()
    }

    fn commit(&mut self) -> TransportResult<()> {
        self.check_alive()
    }

    fn rollback(&mut self) -> TransportResult<()> {
        self.check_alive()?;
        Counters::bump(&self.state.counters.rollbacks);
        Ok(())
    }

    fn set_session_lifetime(&mut self, lifetime: Duration) -> TransportResult<()> {
        self.check_alive()?;
        self.fail_if_requested()?;
        *self.state.last_session_lifetime.lock() = Some(lifetime);
        Ok(())
    }

    fn warmup(&mut self, config: &WarmupConfig) -> TransportResult<()> {
        self.check_alive()?;
        self.fail_if_requested()?;
        Counters::bump(&self.state.counters.warmups);
        *self.state.last_warmup.lock() = Some(*config);
        Ok(())
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        let alive = self.check_alive();
        self.closed = true;
        Counters::bump(&self.state.counters.sessions_closed);
        alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("http://localhost:10035", "test", "xyzzy", "people").unwrap()
    }

    #[test]
    fn test_create_then_open_repository() {
        let server = MemoryServer::new();
        let handle = server.connector().connect(&config()).unwrap();

        assert!(!handle.has_repository(None, "people").unwrap());
        handle.create_repository(None, "people").unwrap();
        assert!(handle.has_repository(None, "people").unwrap());
        assert!(matches!(
            handle.create_repository(None, "people"),
            Err(TransportError::AlreadyExists(_))
        ));
        assert!(handle.open_repository(None, "people").is_ok());
        assert_eq!(server.stats().repositories_created, 1);
    }

    #[test]
    fn test_catalogs_are_separate() {
        let server = MemoryServer::new().with_repository(Some("scratch"), "people", 3);
        assert!(server.repository_exists(Some("scratch"), "people"));
        assert!(!server.repository_exists(None, "people"));
    }

    #[test]
    fn test_refused_connection() {
        let server = MemoryServer::new();
        server.refuse_connections(true);
        let err = server.connector().connect(&config()).err().unwrap();
        assert!(err.is_session_expired());
    }

    #[test]
    fn test_set_auto_commit_makes_session_dedicated() {
        let server = MemoryServer::new().with_repository(None, "people", 0);
        let handle = server.connector().connect(&config()).unwrap();
        let mut repo = handle.open_repository(None, "people").unwrap();
        let mut session = repo.open_session().unwrap();

        assert!(session.is_auto_commit());
        assert!(!session.is_dedicated());
        assert_eq!(session.root(), "http://localhost:10035/repositories/people");

        session.set_auto_commit(true).unwrap();
        assert!(session.is_dedicated());
        assert!(session.root().starts_with("http://127.0.0.1:"));
    }

    #[test]
    fn test_expired_session_refuses_close() {
        let server = MemoryServer::new().with_repository(None, "people", 0);
        let handle = server.connector().connect(&config()).unwrap();
        let mut repo = handle.open_repository(None, "people").unwrap();
        let mut shared = repo.open_session().unwrap();
        let mut dedicated = repo.open_session().unwrap();
        dedicated.set_auto_commit(false).unwrap();

        server.expire_sessions();

        assert!(shared.close().is_ok());
        let err = dedicated.close().unwrap_err();
        assert!(err.is_session_expired());
        assert!(dedicated.close().is_ok());
        assert_eq!(server.stats().sessions_closed, 2);
        assert_eq!(server.open_sessions(), 0);
    }

    #[test]
    fn test_repository_and_session_open_faults() {
        let server = MemoryServer::new().with_repository(None, "people", 0);
        let handle = server.connector().connect(&config()).unwrap();

        server.fail_repository_open(true);
        assert!(matches!(
            handle.open_repository(None, "people"),
            Err(TransportError::Http { status: 503, .. })
        ));
        assert!(handle.create_repository(None, "other").is_err());
        assert!(!server.repository_exists(None, "other"));

        server.fail_repository_open(false);
        let mut repo = handle.open_repository(None, "people").unwrap();
        server.fail_session_open(true);
        assert!(repo.open_session().is_err());
        assert_eq!(server.stats().sessions_opened, 0);
    }

    #[test]
    fn test_requests_after_close_report_closed_session() {
        let server = MemoryServer::new().with_repository(None, "people", 0);
        let handle = server.connector().connect(&config()).unwrap();
        let mut repo = handle.open_repository(None, "people").unwrap();
        let mut session = repo.open_session().unwrap();

        session.close().unwrap();
        let err = session.size().unwrap_err();
        assert!(matches!(err, TransportError::SessionClosed(_)));
        assert!(!err.is_session_expired());
    }

    #[test]
    fn test_session_ports_stay_in_range() {
        let server = MemoryServer::new().with_repository(None, "people", 0);
        server
            .state
            .sessions_dedicated
            .store(SESSION_PORTS - 1, Ordering::SeqCst);
        let handle = server.connector().connect(&config()).unwrap();
        let mut repo = handle.open_repository(None, "people").unwrap();

        let mut last = repo.open_session().unwrap();
        last.set_auto_commit(false).unwrap();
        let mut wrapped = repo.open_session().unwrap();
        wrapped.set_auto_commit(false).unwrap();

        assert_eq!(last.root(), "http://127.0.0.1:64999/sessions/people");
        assert_eq!(wrapped.root(), "http://127.0.0.1:55000/sessions/people");
    }

    #[test]
    fn test_rollback_hint_counts_rollback() {
        let server = MemoryServer::new().with_repository(None, "people", 42);
        let handle = server.connector().connect(&config()).unwrap();
        let mut repo = handle.open_repository(None, "people").unwrap();
        let mut session = repo.open_session().unwrap();

        assert_eq!(session.size().unwrap(), 42);
        session.set_rollback_hint(true);
        assert_eq!(session.size().unwrap(), 42);
        assert_eq!(server.stats().rollbacks, 1);
        assert_eq!(server.stats().size_requests, 2);
    }
}
