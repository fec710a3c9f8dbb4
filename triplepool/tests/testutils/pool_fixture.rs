//! Pool fixture for TriplePool integration tests
//!
//! Uses only the public API. Every fixture gets a fresh `MemoryServer`, so
//! counters start at zero and tests can run in parallel.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use triplepool::{
    ConnectionConfig, ConnectionPool, HookRegistry, MemoryServer, PoolTuning, Result, SessionMode,
};

static INIT: Once = Once::new();

pub const SERVER_URL: &str = "http://localhost:10035";
pub const REPOSITORY: &str = "pool-test";

/// Install a test logger once per test binary
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn connection_config(mode: SessionMode) -> ConnectionConfig {
    ConnectionConfig::new(SERVER_URL, "test", "xyzzy", REPOSITORY)
        .expect("valid connection config")
        .with_session_mode(mode)
}

/// A memory server and a pool of connections to it
pub struct PoolFixture {
    pub server: MemoryServer,
    pub registry: Arc<HookRegistry>,
    pub pool: ConnectionPool,
}

impl PoolFixture {
    pub fn new(mode: SessionMode) -> Result<Self> {
        Self::with_tuning(mode, PoolTuning::default())
    }

    pub fn with_tuning(mode: SessionMode, tuning: PoolTuning) -> Result<Self> {
        Self::on_server(MemoryServer::new(), mode, tuning)
    }

    pub fn on_server(server: MemoryServer, mode: SessionMode, tuning: PoolTuning) -> Result<Self> {
        init_logging();
        let registry = Arc::new(HookRegistry::new());
        let pool = ConnectionPool::with_registry(
            Arc::new(server.connector()),
            connection_config(mode),
            tuning,
            registry.clone(),
        )?;
        Ok(Self {
            server,
            registry,
            pool,
        })
    }

    /// Key/value configuration pointing at the fixture's repository
    pub fn key_values<'a>(extra: &[&'a str]) -> Vec<&'a str> {
        let mut kv = vec![
            "serverUrl",
            SERVER_URL,
            "username",
            "test",
            "password",
            "xyzzy",
            "repository",
            REPOSITORY,
        ];
        kv.extend_from_slice(extra);
        kv
    }
}
