/// Integration tests for building pools from configuration
///
/// These tests verify that:
/// 1. Key/value lists and JSON objects produce the expected pool
/// 2. Unknown keys are ignored and malformed input is rejected up front
mod testutils;

use std::sync::Arc;
use std::time::Duration;
use testutils::{init_logging, PoolFixture, REPOSITORY};
use triplepool::{
    ConnectionPool, MemoryServer, PoolError, PoolTuning, SessionMode, WarmupConfig,
};

#[test]
fn test_pool_from_key_values() {
    init_logging();
    let server = MemoryServer::new();
    let kv = PoolFixture::key_values(&[
        "session",
        "TX",
        "catalog",
        "scratch",
        "maxActive",
        "4",
        "maxWait",
        "250",
        "initialSize",
        "2",
        "testOnBorrow",
        "TRUE",
    ]);

    let pool = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap();

    assert_eq!(pool.config().session_mode, SessionMode::Transactional);
    assert_eq!(pool.config().catalog_name(), Some("scratch"));
    assert_eq!(pool.tuning().max_total, Some(4));
    assert_eq!(pool.tuning().max_wait, Some(Duration::from_millis(250)));
    assert!(pool.tuning().test_on_borrow);
    assert_eq!(pool.num_idle(), 2);
    assert!(server.repository_exists(Some("scratch"), REPOSITORY));
    pool.close();
}

#[test]
fn test_unknown_keys_ignored() {
    init_logging();
    let server = MemoryServer::new();
    let kv = PoolFixture::key_values(&["colour", "blue", "maxIdle", "3"]);

    let pool = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap();
    assert_eq!(pool.tuning().max_idle, Some(3));
}

#[test]
fn test_odd_key_value_list_rejected() {
    let server = MemoryServer::new();
    let kv = PoolFixture::key_values(&["maxIdle"]);

    let err = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));
}

#[test]
fn test_missing_required_key_rejected() {
    let server = MemoryServer::new();
    let kv = [
        "serverUrl",
        "http://localhost:10035",
        "username",
        "test",
        "password",
        "xyzzy",
    ];

    let err = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap_err();
    assert_eq!(
        err,
        PoolError::Configuration("Property required: repository".to_string())
    );
    assert_eq!(server.stats().connections_opened, 0);
}

#[test]
fn test_invalid_limits_rejected() {
    let server = MemoryServer::new();
    let kv = PoolFixture::key_values(&["minIdle", "5", "maxIdle", "2"]);

    let err = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));

    let kv = PoolFixture::key_values(&["maxWait", "soon"]);
    let err = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));
}

#[test]
fn test_negative_limits_mean_unbounded() {
    init_logging();
    let server = MemoryServer::new();
    let kv = PoolFixture::key_values(&["maxActive", "-1", "maxWait", "-1", "maxIdle", "-1"]);

    let pool = ConnectionPool::from_key_values(Arc::new(server.connector()), &kv).unwrap();
    assert_eq!(pool.tuning().max_total, None);
    assert_eq!(pool.tuning().max_wait, None);
    assert_eq!(pool.tuning().max_idle, None);
}

#[test]
fn test_pool_from_json() {
    init_logging();
    let server = MemoryServer::new();
    let json = r#"{
        "serverUrl": "http://localhost:10035",
        "username": "test",
        "password": "xyzzy",
        "repository": "pool-test",
        "session": "DEDICATED",
        "sessionLifetime": 300,
        "maxActive": 2,
        "testOnReturn": true,
        "warmup": true,
        "warmupIncludeStrings": false,
        "comment": null
    }"#;

    let pool = ConnectionPool::from_json(Arc::new(server.connector()), json).unwrap();

    assert_eq!(pool.config().session_mode, SessionMode::Dedicated);
    assert_eq!(pool.config().session_lifetime, Some(Duration::from_secs(300)));
    assert_eq!(pool.tuning().max_total, Some(2));
    assert!(pool.tuning().test_on_return);
    assert_eq!(
        pool.tuning().warmup,
        Some(WarmupConfig::default().include_strings(false))
    );
    assert_eq!(server.stats().warmups, 1);
    assert_eq!(server.last_session_lifetime(), Some(Duration::from_secs(300)));
}

#[test]
fn test_malformed_json_rejected() {
    let server = MemoryServer::new();

    let err = ConnectionPool::from_json(Arc::new(server.connector()), "{ not json").unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));

    let err = ConnectionPool::from_json(Arc::new(server.connector()), "[1, 2]").unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)));
}

#[test]
fn test_typed_construction_validates_tuning() {
    let err = PoolFixture::with_tuning(
        SessionMode::Shared,
        PoolTuning::default()
            .with_max_total(Some(2))
            .with_initial_size(3),
    )
    .err()
    .unwrap();
    assert!(matches!(err, PoolError::Configuration(_)));
}
