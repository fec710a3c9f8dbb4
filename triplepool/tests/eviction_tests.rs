/// Integration tests for idle connection eviction
///
/// These tests verify that:
/// 1. The evictor thread destroys connections idle past their limit
/// 2. Idle validation removes sessions the server no longer accepts
/// 3. The idle set is topped back up to min_idle
/// 4. Sessions the server already reaped are torn down without errors
mod testutils;

use std::thread;
use std::time::{Duration, Instant};
use testutils::PoolFixture;
use triplepool::{PoolTuning, SessionMode};

fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

fn evicting(tuning: PoolTuning) -> PoolTuning {
    tuning.with_eviction_interval(Some(Duration::from_millis(20)))
}

#[test]
fn test_evictor_destroys_long_idle_connections() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Shared,
        evicting(PoolTuning::default().with_min_evictable_idle(Some(Duration::from_millis(10)))),
    )
    .unwrap();
    fixture.pool.add_idle().unwrap();
    fixture.pool.add_idle().unwrap();

    eventually("idle connections to be evicted", || {
        fixture.pool.num_idle() == 0
    });
    assert_eq!(fixture.server.open_sessions(), 0);
    assert_eq!(fixture.pool.stats().under_test, 0);
}

#[test]
fn test_evictor_never_touches_borrowed_connections() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Shared,
        evicting(PoolTuning::default().with_min_evictable_idle(Some(Duration::from_millis(10)))),
    )
    .unwrap();
    let mut conn = fixture.pool.borrow().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(conn.size().unwrap(), 0);
    assert_eq!(fixture.server.open_sessions(), 1);
    conn.close().unwrap();
}

#[test]
fn test_idle_validation_removes_invalid_sessions() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Shared,
        evicting(
            PoolTuning::default()
                .with_min_evictable_idle(None)
                .with_test_while_idle(true),
        ),
    )
    .unwrap();
    fixture.pool.add_idle().unwrap();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(fixture.pool.num_idle(), 1);

    fixture.server.fail_requests(true);
    eventually("invalid session to be evicted", || {
        fixture.pool.num_idle() == 0
    });
    assert_eq!(fixture.server.open_sessions(), 0);
}

#[test]
fn test_evictor_tops_up_min_idle() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Shared,
        evicting(PoolTuning::default().with_min_idle(2)),
    )
    .unwrap();

    eventually("idle set to reach min_idle", || fixture.pool.num_idle() == 2);
    assert_eq!(fixture.server.stats().sessions_opened, 2);
}

#[test]
fn test_evictor_stops_with_pool() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Shared,
        evicting(PoolTuning::default().with_min_idle(1)),
    )
    .unwrap();
    eventually("idle set to reach min_idle", || fixture.pool.num_idle() == 1);

    fixture.pool.close();
    thread::sleep(Duration::from_millis(60));

    assert_eq!(fixture.pool.num_idle(), 0);
    assert_eq!(fixture.server.open_sessions(), 0);
    assert_eq!(fixture.server.stats().sessions_opened, 1);
}

#[test]
fn test_expired_session_destroyed_quietly() {
    let fixture = PoolFixture::new(SessionMode::Dedicated).unwrap();
    fixture.pool.borrow().unwrap().close().unwrap();

    fixture.server.expire_sessions();
    assert_eq!(fixture.pool.clear(), 1);

    let stats = fixture.server.stats();
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.repositories_shut_down, 1);
    assert_eq!(stats.servers_closed, 1);
}

#[test]
fn test_invalidate_expired_session_succeeds() {
    let fixture = PoolFixture::new(SessionMode::Transactional).unwrap();
    let conn = fixture.pool.borrow().unwrap();

    fixture.server.expire_sessions();
    conn.invalidate().unwrap();
    assert_eq!(fixture.server.stats().servers_closed, 1);
}

#[test]
fn test_expired_session_replaced_on_borrow() {
    let fixture = PoolFixture::with_tuning(
        SessionMode::Dedicated,
        PoolTuning::default().with_test_on_borrow(true),
    )
    .unwrap();
    let mut conn = fixture.pool.borrow().unwrap();
    let expired_id = conn.id();
    conn.close().unwrap();

    fixture.server.expire_sessions();
    let mut conn = fixture.pool.borrow().unwrap();

    assert_ne!(conn.id(), expired_id);
    assert_eq!(conn.size().unwrap(), 0);
    assert_eq!(fixture.server.stats().sessions_opened, 2);
}
