// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Background eviction thread
//!
//! The evictor wakes every `eviction_interval` and runs
//! [`GenericPool::evict`]. It only holds a `Weak` reference, so it never keeps
//! a pool alive; it exits when the pool is dropped or closed.

use crate::error::{PoolError, Result};
use crate::pool::generic::{GenericPool, ObjectFactory};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const THREAD_NAME: &str = "triplepool-evictor";

/// Stop flag the evictor sleeps on between runs
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    /// Sleep for `interval` or until stopped; returns true if stopped
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

pub(crate) struct Evictor {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    pub(crate) fn start<F>(pool: Weak<GenericPool<F>>, interval: Duration) -> Result<Self>
    where
        F: ObjectFactory + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = signal.clone();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(pool, thread_signal, interval))
            .map_err(|e| PoolError::Configuration(format!("cannot start evictor: {}", e)))?;

        log::debug!("Started evictor running every {:?}", interval);
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to finish its current run
    ///
    /// When called from the evictor thread itself (the pool was dropped
    /// there) the thread is only signalled.
    pub(crate) fn stop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::warn!("Evictor thread panicked");
            }
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<F: ObjectFactory>(pool: Weak<GenericPool<F>>, signal: Arc<StopSignal>, interval: Duration) {
    while !signal.wait(interval) {
        let Some(pool) = pool.upgrade() else {
            break;
        };
        if pool.is_closed() {
            break;
        }
        if let Err(e) = pool.evict() {
            log::warn!("Eviction run failed: {}", e);
        }
    }
    log::debug!("Evictor stopped");
}
