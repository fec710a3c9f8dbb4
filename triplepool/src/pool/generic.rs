// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Generic blocking object pool
//!
//! `GenericPool` lends objects made by an [`ObjectFactory`] and takes them
//! back. Idle objects wait in a deque (most recently returned reused first)
//! under a `parking_lot::Mutex`; borrowers that find neither an idle object
//! nor spare capacity block on a `Condvar` until one is released or
//! `max_wait` runs out.
//!
//! Objects are counted in three places: lent out or being created
//! (`active`), waiting in the deque (`idle`), and taken out of the deque by
//! the evictor or a drain (`under_test`). Their sum never exceeds `max_total`.

use crate::config::PoolTuning;
use crate::error::{PoolError, Result};
use crate::pool::evictor::Evictor;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle callbacks the pool drives for its objects
///
/// # Lifecycle
///
/// `create` -> (`activate` -> lent -> `passivate` -> idle)* -> `destroy`
///
/// `validate` may be called while an object is lent or idle, depending on the
/// `test_*` settings of the pool.
pub trait ObjectFactory: Send + Sync {
    type Object: Send;

    /// Make a new object
    fn create(&self) -> Result<Self::Object>;

    /// Prepare an object for hand-off to a borrower
    fn activate(&self, object: &mut Self::Object) -> Result<()>;

    /// Prepare a returned object for the idle set
    fn passivate(&self, _object: &mut Self::Object) -> Result<()> {
        Ok(())
    }

    /// Check an object is still usable
    fn validate(&self, object: &mut Self::Object) -> bool;

    /// Release an object for good
    fn destroy(&self, object: Self::Object) -> Result<()>;
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Lent out or being created
    pub active: usize,
    pub idle: usize,
    /// Taken out of the idle set by the evictor or a drain
    pub under_test: usize,
    /// Threads blocked in `borrow`
    pub waiting: usize,
    pub max_total: Option<usize>,
    pub min_idle: usize,
    pub max_idle: Option<usize>,
    pub created: u64,
    pub destroyed: u64,
    pub borrowed: u64,
    pub returned: u64,
}

struct IdleObject<T> {
    object: T,
    idle_since: Instant,
}

struct PoolState<T> {
    /// Oldest at the front, most recently returned at the back
    idle: VecDeque<IdleObject<T>>,
    active: usize,
    under_test: usize,
    waiting: usize,
    min_idle: usize,
    max_idle: Option<usize>,
    closed: bool,
}

impl<T> PoolState<T> {
    fn total(&self) -> usize {
        self.active + self.idle.len() + self.under_test
    }
}

enum Candidate<T> {
    Idle(T),
    Create,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    borrowed: AtomicU64,
    returned: AtomicU64,
}

/// Blocking pool of objects made by `F`
pub struct GenericPool<F: ObjectFactory> {
    factory: F,
    tuning: PoolTuning,
    state: Mutex<PoolState<F::Object>>,
    available: Condvar,
    counters: Counters,
    evictor: Mutex<Option<Evictor>>,
}

impl<F: ObjectFactory> GenericPool<F> {
    pub fn new(factory: F, tuning: PoolTuning) -> Self {
        let state = PoolState {
            idle: VecDeque::new(),
            active: 0,
            under_test: 0,
            waiting: 0,
            min_idle: tuning.min_idle,
            max_idle: tuning.max_idle,
            closed: false,
        };
        Self {
            factory,
            tuning,
            state: Mutex::new(state),
            available: Condvar::new(),
            counters: Counters::default(),
            evictor: Mutex::new(None),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn tuning(&self) -> &PoolTuning {
        &self.tuning
    }

    fn has_capacity(&self, state: &PoolState<F::Object>) -> bool {
        self.tuning
            .max_total
            .is_none_or(|max| state.total() < max)
    }

    /// Borrow an activated object
    ///
    /// Reuses the most recently returned idle object, creates one if there is
    /// spare capacity, or blocks until `max_wait` for one to be released.
    /// Idle objects that fail activation or validation are destroyed and the
    /// borrow retries; a fresh object that fails is reported to the caller.
    ///
    /// # Returns
    /// * `Err(PoolError::Exhausted)` - if nothing became available in time
    /// * `Err(PoolError::Closed)` - if the pool is closed
    pub fn borrow(&self) -> Result<F::Object> {
        let start = Instant::now();
        let deadline = self.tuning.max_wait.map(|wait| start + wait);

        loop {
            let candidate = {
                let mut state = self.state.lock();
                loop {
                    if state.closed {
                        return Err(PoolError::Closed);
                    }
                    if let Some(idle) = state.idle.pop_back() {
                        state.active += 1;
                        break Candidate::Idle(idle.object);
                    }
                    if self.has_capacity(&state) {
                        state.active += 1;
                        break Candidate::Create;
                    }

                    state.waiting += 1;
                    match deadline {
                        None => self.available.wait(&mut state),
                        Some(deadline) if Instant::now() < deadline => {
                            self.available.wait_until(&mut state, deadline);
                        }
                        Some(_) => {
                            state.waiting -= 1;
                            return Err(PoolError::Exhausted {
                                waited: start.elapsed(),
                            });
                        }
                    }
                    state.waiting -= 1;
                }
            };

            match candidate {
                Candidate::Idle(mut object) => match self.prepare(&mut object) {
                    Ok(()) => {
                        self.counters.borrowed.fetch_add(1, Ordering::Relaxed);
                        return Ok(object);
                    }
                    Err(e) => {
                        log::debug!("Discarding idle object that failed activation: {}", e);
                        self.discard(object);
                    }
                },
                Candidate::Create => {
                    let mut object = match self.factory.create() {
                        Ok(object) => object,
                        Err(e) => {
                            self.release_slot();
                            return Err(e);
                        }
                    };
                    self.counters.created.fetch_add(1, Ordering::Relaxed);

                    if let Err(e) = self.prepare(&mut object) {
                        self.discard(object);
                        return Err(e);
                    }
                    self.counters.borrowed.fetch_add(1, Ordering::Relaxed);
                    return Ok(object);
                }
            }
        }
    }

    fn prepare(&self, object: &mut F::Object) -> Result<()> {
        self.factory.activate(object)?;
        if self.tuning.test_on_borrow && !self.factory.validate(object) {
            return Err(PoolError::Connection(
                "validation failed on borrow".to_string(),
            ));
        }
        Ok(())
    }

    /// Give a borrowed object back
    ///
    /// The object is destroyed instead of kept idle if it fails
    /// `test_on_return` validation or passivation, if the idle set is full,
    /// or if the pool is closed.
    pub fn return_object(&self, mut object: F::Object) -> Result<()> {
        self.counters.returned.fetch_add(1, Ordering::Relaxed);

        if self.tuning.test_on_return && !self.factory.validate(&mut object) {
            log::debug!("Destroying object that failed validation on return");
            return self.destroy_active(object);
        }
        if let Err(e) = self.factory.passivate(&mut object) {
            log::debug!("Destroying object that failed passivation: {}", e);
            return self.destroy_active(object);
        }

        let mut state = self.state.lock();
        let full = state
            .max_idle
            .is_some_and(|max| state.idle.len() >= max);
        if state.closed || full {
            drop(state);
            return self.destroy_active(object);
        }

        state.active -= 1;
        state.idle.push_back(IdleObject {
            object,
            idle_since: Instant::now(),
        });
        self.available.notify_one();
        Ok(())
    }

    /// Destroy a borrowed object instead of returning it
    pub fn invalidate(&self, object: F::Object) -> Result<()> {
        self.destroy_active(object)
    }

    /// Destroy an object counted as active, then free its slot
    fn destroy_active(&self, object: F::Object) -> Result<()> {
        let result = self.factory.destroy(object);
        self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        self.release_slot();
        result
    }

    /// Destroy an active object whose failure is already being handled
    fn discard(&self, object: F::Object) {
        if let Err(e) = self.destroy_active(object) {
            log::warn!("Failed to destroy discarded object: {}", e);
        }
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        self.available.notify_one();
    }

    /// Create one object straight into the idle set
    ///
    /// # Returns
    /// * `Ok(false)` - if the pool is at `max_total` or the idle set is full
    pub fn add_object(&self) -> Result<bool> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            let full = state
                .max_idle
                .is_some_and(|max| state.idle.len() >= max);
            if full || !self.has_capacity(&state) {
                return Ok(false);
            }
            state.active += 1;
        }

        let mut object = match self.factory.create() {
            Ok(object) => object,
            Err(e) => {
                self.release_slot();
                return Err(e);
            }
        };
        self.counters.created.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.factory.passivate(&mut object) {
            self.discard(object);
            return Err(e);
        }

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            self.destroy_active(object)?;
            return Ok(false);
        }
        state.active -= 1;
        state.idle.push_back(IdleObject {
            object,
            idle_since: Instant::now(),
        });
        self.available.notify_one();
        Ok(true)
    }

    /// Destroy every idle object
    ///
    /// # Returns
    /// Number of objects destroyed
    pub fn clear(&self) -> usize {
        let drained = self.drain_idle();
        let count = drained.len();
        self.destroy_drained(drained);
        count
    }

    /// Close the pool
    ///
    /// Idle objects are destroyed now; lent objects are destroyed when they
    /// come back. Blocked borrowers wake up with `PoolError::Closed`.
    ///
    /// # Returns
    /// `true` if this call closed the pool, `false` if it was already closed
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            self.available.notify_all();
        }

        if let Some(mut evictor) = self.evictor.lock().take() {
            evictor.stop();
        }

        let drained = self.drain_idle();
        self.destroy_drained(drained);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn drain_idle(&self) -> Vec<F::Object> {
        let mut state = self.state.lock();
        let drained: Vec<F::Object> = state.idle.drain(..).map(|idle| idle.object).collect();
        state.under_test += drained.len();
        drained
    }

    fn destroy_drained(&self, drained: Vec<F::Object>) {
        let count = drained.len();
        for object in drained {
            if let Err(e) = self.factory.destroy(object) {
                log::warn!("Failed to destroy idle object: {}", e);
            }
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        }
        let mut state = self.state.lock();
        state.under_test -= count;
        self.available.notify_all();
    }

    /// Run one eviction pass over the oldest idle objects, then top the idle
    /// set back up to `min_idle`
    ///
    /// Objects idle longer than `min_evictable_idle` are destroyed, as are
    /// objects idle longer than `soft_min_evictable_idle` while more than
    /// `min_idle` objects are idle. With `test_while_idle`, the remaining
    /// examined objects are activated and validated and destroyed on failure.
    pub fn evict(&self) -> Result<()> {
        let (batch, min_idle) = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            let n = self
                .tuning
                .num_tests_per_eviction_run
                .min(state.idle.len());
            let batch: Vec<IdleObject<F::Object>> = state.idle.drain(..n).collect();
            state.under_test += batch.len();
            (batch, state.min_idle)
        };

        let examined = batch.len();
        let mut idle_count = examined + self.num_idle();
        let mut kept = Vec::with_capacity(examined);

        for mut idle in batch {
            let idle_for = idle.idle_since.elapsed();
            let hard = self
                .tuning
                .min_evictable_idle
                .is_some_and(|limit| idle_for > limit);
            let soft = self
                .tuning
                .soft_min_evictable_idle
                .is_some_and(|limit| idle_for > limit && idle_count > min_idle);

            let evict = if hard || soft {
                true
            } else if self.tuning.test_while_idle {
                !self.passes_idle_test(&mut idle.object)
            } else {
                false
            };

            if evict {
                log::debug!("Evicting object idle for {:?}", idle_for);
                if let Err(e) = self.factory.destroy(idle.object) {
                    log::warn!("Failed to destroy evicted object: {}", e);
                }
                self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
                idle_count -= 1;
            } else {
                kept.push(idle);
            }
        }

        let mut closed_leftovers = Vec::new();
        {
            let mut state = self.state.lock();
            state.under_test -= examined;
            if state.closed {
                closed_leftovers = kept.into_iter().map(|idle| idle.object).collect();
                state.under_test += closed_leftovers.len();
            } else {
                for idle in kept.into_iter().rev() {
                    state.idle.push_front(idle);
                }
            }
            self.available.notify_all();
        }
        if !closed_leftovers.is_empty() {
            self.destroy_drained(closed_leftovers);
            return Ok(());
        }

        self.ensure_min_idle().map(|_| ())
    }

    fn passes_idle_test(&self, object: &mut F::Object) -> bool {
        if let Err(e) = self.factory.activate(object) {
            log::debug!("Idle object failed activation: {}", e);
            return false;
        }
        let valid = self.factory.validate(object);
        if valid {
            if let Err(e) = self.factory.passivate(object) {
                log::debug!("Idle object failed passivation: {}", e);
                return false;
            }
        }
        valid
    }

    /// Create idle objects until `min_idle` are idle or capacity runs out
    ///
    /// # Returns
    /// Number of objects added
    pub fn ensure_min_idle(&self) -> Result<usize> {
        let mut added = 0;
        loop {
            {
                let state = self.state.lock();
                if state.closed || state.idle.len() >= state.min_idle {
                    return Ok(added);
                }
            }
            if !self.add_object()? {
                return Ok(added);
            }
            added += 1;
        }
    }

    pub fn set_min_idle(&self, min_idle: usize) {
        self.state.lock().min_idle = min_idle;
    }

    pub fn set_max_idle(&self, max_idle: Option<usize>) {
        self.state.lock().max_idle = max_idle;
    }

    pub fn min_idle(&self) -> usize {
        self.state.lock().min_idle
    }

    pub fn max_idle(&self) -> Option<usize> {
        self.state.lock().max_idle
    }

    pub fn num_active(&self) -> usize {
        self.state.lock().active
    }

    pub fn num_idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            active: state.active,
            idle: state.idle.len(),
            under_test: state.under_test,
            waiting: state.waiting,
            max_total: self.tuning.max_total,
            min_idle: state.min_idle,
            max_idle: state.max_idle,
            created: self.counters.created.load(Ordering::Relaxed),
            destroyed: self.counters.destroyed.load(Ordering::Relaxed),
            borrowed: self.counters.borrowed.load(Ordering::Relaxed),
            returned: self.counters.returned.load(Ordering::Relaxed),
        }
    }
}

impl<F: ObjectFactory + 'static> GenericPool<F> {
    /// Start the background evictor if an eviction interval is configured
    pub fn start_evictor(self: &Arc<Self>) -> Result<()> {
        let interval: Duration = match self.tuning.eviction_interval {
            Some(interval) => interval,
            None => return Ok(()),
        };
        let mut slot = self.evictor.lock();
        if slot.is_none() {
            *slot = Some(Evictor::start(Arc::downgrade(self), interval)?);
        }
        Ok(())
    }
}

impl<F: ObjectFactory> Drop for GenericPool<F> {
    fn drop(&mut self) {
        self.close();
    }
}
