// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Detection of pools abandoned with connections still borrowed
//!
//! A supervising task polls a [`LeakDetector`]; once its deadline has passed
//! and the pool still has borrowed connections, the detector reports a leak
//! and can force the pool closed.

use crate::pool::connection_pool::PoolCore;
use std::sync::Weak;
use std::time::{Duration, Instant};

/// Outcome of one [`LeakDetector::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakStatus {
    /// No connection is borrowed
    Released,
    /// Connections are borrowed but the deadline has not passed
    Pending { active: usize },
    /// Connections are still borrowed after the deadline
    Leaked { active: usize },
    /// The pool was closed or dropped
    Closed,
}

pub struct LeakDetector {
    pool: Weak<PoolCore>,
    deadline: Instant,
}

impl LeakDetector {
    pub(crate) fn new(pool: Weak<PoolCore>, after: Duration) -> Self {
        Self {
            pool,
            deadline: Instant::now() + after,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn poll(&self) -> LeakStatus {
        let Some(core) = self.pool.upgrade() else {
            return LeakStatus::Closed;
        };
        if core.is_closed() {
            return LeakStatus::Closed;
        }

        match core.num_active() {
            0 => LeakStatus::Released,
            active if Instant::now() < self.deadline => LeakStatus::Pending { active },
            active => LeakStatus::Leaked { active },
        }
    }

    /// Close the pool if it is leaking
    ///
    /// # Returns
    /// The status observed before closing
    pub fn close_if_leaked(&self) -> LeakStatus {
        let status = self.poll();
        if let LeakStatus::Leaked { active } = status {
            if let Some(core) = self.pool.upgrade() {
                log::warn!(
                    "Closing connection pool with {} connection(s) borrowed past the deadline",
                    active
                );
                core.close();
            }
        }
        status
    }
}
