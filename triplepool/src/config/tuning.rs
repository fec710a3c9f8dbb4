// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Pool sizing, eviction and warm-up settings

use crate::config::properties::{get_bool, get_i64, get_usize, PoolProperties, PoolProperty};
use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INITIAL_SIZE: usize = 0;
pub const DEFAULT_SHUTDOWN_HOOK: bool = false;
pub const DEFAULT_MAX_TOTAL: usize = 8;
pub const DEFAULT_MAX_IDLE: usize = 8;
pub const DEFAULT_MIN_IDLE: usize = 0;
pub const DEFAULT_NUM_TESTS_PER_EVICTION_RUN: usize = 3;
pub const DEFAULT_MIN_EVICTABLE_IDLE: Duration = Duration::from_secs(30 * 60);

/// Which server-side structures to load into memory after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupConfig {
    pub include_strings: bool,
    pub include_triples: bool,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            include_strings: true,
            include_triples: true,
        }
    }
}

impl WarmupConfig {
    pub fn include_strings(mut self, include: bool) -> Self {
        self.include_strings = include;
        self
    }

    pub fn include_triples(mut self, include: bool) -> Self {
        self.include_triples = include;
        self
    }
}

/// Validated pool settings
///
/// `None` in a bounded field means unbounded. Defaults leave every optional
/// behavior (pre-warming, eviction thread, shutdown hook, validation) off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTuning {
    /// Connections opened and returned to the idle set during construction
    pub initial_size: usize,
    /// Close the pool from the shutdown registry at process exit
    pub register_shutdown_hook: bool,
    /// Idle connections the evictor keeps available
    pub min_idle: usize,
    /// Returned connections beyond this many idle ones are destroyed
    pub max_idle: Option<usize>,
    /// Upper bound on idle plus borrowed connections
    pub max_total: Option<usize>,
    /// How long a borrow may block; `None` blocks until a connection frees up
    pub max_wait: Option<Duration>,
    pub test_on_borrow: bool,
    pub test_on_return: bool,
    pub test_while_idle: bool,
    /// Period of the eviction thread; `None` disables it
    pub eviction_interval: Option<Duration>,
    /// Idle connections older than this are always evicted
    pub min_evictable_idle: Option<Duration>,
    /// Idle connections older than this are evicted while more than `min_idle` remain
    pub soft_min_evictable_idle: Option<Duration>,
    pub num_tests_per_eviction_run: usize,
    /// Warm-up run once when the pool is created
    pub warmup: Option<WarmupConfig>,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            register_shutdown_hook: DEFAULT_SHUTDOWN_HOOK,
            min_idle: DEFAULT_MIN_IDLE,
            max_idle: Some(DEFAULT_MAX_IDLE),
            max_total: Some(DEFAULT_MAX_TOTAL),
            max_wait: None,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            eviction_interval: None,
            min_evictable_idle: Some(DEFAULT_MIN_EVICTABLE_IDLE),
            soft_min_evictable_idle: None,
            num_tests_per_eviction_run: DEFAULT_NUM_TESTS_PER_EVICTION_RUN,
            warmup: None,
        }
    }
}

impl PoolTuning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a pool property map; absent keys keep their defaults
    pub fn from_properties(props: &PoolProperties) -> Result<Self> {
        let mut tuning = Self::default();

        if let Some(n) = get_usize(props, PoolProperty::InitialSize)? {
            tuning.initial_size = n;
        }
        if let Some(b) = get_bool(props, PoolProperty::ShutdownHook) {
            tuning.register_shutdown_hook = b;
        }
        if let Some(n) = get_i64(props, PoolProperty::MaxIdle)? {
            tuning.max_idle = bound(n);
        }
        if let Some(n) = get_usize(props, PoolProperty::MinIdle)? {
            tuning.min_idle = n;
        }
        if let Some(n) = get_i64(props, PoolProperty::MaxActive)? {
            tuning.max_total = bound(n);
        }
        if let Some(ms) = get_i64(props, PoolProperty::MaxWait)? {
            tuning.max_wait = millis(ms);
        }
        if let Some(b) = get_bool(props, PoolProperty::TestOnBorrow) {
            tuning.test_on_borrow = b;
        }
        if let Some(b) = get_bool(props, PoolProperty::TestOnReturn) {
            tuning.test_on_return = b;
        }
        if let Some(ms) = get_i64(props, PoolProperty::TimeBetweenEvictionRunsMillis)? {
            tuning.eviction_interval = millis(ms).filter(|d| !d.is_zero());
        }
        if let Some(ms) = get_i64(props, PoolProperty::MinEvictableIdleTimeMillis)? {
            tuning.min_evictable_idle = millis(ms);
        }
        if let Some(b) = get_bool(props, PoolProperty::TestWhileIdle) {
            tuning.test_while_idle = b;
        }
        if let Some(ms) = get_i64(props, PoolProperty::SoftMinEvictableIdleTimeMillis)? {
            tuning.soft_min_evictable_idle = millis(ms);
        }
        if let Some(n) = get_usize(props, PoolProperty::NumTestsPerEvictionRun)? {
            tuning.num_tests_per_eviction_run = n;
        }

        if get_bool(props, PoolProperty::Warmup).unwrap_or(false) {
            tuning.warmup = Some(
                WarmupConfig::default()
                    .include_strings(
                        get_bool(props, PoolProperty::WarmupIncludeStrings).unwrap_or(true),
                    )
                    .include_triples(
                        get_bool(props, PoolProperty::WarmupIncludeTriples).unwrap_or(true),
                    ),
            );
        }

        tuning.validate()?;
        Ok(tuning)
    }

    pub fn with_initial_size(mut self, n: usize) -> Self {
        self.initial_size = n;
        self
    }

    pub fn with_shutdown_hook(mut self, enabled: bool) -> Self {
        self.register_shutdown_hook = enabled;
        self
    }

    pub fn with_min_idle(mut self, n: usize) -> Self {
        self.min_idle = n;
        self
    }

    pub fn with_max_idle(mut self, n: Option<usize>) -> Self {
        self.max_idle = n;
        self
    }

    pub fn with_max_total(mut self, n: Option<usize>) -> Self {
        self.max_total = n;
        self
    }

    pub fn with_max_wait(mut self, wait: Option<Duration>) -> Self {
        self.max_wait = wait;
        self
    }

    pub fn with_test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn with_test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    pub fn with_test_while_idle(mut self, enabled: bool) -> Self {
        self.test_while_idle = enabled;
        self
    }

    pub fn with_eviction_interval(mut self, interval: Option<Duration>) -> Self {
        self.eviction_interval = interval;
        self
    }

    pub fn with_min_evictable_idle(mut self, idle: Option<Duration>) -> Self {
        self.min_evictable_idle = idle;
        self
    }

    pub fn with_soft_min_evictable_idle(mut self, idle: Option<Duration>) -> Self {
        self.soft_min_evictable_idle = idle;
        self
    }

    pub fn with_num_tests_per_eviction_run(mut self, n: usize) -> Self {
        self.num_tests_per_eviction_run = n;
        self
    }

    pub fn with_warmup(mut self, warmup: Option<WarmupConfig>) -> Self {
        self.warmup = warmup;
        self
    }

    /// Reject combinations the pool cannot honor
    pub fn validate(&self) -> Result<()> {
        if let Some(max_idle) = self.max_idle {
            if self.min_idle > max_idle {
                return Err(PoolError::Configuration(format!(
                    "minIdle ({}) must not exceed maxIdle ({})",
                    self.min_idle, max_idle
                )));
            }
        }
        if let Some(max_total) = self.max_total {
            if max_total == 0 {
                return Err(PoolError::Configuration(
                    "maxActive must be at least 1".to_string(),
                ));
            }
            if self.initial_size > max_total {
                return Err(PoolError::Configuration(format!(
                    "initialSize ({}) must not exceed maxActive ({})",
                    self.initial_size, max_total
                )));
            }
        }
        if self.num_tests_per_eviction_run == 0 {
            return Err(PoolError::Configuration(
                "numTestsPerEvictionRun must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Negative sizes mean "no limit"
fn bound(n: i64) -> Option<usize> {
    if n < 0 {
        None
    } else {
        Some(n as usize)
    }
}

/// Negative durations mean "not set"
fn millis(ms: i64) -> Option<Duration> {
    if ms < 0 {
        None
    } else {
        Some(Duration::from_millis(ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_optional_behavior() {
        let tuning = PoolTuning::from_properties(&PoolProperties::new()).unwrap();
        assert_eq!(tuning, PoolTuning::default());
        assert_eq!(tuning.initial_size, 0);
        assert!(!tuning.register_shutdown_hook);
        assert_eq!(tuning.eviction_interval, None);
        assert_eq!(tuning.max_wait, None);
        assert_eq!(tuning.warmup, None);
    }

    #[test]
    fn test_parse_all_numeric_properties() {
        let mut props = PoolProperties::new();
        props.insert(PoolProperty::InitialSize, "2".to_string());
        props.insert(PoolProperty::MinIdle, "1".to_string());
        props.insert(PoolProperty::MaxIdle, "5".to_string());
        props.insert(PoolProperty::MaxActive, "6".to_string());
        props.insert(PoolProperty::MaxWait, "250".to_string());
        props.insert(PoolProperty::TimeBetweenEvictionRunsMillis, "1000".to_string());
        props.insert(PoolProperty::MinEvictableIdleTimeMillis, "5000".to_string());
        props.insert(PoolProperty::SoftMinEvictableIdleTimeMillis, "2000".to_string());
        props.insert(PoolProperty::NumTestsPerEvictionRun, "4".to_string());

        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(tuning.initial_size, 2);
        assert_eq!(tuning.min_idle, 1);
        assert_eq!(tuning.max_idle, Some(5));
        assert_eq!(tuning.max_total, Some(6));
        assert_eq!(tuning.max_wait, Some(Duration::from_millis(250)));
        assert_eq!(tuning.eviction_interval, Some(Duration::from_secs(1)));
        assert_eq!(tuning.min_evictable_idle, Some(Duration::from_secs(5)));
        assert_eq!(tuning.soft_min_evictable_idle, Some(Duration::from_secs(2)));
        assert_eq!(tuning.num_tests_per_eviction_run, 4);
    }

    #[test]
    fn test_negative_limits_mean_unbounded() {
        let mut props = PoolProperties::new();
        props.insert(PoolProperty::MaxActive, "-1".to_string());
        props.insert(PoolProperty::MaxIdle, "-1".to_string());
        props.insert(PoolProperty::MaxWait, "-1".to_string());

        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(tuning.max_total, None);
        assert_eq!(tuning.max_idle, None);
        assert_eq!(tuning.max_wait, None);
    }

    #[test]
    fn test_zero_max_wait_is_kept() {
        let mut props = PoolProperties::new();
        props.insert(PoolProperty::MaxWait, "0".to_string());
        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(tuning.max_wait, Some(Duration::ZERO));
    }

    #[test]
    fn test_warmup_includes_default_to_true() {
        let mut props = PoolProperties::new();
        props.insert(PoolProperty::Warmup, "true".to_string());
        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(tuning.warmup, Some(WarmupConfig::default()));

        props.insert(PoolProperty::WarmupIncludeStrings, "false".to_string());
        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(
            tuning.warmup,
            Some(WarmupConfig {
                include_strings: false,
                include_triples: true
            })
        );
    }

    #[test]
    fn test_warmup_includes_ignored_without_warmup() {
        let mut props = PoolProperties::new();
        props.insert(PoolProperty::WarmupIncludeTriples, "true".to_string());
        let tuning = PoolTuning::from_properties(&props).unwrap();
        assert_eq!(tuning.warmup, None);
    }

    #[test]
    fn test_validation() {
        assert!(PoolTuning::new().with_min_idle(9).validate().is_err());
        assert!(PoolTuning::new()
            .with_max_total(Some(2))
            .with_initial_size(3)
            .validate()
            .is_err());
        assert!(PoolTuning::new().with_max_total(Some(0)).validate().is_err());
        assert!(PoolTuning::new()
            .with_num_tests_per_eviction_run(0)
            .validate()
            .is_err());
        assert!(PoolTuning::new()
            .with_max_total(None)
            .with_max_idle(None)
            .with_min_idle(50)
            .with_initial_size(50)
            .validate()
            .is_ok());
    }
}
