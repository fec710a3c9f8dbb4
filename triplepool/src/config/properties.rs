// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Property keys and name/value configuration parsing
//!
//! Callers that keep pool settings as loosely typed name/value pairs (a
//! config file, a directory service entry, command line flags) translate them
//! here into the two typed maps consumed by [`ConnectionConfig`] and
//! [`PoolTuning`]. Unknown keys are ignored so newer configuration files keep
//! working with older releases.
//!
//! [`ConnectionConfig`]: crate::config::ConnectionConfig
//! [`PoolTuning`]: crate::config::PoolTuning

use crate::error::{PoolError, Result};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Keys understood by [`ConnectionConfig`](crate::config::ConnectionConfig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionProperty {
    /// Base URL of the server, e.g. `http://localhost:10035`
    ServerUrl,
    Username,
    Password,
    /// Catalog (collection) name; `/` or absent means the root catalog
    Catalog,
    Repository,
    /// One of `SHARED`, `DEDICATED`, `TX`
    Session,
    /// Seconds a dedicated session may stay idle before the server reaps it
    SessionLifetime,
    /// Socket read timeout in milliseconds; zero means no timeout
    HttpSocketTimeout,
}

impl ConnectionProperty {
    pub const ALL: [ConnectionProperty; 8] = [
        ConnectionProperty::ServerUrl,
        ConnectionProperty::Username,
        ConnectionProperty::Password,
        ConnectionProperty::Catalog,
        ConnectionProperty::Repository,
        ConnectionProperty::Session,
        ConnectionProperty::SessionLifetime,
        ConnectionProperty::HttpSocketTimeout,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ConnectionProperty::ServerUrl => "serverUrl",
            ConnectionProperty::Username => "username",
            ConnectionProperty::Password => "password",
            ConnectionProperty::Catalog => "catalog",
            ConnectionProperty::Repository => "repository",
            ConnectionProperty::Session => "session",
            ConnectionProperty::SessionLifetime => "sessionLifetime",
            ConnectionProperty::HttpSocketTimeout => "httpSocketTimeout",
        }
    }
}

impl fmt::Display for ConnectionProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ConnectionProperty {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "collection" => Ok(ConnectionProperty::Catalog),
            _ => ConnectionProperty::ALL
                .iter()
                .copied()
                .find(|p| p.key() == s)
                .ok_or_else(|| {
                    PoolError::Configuration(format!("Unknown connection property: {}", s))
                }),
        }
    }
}

/// Keys understood by [`PoolTuning`](crate::config::PoolTuning)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolProperty {
    InitialSize,
    ShutdownHook,
    MinIdle,
    MaxIdle,
    /// Maximum number of connections (idle plus borrowed)
    MaxActive,
    /// Milliseconds a borrow may block; negative blocks indefinitely
    MaxWait,
    TestOnBorrow,
    TestOnReturn,
    TimeBetweenEvictionRunsMillis,
    MinEvictableIdleTimeMillis,
    TestWhileIdle,
    SoftMinEvictableIdleTimeMillis,
    NumTestsPerEvictionRun,
    Warmup,
    WarmupIncludeStrings,
    WarmupIncludeTriples,
}

impl PoolProperty {
    pub const ALL: [PoolProperty; 16] = [
        PoolProperty::InitialSize,
        PoolProperty::ShutdownHook,
        PoolProperty::MinIdle,
        PoolProperty::MaxIdle,
        PoolProperty::MaxActive,
        PoolProperty::MaxWait,
        PoolProperty::TestOnBorrow,
        PoolProperty::TestOnReturn,
        PoolProperty::TimeBetweenEvictionRunsMillis,
        PoolProperty::MinEvictableIdleTimeMillis,
        PoolProperty::TestWhileIdle,
        PoolProperty::SoftMinEvictableIdleTimeMillis,
        PoolProperty::NumTestsPerEvictionRun,
        PoolProperty::Warmup,
        PoolProperty::WarmupIncludeStrings,
        PoolProperty::WarmupIncludeTriples,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PoolProperty::InitialSize => "initialSize",
            PoolProperty::ShutdownHook => "shutdownHook",
            PoolProperty::MinIdle => "minIdle",
            PoolProperty::MaxIdle => "maxIdle",
            PoolProperty::MaxActive => "maxActive",
            PoolProperty::MaxWait => "maxWait",
            PoolProperty::TestOnBorrow => "testOnBorrow",
            PoolProperty::TestOnReturn => "testOnReturn",
            PoolProperty::TimeBetweenEvictionRunsMillis => "timeBetweenEvictionRunsMillis",
            PoolProperty::MinEvictableIdleTimeMillis => "minEvictableIdleTimeMillis",
            PoolProperty::TestWhileIdle => "testWhileIdle",
            PoolProperty::SoftMinEvictableIdleTimeMillis => "softMinEvictableIdleTimeMillis",
            PoolProperty::NumTestsPerEvictionRun => "numTestsPerEvictionRun",
            PoolProperty::Warmup => "warmup",
            PoolProperty::WarmupIncludeStrings => "warmupIncludeStrings",
            PoolProperty::WarmupIncludeTriples => "warmupIncludeTriples",
        }
    }
}

impl fmt::Display for PoolProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PoolProperty {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        PoolProperty::ALL
            .iter()
            .copied()
            .find(|p| p.key() == s)
            .ok_or_else(|| PoolError::Configuration(format!("Unknown pool property: {}", s)))
    }
}

pub type ConnectionProperties = HashMap<ConnectionProperty, String>;
pub type PoolProperties = HashMap<PoolProperty, String>;

/// Either kind of configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Connection(ConnectionProperty),
    Pool(PoolProperty),
}

impl FromStr for Property {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(p) = s.parse::<ConnectionProperty>() {
            return Ok(Property::Connection(p));
        }
        s.parse::<PoolProperty>()
            .map(Property::Pool)
            .map_err(|_| PoolError::Configuration(format!("Unknown property: {}", s)))
    }
}

/// Both configuration maps, split by key membership
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    pub connection: ConnectionProperties,
    pub pool: PoolProperties,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under its key; unknown keys are skipped
    ///
    /// Returns false if the key was not recognized.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> bool {
        match key.parse::<Property>() {
            Ok(Property::Connection(p)) => {
                self.connection.insert(p, value.into());
                true
            }
            Ok(Property::Pool(p)) => {
                self.pool.insert(p, value.into());
                true
            }
            Err(_) => {
                log::debug!("Ignoring unknown pool configuration key '{}'", key);
                false
            }
        }
    }

    /// Partition an alternating `key, value, key, value, ...` sequence
    pub fn from_key_values<S: AsRef<str>>(key_values: &[S]) -> Result<Self> {
        if key_values.len() % 2 != 0 {
            return Err(PoolError::Configuration(format!(
                "Expected alternating key/value pairs, got {} items",
                key_values.len()
            )));
        }

        let mut set = PropertySet::new();
        for pair in key_values.chunks(2) {
            set.insert(pair[0].as_ref(), pair[1].as_ref());
        }
        Ok(set)
    }

    /// Read a JSON object whose members are configuration keys
    ///
    /// String, number and boolean members are accepted; `null` members are
    /// treated as absent.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or_else(|| {
            PoolError::Configuration("Pool configuration must be a JSON object".to_string())
        })?;

        let mut set = PropertySet::new();
        for (key, value) in object {
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(PoolError::Configuration(format!(
                        "Unsupported value for '{}': {}",
                        key, other
                    )))
                }
            };
            set.insert(key, text);
        }
        Ok(set)
    }
}

pub(crate) fn get_required<K>(props: &HashMap<K, String>, key: K) -> Result<String>
where
    K: Eq + Hash + fmt::Display,
{
    props
        .get(&key)
        .cloned()
        .ok_or_else(|| PoolError::Configuration(format!("Property required: {}", key)))
}

pub(crate) fn get_i64<K>(props: &HashMap<K, String>, key: K) -> Result<Option<i64>>
where
    K: Eq + Hash + fmt::Display,
{
    match props.get(&key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            PoolError::Configuration(format!("Property {} must be an integer, got '{}'", key, raw))
        }),
    }
}

/// Non-negative integer property
pub(crate) fn get_usize<K>(props: &HashMap<K, String>, key: K) -> Result<Option<usize>>
where
    K: Eq + Hash + fmt::Display + Copy,
{
    match get_i64(props, key)? {
        None => Ok(None),
        Some(n) if n < 0 => Err(PoolError::Configuration(format!(
            "Property {} must not be negative, got {}",
            key, n
        ))),
        Some(n) => Ok(Some(n as usize)),
    }
}

/// Lenient boolean: "true" in any case is true, anything else is false
pub(crate) fn get_bool<K>(props: &HashMap<K, String>, key: K) -> Option<bool>
where
    K: Eq + Hash,
{
    props
        .get(&key)
        .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
}
