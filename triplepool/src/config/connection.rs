// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Parameters needed to open one session against the remote service

use crate::config::properties::{get_i64, get_required, ConnectionProperties, ConnectionProperty};
use crate::error::{PoolError, Result};
use crate::session::SessionMode;
use std::fmt;
use std::time::Duration;

/// Validated settings for opening a repository session
///
/// Built either directly with [`ConnectionConfig::new`] and the `with_*`
/// methods, or from a name/value map with
/// [`ConnectionConfig::from_properties`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base URL of the server
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Catalog holding the repository; `None` or `/` selects the root catalog
    pub catalog: Option<String>,
    pub repository: String,
    /// Contract enforced on every borrow
    pub session_mode: SessionMode,
    /// Idle lifetime requested for dedicated sessions
    pub session_lifetime: Option<Duration>,
    /// Socket read timeout for every request; zero means no timeout
    pub socket_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Create a config with the required fields and defaults for the rest
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        repository: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
            catalog: None,
            repository: repository.into(),
            session_mode: SessionMode::default(),
            session_lifetime: None,
            socket_timeout: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a connection property map
    ///
    /// `serverUrl`, `username`, `password` and `repository` are required.
    pub fn from_properties(props: &ConnectionProperties) -> Result<Self> {
        let session_mode = match props.get(&ConnectionProperty::Session) {
            Some(raw) => raw.parse::<SessionMode>()?,
            None => SessionMode::default(),
        };

        let config = Self {
            server_url: get_required(props, ConnectionProperty::ServerUrl)?,
            username: get_required(props, ConnectionProperty::Username)?,
            password: get_required(props, ConnectionProperty::Password)?,
            catalog: props.get(&ConnectionProperty::Catalog).cloned(),
            repository: get_required(props, ConnectionProperty::Repository)?,
            session_mode,
            session_lifetime: non_negative(props, ConnectionProperty::SessionLifetime)?
                .map(Duration::from_secs),
            socket_timeout: non_negative(props, ConnectionProperty::HttpSocketTimeout)?
                .map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = Some(lifetime);
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    /// Catalog to open, with the root catalog normalized to `None`
    pub fn catalog_name(&self) -> Option<&str> {
        self.catalog
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "/")
    }

    /// Check the fields a session cannot be opened without
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(PoolError::Configuration(
                "Property required: serverUrl".to_string(),
            ));
        }
        if self.repository.trim().is_empty() {
            return Err(PoolError::Configuration(
                "Property required: repository".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_negative(props: &ConnectionProperties, key: ConnectionProperty) -> Result<Option<u64>> {
    match get_i64(props, key)? {
        Some(n) if n < 0 => Err(PoolError::Configuration(format!(
            "Property {} must not be negative, got {}",
            key, n
        ))),
        other => Ok(other.map(|n| n as u64)),
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("catalog", &self.catalog)
            .field("repository", &self.repository)
            .field("session_mode", &self.session_mode)
            .field("session_lifetime", &self.session_lifetime)
            .field("socket_timeout", &self.socket_timeout)
            .finish()
    }
}
