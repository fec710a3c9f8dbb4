// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! A live session against one repository
//!
//! `RepositoryConnection` owns the three remote handles of one session (the
//! server transport, the repository and the session-bound client). The pool
//! stores these objects; borrowers reach them through
//! [`PooledConnection`](crate::PooledConnection).

use crate::config::WarmupConfig;
use crate::error::Result;
use crate::transport::{RemoteRepository, RemoteServer, RemoteSession, TransportResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

pub struct RepositoryConnection {
    id: Uuid,
    server: Box<dyn RemoteServer>,
    repository: Box<dyn RemoteRepository>,
    session: Box<dyn RemoteSession>,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    session_closed: bool,
    handles_released: bool,
}

impl RepositoryConnection {
    pub(crate) fn new(
        server: Box<dyn RemoteServer>,
        repository: Box<dyn RemoteRepository>,
        session: Box<dyn RemoteSession>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            server,
            repository,
            session,
            created_at: now,
            last_used: now,
            session_closed: false,
            handles_released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last time the connection was handed to a borrower
    pub fn last_used(&self) -> DateTime<Utc> {
        self.last_used
    }

    pub fn server_url(&self) -> &str {
        self.server.url()
    }

    pub fn repository_name(&self) -> &str {
        self.repository.name()
    }

    /// URL the session currently sends requests to
    pub fn root(&self) -> String {
        self.session.root()
    }

    /// Number of triples in the repository
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.session.size()?)
    }

    pub fn is_auto_commit(&self) -> bool {
        self.session.is_auto_commit()
    }

    /// Switch autocommit. The first call makes the session dedicated.
    pub fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        Ok(self.session.set_auto_commit(enabled)?)
    }

    pub fn is_dedicated(&self) -> bool {
        self.session.is_dedicated()
    }

    pub fn commit(&mut self) -> Result<()> {
        Ok(self.session.commit()?)
    }

    pub fn rollback(&mut self) -> Result<()> {
        Ok(self.session.rollback()?)
    }

    pub fn set_session_lifetime(&mut self, lifetime: Duration) -> Result<()> {
        Ok(self.session.set_session_lifetime(lifetime)?)
    }

    pub fn warmup(&mut self, config: &WarmupConfig) -> Result<()> {
        Ok(self.session.warmup(config)?)
    }

    /// True once the session or its handles have been released
    pub fn is_closed(&self) -> bool {
        self.session_closed || self.handles_released
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Utc::now();
    }

    pub(crate) fn set_rollback_hint(&mut self, enabled: bool) {
        self.session.set_rollback_hint(enabled);
    }

    /// End the server-side session; only the first call reaches the server
    pub(crate) fn close_session(&mut self) -> TransportResult<()> {
        if self.session_closed {
            return Ok(());
        }
        self.session_closed = true;
        self.session.close()
    }

    /// Release the repository and server handles
    ///
    /// Both are attempted; the first failure is returned.
    pub(crate) fn release_handles(&mut self) -> TransportResult<()> {
        if self.handles_released {
            return Ok(());
        }
        self.handles_released = true;
        let repository = self.repository.shutdown();
        let server = self.server.close();
        repository.and(server)
    }

    /// Close an unpooled connection: the session first, then its handles
    pub fn close(mut self) -> Result<()> {
        let session = self.close_session();
        let handles = self.release_handles();
        session?;
        handles?;
        Ok(())
    }
}

impl Drop for RepositoryConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close_session() {
            log::debug!("Session {} close on drop failed: {}", self.id, e);
        }
        if let Err(e) = self.release_handles() {
            log::debug!("Handles of {} not released on drop: {}", self.id, e);
        }
    }
}

impl fmt::Debug for RepositoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConnection")
            .field("id", &self.id)
            .field("root", &self.session.root())
            .field("dedicated", &self.session.is_dedicated())
            .field("auto_commit", &self.session.is_auto_commit())
            .field("created_at", &self.created_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}
