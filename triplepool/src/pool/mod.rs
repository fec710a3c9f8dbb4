// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Connection pooling
//!
//! - `generic`: blocking object pool driven by an `ObjectFactory`
//! - `evictor`: background thread probing and trimming idle objects
//! - `connection_pool`: the repository connection pool and its borrowed handle
//! - `leak`: detection of pools abandoned with connections borrowed

pub mod connection_pool;
mod evictor;
pub mod generic;
pub mod leak;

pub use connection_pool::{ConnectionPool, PooledConnection};
pub use generic::{GenericPool, ObjectFactory, PoolStats};
pub use leak::{LeakDetector, LeakStatus};
