// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Typed configuration for connections and pools
//!
//! Both structs are validated once, when they are built, so the factory and
//! the pool never look settings up ad hoc.

pub mod connection;
pub mod properties;
pub mod tuning;

pub use connection::ConnectionConfig;
pub use properties::{
    ConnectionProperties, ConnectionProperty, PoolProperties, PoolProperty, Property, PropertySet,
};
pub use tuning::{PoolTuning, WarmupConfig};
