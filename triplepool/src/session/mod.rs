// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Repository sessions and the modes the pool enforces on them

pub mod connection;
pub mod mode;

pub use connection::RepositoryConnection;
pub use mode::SessionMode;
