//! Test utilities for TriplePool integration tests
//!
//! - PoolFixture: an in-process server plus a pool bound to it, with its own
//!   shutdown registry so tests never touch the process-wide one

pub mod pool_fixture;

pub use pool_fixture::*;
