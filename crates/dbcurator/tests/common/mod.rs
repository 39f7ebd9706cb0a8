//! Shared test utilities for dbcurator integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with temp folders and an in-memory store
//! - `FakeFetcher` standing in for HTTP and FTP servers
//! - Builders for curations and test-only steps

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
