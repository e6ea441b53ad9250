//! Shared test utilities for the scoped-config workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not
//! each rebuild the same schemas and snapshots. It is a dev-dependency only
//! and never published.
//!
//! # Modules
//!
//! - [`fixtures`]: scope paths, the sample `App` schemas and snapshot builders
//! - [`storage`]: [`CountingStorage`](storage::CountingStorage) and
//!   [`TempStore`](storage::TempStore) backends for assertions on I/O

pub mod fixtures;
pub mod storage;

pub use fixtures::{app_schemas, key, path, snapshot};
pub use storage::{CountingStorage, TempStore};
