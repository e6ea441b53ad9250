//! Storage backends for scoped configuration snapshots
//!
//! The resolution engine talks to persistence only through the
//! [`ConfigStorage`] trait. Two backends are provided:
//!
//! - [`MemoryStorage`]: a map behind a lock, for tests and embedded use.
//! - [`FileStorage`]: one file per snapshot in JSON, TOML or YAML, written
//!   atomically under an advisory lock.
//!
//! Both enforce the optimistic versioning contract: `save` refuses to
//! overwrite an existing snapshot and `update` refuses a version that is not
//! newer than the stored one.

pub mod error;
pub mod file;
pub mod format;
pub mod memory;
pub mod storage;

pub use error::{Error, Result};
pub use file::FileStorage;
pub use format::StorageFormat;
pub use memory::MemoryStorage;
pub use storage::ConfigStorage;
