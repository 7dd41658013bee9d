//! `stockdesk-store` — flat-file persistence primitives.
//!
//! Every component store is built on [`RecordFile`], a line-oriented file
//! handle passed in explicitly at construction (no process-wide mutable
//! default path). [`KeyedLocks`] supplies the per-key exclusivity the
//! read-then-write operations require when used concurrently.

pub mod locks;
pub mod record_file;

pub use locks::KeyedLocks;
pub use record_file::{RecordFile, StoreError};
