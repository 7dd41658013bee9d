//! `stockdesk-audit` — append-only audit trail.

pub mod sink;

pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};
