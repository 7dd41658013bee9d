//! Audit sink contract and implementations.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::warn;

use stockdesk_store::RecordFile;

/// Append-only event recorder.
///
/// Fire-and-forget: `record` never raises to the caller. An audit
/// failure must not fail the mutation it describes, so implementations
/// log and swallow their own errors.
pub trait AuditSink: Send + Sync {
    fn record(&self, message: &str);
}

/// Audit trail persisted as `<timestamp> - <message>` lines.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    file: RecordFile,
}

impl FileAuditSink {
    pub fn new(file: RecordFile) -> Self {
        Self { file }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{timestamp} - {message}");
        if let Err(e) = self.file.append_line(&line) {
            warn!(error = %e, "audit append failed; event dropped");
        }
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded messages, without timestamps.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.contains(needle))
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
