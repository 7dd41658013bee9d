//! Per-key mutex map.
//!
//! The stores are check-then-write over shared flat files, so any
//! concurrent use needs exclusivity per SKU, month key, or order id.
//! `KeyedLocks` hands out one mutex per key, created lazily.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Lazily-created mutex per key.
///
/// Callers fetch the slot for a key and hold its guard across the whole
/// read-validate-write sequence:
///
/// ```
/// # use stockdesk_store::KeyedLocks;
/// # use std::sync::PoisonError;
/// let locks: KeyedLocks<String> = KeyedLocks::new();
/// let slot = locks.slot(&"SKU1".to_string());
/// let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
/// // ... read, validate, write ...
/// ```
#[derive(Debug, Default)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or create) the mutex for `key`.
    ///
    /// A poisoned registry lock is recovered rather than propagated: the
    /// map itself holds no invariants beyond key → slot.
    pub fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }
}
