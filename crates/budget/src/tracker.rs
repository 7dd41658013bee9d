//! Budget records and the spending-cap tracker.

use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stockdesk_audit::AuditSink;
use stockdesk_core::money::format_gbp;
use stockdesk_store::{KeyedLocks, RecordFile, StoreError};

use crate::month::MonthKey;

#[derive(Debug, Error)]
pub enum BudgetError {
    /// Caller-facing input failure (negative amount, malformed month).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BudgetError {
    fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// One month's spending record.
///
/// `cap: None` means no cap has been set for the month; the spend gate
/// then passes with a soft warning rather than blocking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub month: MonthKey,
    pub cap: Option<Decimal>,
    pub spent: Decimal,
}

impl BudgetRecord {
    /// Fresh record: no cap, nothing spent.
    pub fn empty(month: MonthKey) -> Self {
        Self {
            month,
            cap: None,
            spent: Decimal::ZERO,
        }
    }

    /// Remaining budget, `None` when no cap is set. May be negative; an
    /// already-over-budget month is reported transparently.
    pub fn remaining(&self) -> Option<Decimal> {
        self.cap.map(|cap| cap - self.spent)
    }

    /// Record shape: `month_key|cap|spent`, cap empty when unset.
    pub fn to_record(&self) -> String {
        let cap = self.cap.map(|c| c.to_string()).unwrap_or_default();
        format!("{}|{}|{}", self.month, cap, self.spent)
    }

    /// Parse one record line. Two-field records are accepted (spent
    /// defaults to zero), anything else malformed yields `None`.
    pub fn parse_record(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 3 {
            return None;
        }

        let month: MonthKey = parts[0].parse().ok()?;
        let cap = if parts[1].is_empty() {
            None
        } else {
            Some(parts[1].parse::<Decimal>().ok()?)
        };
        let spent = match parts.get(2) {
            None => Decimal::ZERO,
            Some(s) if s.is_empty() => Decimal::ZERO,
            Some(s) => s.parse::<Decimal>().ok()?,
        };
        if spent.is_sign_negative() {
            return None;
        }

        Some(Self { month, cap, spent })
    }
}

/// Flat-file budget store, one record line per month key.
///
/// Keeping one line per month lets a new month's reset leave prior
/// months' records untouched. The store write lock serializes the
/// read-rewrite in `upsert` across months; the per-month locks in
/// [`BudgetTracker`] only cover callers of the same month.
#[derive(Debug)]
pub struct BudgetStore {
    file: RecordFile,
    write_lock: Mutex<()>,
}

impl BudgetStore {
    pub fn new(file: RecordFile) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self, month: &MonthKey) -> Result<Option<BudgetRecord>, StoreError> {
        Ok(self
            .file
            .read_lines()?
            .iter()
            .filter_map(|line| BudgetRecord::parse_record(line))
            .find(|r| &r.month == month))
    }

    /// Replace the month's record line in place, or append one.
    /// Unrelated and malformed lines are preserved verbatim.
    pub fn upsert(&self, record: &BudgetRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut lines = self.file.read_lines()?;
        let mut replaced = false;
        for line in lines.iter_mut() {
            let matches = BudgetRecord::parse_record(line)
                .map(|r| r.month == record.month)
                .unwrap_or(false);
            if matches {
                *line = record.to_record();
                replaced = true;
            }
        }
        if !replaced {
            lines.push(record.to_record());
        }
        self.file.rewrite(&lines)
    }
}

/// Outcome of the atomic spend gate.
#[derive(Debug, Clone, PartialEq)]
pub enum SpendDecision {
    /// No cap set for the month; nothing was charged.
    NoCap,
    /// The cost fit within the cap and was charged.
    Charged { remaining: Decimal },
    /// The cost would exceed the cap; nothing was written.
    Blocked { cap: Decimal, spent: Decimal },
}

/// Monthly spending-cap service.
///
/// Every read-modify-write runs under a per-month lock so two concurrent
/// order creations cannot both pass the cap check against the same slack.
pub struct BudgetTracker {
    store: BudgetStore,
    audit: Arc<dyn AuditSink>,
    locks: KeyedLocks<MonthKey>,
}

impl BudgetTracker {
    pub fn new(store: BudgetStore, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            locks: KeyedLocks::new(),
        }
    }

    /// `YYYY-MM` of the current date.
    pub fn current_month_key() -> MonthKey {
        MonthKey::current()
    }

    /// Pure read: a month with no record loads as `(None, 0)` without
    /// creating one.
    pub fn load(&self, month: &MonthKey) -> Result<BudgetRecord, BudgetError> {
        Ok(self
            .store
            .load(month)?
            .unwrap_or_else(|| BudgetRecord::empty(*month)))
    }

    /// Explicit monthly reset: write a fresh `(None, 0)` record for
    /// `month` if it has none yet. Prior months' records are left
    /// untouched — budgets are monthly snapshots, not rolling balances.
    ///
    /// Returns whether a record was written.
    pub fn reset_month(&self, month: &MonthKey) -> Result<bool, BudgetError> {
        let slot = self.locks.slot(month);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if self.store.load(month)?.is_some() {
            return Ok(false);
        }
        self.store.upsert(&BudgetRecord::empty(*month))?;
        self.audit
            .record(&format!("BUDGET RESET month={month} cap cleared, spent zeroed"));
        info!(month = %month, "started fresh budget record");
        Ok(true)
    }

    /// Set the month's cap, preserving its spent amount.
    pub fn set_cap(&self, month: &MonthKey, amount: Decimal) -> Result<(), BudgetError> {
        if amount.is_sign_negative() {
            return Err(BudgetError::validation("budget cap cannot be negative"));
        }

        let slot = self.locks.slot(month);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self
            .store
            .load(month)?
            .unwrap_or_else(|| BudgetRecord::empty(*month));
        record.cap = Some(amount);
        self.store.upsert(&record)?;
        self.audit.record(&format!(
            "BUDGET CAP SET month={month} cap={}",
            format_gbp(amount)
        ));
        Ok(())
    }

    /// Accumulate spend for the month. Callers gate on a cap being set;
    /// the tracker itself only rejects negative amounts.
    pub fn add_spend(&self, month: &MonthKey, amount: Decimal) -> Result<(), BudgetError> {
        if amount.is_sign_negative() {
            return Err(BudgetError::validation("spend amount cannot be negative"));
        }

        let slot = self.locks.slot(month);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self
            .store
            .load(month)?
            .unwrap_or_else(|| BudgetRecord::empty(*month));
        record.spent += amount;
        Ok(self.store.upsert(&record)?)
    }

    /// Compensating subtraction (used when a persist fails after its
    /// spend was charged). Floored at zero: spent never goes negative.
    pub fn release(&self, month: &MonthKey, amount: Decimal) -> Result<(), BudgetError> {
        if amount.is_sign_negative() {
            return Err(BudgetError::validation("release amount cannot be negative"));
        }

        let slot = self.locks.slot(month);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self
            .store
            .load(month)?
            .unwrap_or_else(|| BudgetRecord::empty(*month));
        record.spent = (record.spent - amount).max(Decimal::ZERO);
        Ok(self.store.upsert(&record)?)
    }

    /// Cap minus spent, `None` when no cap is set.
    pub fn remaining(&self, month: &MonthKey) -> Result<Option<Decimal>, BudgetError> {
        Ok(self.load(month)?.remaining())
    }

    /// Atomic load → compare → charge for one candidate cost.
    ///
    /// A cost exactly equal to the remaining budget is charged; only
    /// strictly over is blocked. With no cap set nothing is written.
    pub fn try_spend(&self, month: &MonthKey, cost: Decimal) -> Result<SpendDecision, BudgetError> {
        if cost.is_sign_negative() {
            return Err(BudgetError::validation("cost cannot be negative"));
        }

        let slot = self.locks.slot(month);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self
            .store
            .load(month)?
            .unwrap_or_else(|| BudgetRecord::empty(*month));

        let Some(cap) = record.cap else {
            return Ok(SpendDecision::NoCap);
        };
        if cost > cap - record.spent {
            return Ok(SpendDecision::Blocked {
                cap,
                spent: record.spent,
            });
        }

        record.spent += cost;
        self.store.upsert(&record)?;
        Ok(SpendDecision::Charged {
            remaining: cap - record.spent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockdesk_audit::MemoryAuditSink;

    fn tracker() -> (tempfile::TempDir, BudgetTracker, Arc<MemoryAuditSink>) {
        let dir = tempfile::tempdir().unwrap();
        let store = BudgetStore::new(RecordFile::new(dir.path().join("budgets.txt")));
        let audit = Arc::new(MemoryAuditSink::new());
        let tracker = BudgetTracker::new(store, audit.clone());
        (dir, tracker, audit)
    }

    fn month(key: &str) -> MonthKey {
        key.parse().unwrap()
    }

    #[test]
    fn record_round_trips_through_codec() {
        let record = BudgetRecord {
            month: month("2026-01"),
            cap: Some(dec!(50000)),
            spent: dec!(190.00),
        };
        let parsed = BudgetRecord::parse_record(&record.to_record()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn empty_cap_and_spent_fields_default() {
        let r = BudgetRecord::parse_record("2026-01|").unwrap();
        assert_eq!(r.cap, None);
        assert_eq!(r.spent, Decimal::ZERO);

        let r = BudgetRecord::parse_record("2026-01|50000").unwrap();
        assert_eq!(r.cap, Some(dec!(50000)));
        assert_eq!(r.spent, Decimal::ZERO);

        let r = BudgetRecord::parse_record("2026-01|50000|").unwrap();
        assert_eq!(r.spent, Decimal::ZERO);
    }

    #[test]
    fn malformed_records_parse_as_none() {
        for bad in ["invalid_line", "2026-01|abc", "2026-01|10|x", "2026-01|10|-5"] {
            assert!(BudgetRecord::parse_record(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn loading_unknown_month_yields_empty_record_without_writing() {
        let (_dir, tracker, _audit) = tracker();
        let record = tracker.load(&month("2026-01")).unwrap();
        assert_eq!(record.cap, None);
        assert_eq!(record.spent, Decimal::ZERO);
        // Still no record: reset reports it had to write one.
        assert!(tracker.reset_month(&month("2026-01")).unwrap());
    }

    #[test]
    fn reset_month_writes_once_and_leaves_other_months_alone() {
        let (_dir, tracker, audit) = tracker();
        tracker.set_cap(&month("2025-12"), dec!(800)).unwrap();
        tracker.add_spend(&month("2025-12"), dec!(120)).unwrap();

        assert!(tracker.reset_month(&month("2026-01")).unwrap());
        assert!(!tracker.reset_month(&month("2026-01")).unwrap());
        assert!(audit.contains("BUDGET RESET month=2026-01"));

        let december = tracker.load(&month("2025-12")).unwrap();
        assert_eq!(december.cap, Some(dec!(800)));
        assert_eq!(december.spent, dec!(120));
        let january = tracker.load(&month("2026-01")).unwrap();
        assert_eq!(january.cap, None);
    }

    #[test]
    fn set_cap_rejects_negative_and_preserves_spent() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");

        let err = tracker.set_cap(&key, dec!(-1)).unwrap_err();
        assert!(matches!(err, BudgetError::Validation(_)));

        tracker.set_cap(&key, dec!(100)).unwrap();
        tracker.add_spend(&key, dec!(190)).unwrap();
        tracker.set_cap(&key, dec!(500)).unwrap();

        let record = tracker.load(&key).unwrap();
        assert_eq!(record.cap, Some(dec!(500)));
        assert_eq!(record.spent, dec!(190));
    }

    #[test]
    fn add_spend_accumulates() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        tracker.set_cap(&key, dec!(500)).unwrap();
        tracker.add_spend(&key, dec!(25)).unwrap();
        tracker.add_spend(&key, dec!(40)).unwrap();
        assert_eq!(tracker.load(&key).unwrap().spent, dec!(65));
    }

    #[test]
    fn remaining_reports_overspend_transparently() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        assert_eq!(tracker.remaining(&key).unwrap(), None);

        tracker.set_cap(&key, dec!(50)).unwrap();
        tracker.add_spend(&key, dec!(30)).unwrap();
        assert_eq!(tracker.remaining(&key).unwrap(), Some(dec!(20)));

        tracker.add_spend(&key, dec!(40)).unwrap();
        assert_eq!(tracker.remaining(&key).unwrap(), Some(dec!(-20)));
    }

    #[test]
    fn try_spend_is_exact_at_the_cap_boundary() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        tracker.set_cap(&key, dec!(100)).unwrap();

        let decision = tracker.try_spend(&key, dec!(100)).unwrap();
        assert_eq!(
            decision,
            SpendDecision::Charged {
                remaining: Decimal::ZERO
            }
        );
        assert_eq!(tracker.load(&key).unwrap().spent, dec!(100));
    }

    #[test]
    fn try_spend_blocks_strictly_over_without_writing() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        tracker.set_cap(&key, dec!(100)).unwrap();

        let decision = tracker.try_spend(&key, dec!(100.01)).unwrap();
        assert_eq!(
            decision,
            SpendDecision::Blocked {
                cap: dec!(100),
                spent: Decimal::ZERO
            }
        );
        assert_eq!(tracker.load(&key).unwrap().spent, Decimal::ZERO);
    }

    #[test]
    fn try_spend_without_cap_charges_nothing() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        assert_eq!(tracker.try_spend(&key, dec!(30)).unwrap(), SpendDecision::NoCap);
        assert_eq!(tracker.load(&key).unwrap().spent, Decimal::ZERO);
    }

    #[test]
    fn release_floors_at_zero() {
        let (_dir, tracker, _audit) = tracker();
        let key = month("2026-01");
        tracker.set_cap(&key, dec!(100)).unwrap();
        tracker.add_spend(&key, dec!(30)).unwrap();

        tracker.release(&key, dec!(10)).unwrap();
        assert_eq!(tracker.load(&key).unwrap().spent, dec!(20));

        tracker.release(&key, dec!(500)).unwrap();
        assert_eq!(tracker.load(&key).unwrap().spent, Decimal::ZERO);
    }

    #[test]
    fn concurrent_spend_on_different_months_loses_nothing() {
        let (_dir, tracker, _audit) = tracker();
        let tracker = Arc::new(tracker);
        let months = [month("2026-01"), month("2026-02")];

        let handles: Vec<_> = months
            .into_iter()
            .map(|key| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        tracker.add_spend(&key, dec!(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Each month's rewrites must not clobber the other's record.
        for key in months {
            assert_eq!(tracker.load(&key).unwrap().spent, dec!(50));
        }
    }

    #[test]
    fn upsert_preserves_unrelated_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = RecordFile::new(dir.path().join("budgets.txt"));
        file.append_line("garbage line").unwrap();
        file.append_line("2025-12|800|120").unwrap();

        let store = BudgetStore::new(file.clone());
        store
            .upsert(&BudgetRecord {
                month: month("2026-01"),
                cap: Some(dec!(50)),
                spent: Decimal::ZERO,
            })
            .unwrap();

        let lines = file.read_lines().unwrap();
        assert_eq!(lines[0], "garbage line");
        assert_eq!(lines[1], "2025-12|800|120");
        assert_eq!(lines[2], "2026-01|50|0");
    }
}
