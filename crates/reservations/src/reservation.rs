//! Reservation records and their flat-file store.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use stockdesk_core::{ReservationId, Sku};
use stockdesk_store::{RecordFile, StoreError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FIELD_COUNT: usize = 8;

/// Hold lifecycle: Active → Cancelled, exactly once, never deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Active,
    Cancelled,
}

impl ReservationStatus {
    fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(ReservationStatus::Active),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A temporary claim on stock for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    /// Free-form reference to the customer order this hold backs.
    pub order_ref: String,
    pub sku: Sku,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Record shape:
    /// `id|order_ref|sku|quantity|created_by|created_at|status|unit_price`.
    pub fn to_record(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.order_ref,
            self.sku,
            self.quantity,
            self.created_by,
            self.created_at.format(TIMESTAMP_FORMAT),
            self.status,
            self.unit_price,
        )
    }

    /// Parse one record line. Any field count other than eight, a
    /// non-positive quantity, or an unparseable field yields `None`.
    pub fn parse_record(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() != FIELD_COUNT {
            return None;
        }

        let quantity: i64 = parts[3].trim().parse().ok()?;
        if quantity <= 0 {
            return None;
        }
        let created_at = NaiveDateTime::parse_from_str(parts[5].trim(), TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();
        let status = ReservationStatus::parse(parts[6].trim())?;
        let unit_price: Decimal = parts[7].trim().parse().ok()?;

        Some(Self {
            id: ReservationId::new(parts[0].trim()),
            order_ref: parts[1].trim().to_string(),
            sku: Sku::new(parts[2].trim()),
            quantity,
            created_by: parts[4].trim().to_string(),
            created_at,
            status,
            unit_price,
        })
    }
}

/// Append/update store over the reservations file.
///
/// History is never deleted: reserving appends, cancelling rewrites one
/// status field in place. A write lock serializes append and rewrite so
/// a cancel's read-then-rewrite cannot drop a concurrent append.
#[derive(Debug)]
pub struct ReservationStore {
    file: RecordFile,
    write_lock: Mutex<()>,
}

impl ReservationStore {
    pub fn new(file: RecordFile) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    pub fn append(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.file.append_line(&reservation.to_record())
    }

    /// Full history. Malformed records are skipped, not errors.
    pub fn all(&self) -> Result<Vec<Reservation>, StoreError> {
        let mut reservations = Vec::new();
        for line in self.file.read_lines()? {
            if line.trim().is_empty() {
                continue;
            }
            match Reservation::parse_record(&line) {
                Some(r) => reservations.push(r),
                None => warn!(line = %line, "skipping malformed reservation record"),
            }
        }
        Ok(reservations)
    }

    /// Sum of quantities of ACTIVE holds for the SKU; 0 if none.
    pub fn active_reserved_quantity(&self, sku: &Sku) -> Result<i64, StoreError> {
        Ok(self
            .all()?
            .iter()
            .filter(|r| &r.sku == sku && r.status == ReservationStatus::Active)
            .map(|r| r.quantity)
            .sum())
    }

    /// Flip the matching ACTIVE record to CANCELLED in place.
    ///
    /// Returns whether a change was made (`false` when the id is unknown
    /// or the hold is already cancelled). Unparseable lines are kept
    /// verbatim.
    pub fn cancel(&self, id: &ReservationId) -> Result<bool, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let lines = self.file.read_lines()?;
        let mut updated = false;
        let mut new_lines = Vec::with_capacity(lines.len());

        for line in lines {
            match Reservation::parse_record(&line) {
                Some(mut r)
                    if r.id == *id && r.status == ReservationStatus::Active && !updated =>
                {
                    r.status = ReservationStatus::Cancelled;
                    new_lines.push(r.to_record());
                    updated = true;
                }
                _ => new_lines.push(line),
            }
        }

        if updated {
            self.file.rewrite(&new_lines)?;
        }
        Ok(updated)
    }
}
