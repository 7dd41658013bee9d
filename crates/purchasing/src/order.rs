//! Purchase order records and the status state machine.

use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockdesk_core::{DomainError, PoId, Sku};

const DATE_FORMAT: &str = "%Y-%m-%d";
const HEADER_MARKER: &str = "HEADER";

/// Purchase order status lifecycle.
///
/// ```text
/// CREATED   -> APPROVED | CANCELLED
/// APPROVED  -> PARTIAL  | CANCELLED
/// PARTIAL   -> COMPLETED | CANCELLED
/// COMPLETED -> (terminal)
/// CANCELLED -> (terminal)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PoStatus {
    Created,
    Approved,
    Partial,
    Completed,
    Cancelled,
}

impl PoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PoStatus::Created => "CREATED",
            PoStatus::Approved => "APPROVED",
            PoStatus::Partial => "PARTIAL",
            PoStatus::Completed => "COMPLETED",
            PoStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PoStatus::Completed | PoStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: PoStatus) -> bool {
        is_valid_transition(self, next)
    }
}

/// Total transition function over the status graph. Any pair not listed
/// in the table is rejected.
pub fn is_valid_transition(current: PoStatus, next: PoStatus) -> bool {
    matches!(
        (current, next),
        (PoStatus::Created, PoStatus::Approved)
            | (PoStatus::Created, PoStatus::Cancelled)
            | (PoStatus::Approved, PoStatus::Partial)
            | (PoStatus::Approved, PoStatus::Cancelled)
            | (PoStatus::Partial, PoStatus::Completed)
            | (PoStatus::Partial, PoStatus::Cancelled)
    )
}

impl core::fmt::Display for PoStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoStatus {
    type Err = DomainError;

    /// Case-insensitive: the menu layer passes raw user text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(PoStatus::Created),
            "APPROVED" => Ok(PoStatus::Approved),
            "PARTIAL" => Ok(PoStatus::Partial),
            "COMPLETED" => Ok(PoStatus::Completed),
            "CANCELLED" => Ok(PoStatus::Cancelled),
            _ => Err(DomainError::validation(format!("unknown status {s:?}"))),
        }
    }
}

/// Purchase order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PoId,
    pub expected_date: NaiveDate,
    pub created_by: String,
    pub status: PoStatus,
}

impl PurchaseOrder {
    /// Header record: `po_id|expected_date|created_by|status|HEADER`.
    pub fn to_header_record(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.id,
            self.expected_date.format(DATE_FORMAT),
            self.created_by,
            self.status,
            HEADER_MARKER,
        )
    }

    pub fn parse_header_record(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() != 5 || parts[4] != HEADER_MARKER {
            return None;
        }
        Some(Self {
            id: PoId::new(parts[0]),
            expected_date: NaiveDate::parse_from_str(parts[1], DATE_FORMAT).ok()?,
            created_by: parts[2].to_string(),
            status: parts[3].parse().ok()?,
        })
    }
}

/// One line of a purchase order. Lines have no independent lifecycle;
/// they are written and read together with their header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub po_id: PoId,
    pub sku: Sku,
    pub quantity: i64,
}

impl PurchaseOrderLine {
    /// Line record: `po_id|sku|quantity`.
    pub fn to_record(&self) -> String {
        format!("{}|{}|{}", self.po_id, self.sku, self.quantity)
    }

    pub fn parse_record(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() != 3 {
            return None;
        }
        let quantity: i64 = parts[2].parse().ok()?;
        if quantity <= 0 {
            return None;
        }
        Some(Self {
            po_id: PoId::new(parts[0]),
            sku: Sku::new(parts[1]),
            quantity,
        })
    }
}
