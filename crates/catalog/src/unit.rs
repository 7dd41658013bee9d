//! Stock units and the ledger contract.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use stockdesk_core::Sku;
use stockdesk_store::{RecordFile, StoreError};

/// One catalog entry.
///
/// Invariants held by the catalog writer (out of scope here): quantity
/// and price are never negative; deactivation is the soft-delete
/// mechanism once a unit is referenced by history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUnit {
    pub sku: Sku,
    pub name: String,
    pub description: String,
    pub quantity: i64,
    pub price: Decimal,
    pub category: Option<String>,
    pub active: bool,
}

/// Read-only ledger contract consumed by reservations and ordering.
pub trait StockLedger: Send + Sync {
    fn find_unit(&self, sku: &Sku) -> Result<Option<StockUnit>, StoreError>;

    /// On-hand quantity, `None` for an unknown SKU.
    fn quantity_of(&self, sku: &Sku) -> Result<Option<i64>, StoreError> {
        Ok(self.find_unit(sku)?.map(|u| u.quantity))
    }

    /// An unknown SKU is treated as inactive.
    fn is_active(&self, sku: &Sku) -> Result<bool, StoreError> {
        Ok(self.find_unit(sku)?.map(|u| u.active).unwrap_or(false))
    }
}

/// Catalog backed by the comma-separated products file.
///
/// Record shape: `sku,name,description,quantity,price,category,STATUS`
/// where STATUS is `ACTIVE`/`INACTIVE`. Category and status are optional
/// trailing fields (missing status reads as active). Malformed lines are
/// skipped, never fatal.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    file: RecordFile,
}

impl FileCatalog {
    pub fn new(file: RecordFile) -> Self {
        Self { file }
    }

    pub fn units(&self) -> Result<Vec<StockUnit>, StoreError> {
        let mut units = Vec::new();
        for line in self.file.read_lines()? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_unit(&line) {
                Some(unit) => units.push(unit),
                None => warn!(line = %line, "skipping malformed catalog record"),
            }
        }
        Ok(units)
    }
}

fn parse_unit(line: &str) -> Option<StockUnit> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 5 {
        return None;
    }

    let quantity: i64 = parts[3].parse().ok()?;
    if quantity < 0 {
        return None;
    }
    let price: Decimal = parts[4].parse().ok()?;
    if price.is_sign_negative() {
        return None;
    }

    let category = parts
        .get(5)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    let active = parts
        .get(6)
        .map(|s| s.eq_ignore_ascii_case("ACTIVE"))
        .unwrap_or(true);

    Some(StockUnit {
        sku: Sku::new(parts[0]),
        name: parts[1].to_string(),
        description: parts[2].to_string(),
        quantity,
        price,
        category,
        active,
    })
}

impl StockLedger for FileCatalog {
    fn find_unit(&self, sku: &Sku) -> Result<Option<StockUnit>, StoreError> {
        Ok(self.units()?.into_iter().find(|u| &u.sku == sku))
    }
}

/// In-memory ledger for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    units: RwLock<HashMap<Sku, StockUnit>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, unit: StockUnit) {
        let mut units = self
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        units.insert(unit.sku.clone(), unit);
    }
}

impl StockLedger for InMemoryCatalog {
    fn find_unit(&self, sku: &Sku) -> Result<Option<StockUnit>, StoreError> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units.get(sku).cloned())
    }
}
