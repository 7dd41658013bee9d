//! Reservation service: availability math and the reserve/cancel surface.

use std::sync::{Arc, PoisonError};

use chrono::{Timelike, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use stockdesk_audit::AuditSink;
use stockdesk_catalog::StockLedger;
use stockdesk_core::{ReservationId, Sku};
use stockdesk_store::{KeyedLocks, StoreError};

use crate::reservation::{Reservation, ReservationStatus, ReservationStore};

#[derive(Debug, Error)]
pub enum ReserveError {
    /// Bad input: empty order reference, non-positive quantity, negative price.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The ledger has no such unit.
    #[error("unknown stock unit {0}")]
    UnknownUnit(Sku),

    /// The unit exists but has been deactivated.
    #[error("stock unit {0} is inactive")]
    InactiveUnit(Sku),

    /// The requested quantity exceeds what is currently available.
    #[error("not enough available stock for {sku}: requested {requested}, available {available}")]
    InsufficientAvailability {
        sku: Sku,
        requested: i64,
        available: i64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReserveError {
    fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Owns holds against stock units and the availability computation.
///
/// Reserving is the system's principal check-then-write: the
/// availability read and the appended hold must not be separated by
/// another reservation on the same SKU, so both run under a per-SKU lock.
pub struct ReservationManager {
    ledger: Arc<dyn StockLedger>,
    store: ReservationStore,
    audit: Arc<dyn AuditSink>,
    locks: KeyedLocks<Sku>,
}

impl ReservationManager {
    pub fn new(
        ledger: Arc<dyn StockLedger>,
        store: ReservationStore,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ledger,
            store,
            audit,
            locks: KeyedLocks::new(),
        }
    }

    /// On-hand quantity minus the sum of active holds.
    pub fn available_quantity(&self, sku: &Sku) -> Result<i64, ReserveError> {
        let on_hand = self
            .ledger
            .quantity_of(sku)?
            .ok_or_else(|| ReserveError::UnknownUnit(sku.clone()))?;
        let reserved = self.store.active_reserved_quantity(sku)?;
        Ok(on_hand - reserved)
    }

    /// Sum of quantities of active holds for the SKU; 0 if none.
    pub fn active_reserved_quantity(&self, sku: &Sku) -> Result<i64, ReserveError> {
        Ok(self.store.active_reserved_quantity(sku)?)
    }

    /// Place a hold on `quantity` units of `sku` for an order.
    ///
    /// Fails without writing when the input is invalid, the unit is
    /// unknown or inactive, or the requested quantity exceeds what is
    /// available.
    pub fn reserve(
        &self,
        order_ref: &str,
        sku: &Sku,
        quantity: i64,
        requester: &str,
        unit_price: Decimal,
    ) -> Result<Reservation, ReserveError> {
        let order_ref = order_ref.trim();
        if order_ref.is_empty() {
            return Err(ReserveError::validation("order reference cannot be empty"));
        }
        if sku.as_str().trim().is_empty() {
            return Err(ReserveError::validation("SKU cannot be empty"));
        }
        if quantity <= 0 {
            return Err(ReserveError::validation(
                "quantity must be a positive integer",
            ));
        }
        if unit_price.is_sign_negative() {
            return Err(ReserveError::validation("unit price cannot be negative"));
        }

        let slot = self.locks.slot(sku);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let unit = self
            .ledger
            .find_unit(sku)?
            .ok_or_else(|| ReserveError::UnknownUnit(sku.clone()))?;
        if !unit.active {
            return Err(ReserveError::InactiveUnit(sku.clone()));
        }

        let reserved = self.store.active_reserved_quantity(sku)?;
        let available = unit.quantity - reserved;
        if quantity > available {
            return Err(ReserveError::InsufficientAvailability {
                sku: sku.clone(),
                requested: quantity,
                available,
            });
        }

        let now = Utc::now();
        let reservation = Reservation {
            id: ReservationId::generate(),
            order_ref: order_ref.to_string(),
            sku: sku.clone(),
            quantity,
            unit_price,
            created_by: requester.to_string(),
            // Truncated to whole seconds to match the persisted precision.
            created_at: now.with_nanosecond(0).unwrap_or(now),
            status: ReservationStatus::Active,
        };
        self.store.append(&reservation)?;

        self.audit.record(&format!(
            "USER={requester} ACTION=RESERVATION sku={sku} order={order_ref} qty={quantity}"
        ));
        info!(id = %reservation.id, sku = %sku, quantity, "reservation placed");
        Ok(reservation)
    }

    /// Cancel a hold, releasing its claim on availability.
    ///
    /// Returns whether a change was made; cancelling an unknown or
    /// already-cancelled reservation is a no-op reported as `false`.
    /// The ledger is never touched.
    pub fn cancel(&self, id: &ReservationId, actor: &str) -> Result<bool, ReserveError> {
        let updated = self.store.cancel(id)?;
        if updated {
            self.audit
                .record(&format!("Reservation {id} cancelled by {actor}"));
            info!(id = %id, "reservation cancelled");
        }
        Ok(updated)
    }

    /// Full reservation history for the menu layer to render.
    pub fn reservations(&self) -> Result<Vec<Reservation>, ReserveError> {
        Ok(self.store.all()?)
    }
}
