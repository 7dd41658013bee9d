//! Purchase order creation and status workflow.

use std::sync::{Arc, PoisonError};

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use stockdesk_audit::AuditSink;
use stockdesk_budget::{BudgetError, BudgetTracker, MonthKey, SpendDecision};
use stockdesk_catalog::StockLedger;
use stockdesk_core::money::format_gbp;
use stockdesk_core::{PoId, Sku};
use stockdesk_store::{KeyedLocks, StoreError};

use crate::order::{is_valid_transition, PoStatus, PurchaseOrder, PurchaseOrderLine};
use crate::store::OrderStore;

#[derive(Debug, Error)]
pub enum OrderError {
    /// Bad input: unparseable or past delivery date, empty line list.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Every requested line was dropped; no order is created.
    #[error("purchase order must have at least one valid line")]
    NoValidLines,

    /// The order's cost would push the month over its cap. Nothing was
    /// persisted.
    #[error("purchase order blocked: cost {cost} exceeds remaining budget (cap {cap}, spent {spent})")]
    OverBudget {
        cost: Decimal,
        cap: Decimal,
        spent: Decimal,
    },

    #[error("purchase order {0} not found")]
    UnknownOrder(PoId),

    /// The requested status name is not part of the lifecycle.
    #[error("unknown status {0:?}")]
    UnknownStatus(String),

    /// The requested move is not in the transition table.
    #[error("invalid transition {current} -> {requested}")]
    InvalidTransition {
        current: PoStatus,
        requested: PoStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Budget(#[from] BudgetError),
}

/// One requested order line, pre-validation.
#[derive(Debug, Clone)]
pub struct OrderLineRequest {
    pub sku: Sku,
    pub quantity: i64,
}

/// A successfully created order, with the figures the menu layer reports.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: PurchaseOrder,
    pub lines: Vec<PurchaseOrderLine>,
    pub total_cost: Decimal,
    /// Remaining budget after the charge, when a cap was in force.
    pub budget_remaining: Option<Decimal>,
}

/// Orchestrates purchase order creation and status transitions.
pub struct OrderWorkflow {
    ledger: Arc<dyn StockLedger>,
    store: OrderStore,
    audit: Arc<dyn AuditSink>,
    locks: KeyedLocks<PoId>,
}

impl OrderWorkflow {
    pub fn new(
        ledger: Arc<dyn StockLedger>,
        store: OrderStore,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ledger,
            store,
            audit,
            locks: KeyedLocks::new(),
        }
    }

    /// Create a purchase order from the requested lines.
    ///
    /// Lines naming unknown or inactive SKUs, or with a non-positive
    /// quantity, are dropped with a logged reason rather than failing the
    /// whole order; an order with no surviving lines is rejected. When a
    /// budget tracker is supplied, the current month's cap gates the
    /// total cost: a cost strictly over the remaining budget rejects the
    /// order and audits the blocked attempt, a month without a cap lets
    /// the order through with a warning.
    pub fn create_order(
        &self,
        expected_date: &str,
        lines: &[OrderLineRequest],
        creator: &str,
        budget: Option<&BudgetTracker>,
    ) -> Result<CreatedOrder, OrderError> {
        let expected = parse_expected_date(expected_date)?;
        if lines.is_empty() {
            return Err(OrderError::Validation(
                "purchase order must have at least one line".to_string(),
            ));
        }

        let mut surviving: Vec<(Sku, i64)> = Vec::new();
        let mut total_cost = Decimal::ZERO;
        for request in lines {
            if request.quantity <= 0 {
                warn!(sku = %request.sku, quantity = request.quantity,
                    "dropping order line: quantity must be a positive integer");
                continue;
            }
            let Some(unit) = self.ledger.find_unit(&request.sku)? else {
                warn!(sku = %request.sku, "dropping order line: unknown SKU");
                continue;
            };
            if !unit.active {
                warn!(sku = %request.sku, "dropping order line: unit is inactive");
                continue;
            }
            total_cost += Decimal::from(request.quantity) * unit.price;
            surviving.push((request.sku.clone(), request.quantity));
        }
        if surviving.is_empty() {
            return Err(OrderError::NoValidLines);
        }

        // Budget gate: normalize the month explicitly, then check and
        // charge atomically.
        let mut charged: Option<(MonthKey, Decimal)> = None;
        let mut budget_remaining = None;
        if let Some(tracker) = budget {
            let month = MonthKey::current();
            tracker.reset_month(&month)?;
            match tracker.try_spend(&month, total_cost)? {
                SpendDecision::NoCap => {
                    warn!(month = %month, "no budget cap set; order not gated");
                }
                SpendDecision::Blocked { cap, spent } => {
                    self.audit.record(&format!(
                        "PO BLOCKED user={creator} cost={} cap={} spent={}",
                        format_gbp(total_cost),
                        format_gbp(cap),
                        format_gbp(spent)
                    ));
                    return Err(OrderError::OverBudget {
                        cost: total_cost,
                        cap,
                        spent,
                    });
                }
                SpendDecision::Charged { remaining } => {
                    charged = Some((month, total_cost));
                    budget_remaining = Some(remaining);
                }
            }
        }

        let order = PurchaseOrder {
            id: PoId::generate(),
            expected_date: expected,
            created_by: creator.to_string(),
            status: PoStatus::Created,
        };
        let order_lines: Vec<PurchaseOrderLine> = surviving
            .into_iter()
            .map(|(sku, quantity)| PurchaseOrderLine {
                po_id: order.id.clone(),
                sku,
                quantity,
            })
            .collect();

        if let Err(e) = self.store.save(&order, &order_lines) {
            // The spend was charged for an order that never landed; give
            // it back before surfacing the store failure.
            if let (Some(tracker), Some((month, amount))) = (budget, charged) {
                if let Err(release_err) = tracker.release(&month, amount) {
                    warn!(error = %release_err, "failed to release budget charge");
                }
            }
            return Err(e.into());
        }

        self.audit.record(&format!(
            "Purchase order {} created by {creator} total={}",
            order.id,
            format_gbp(total_cost)
        ));
        info!(id = %order.id, lines = order_lines.len(), total = %total_cost,
            "purchase order created");

        Ok(CreatedOrder {
            order,
            lines: order_lines,
            total_cost,
            budget_remaining,
        })
    }

    /// Move an order to `requested`, which may be any casing of a status
    /// name. Unknown order, unknown status name and invalid transition
    /// are distinguished so the caller can render the right message.
    pub fn update_status(
        &self,
        po_id: &PoId,
        requested: &str,
        actor: &str,
    ) -> Result<PoStatus, OrderError> {
        let next: PoStatus = requested
            .parse()
            .map_err(|_| OrderError::UnknownStatus(requested.to_string()))?;

        let slot = self.locks.slot(po_id);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .store
            .status_of(po_id)?
            .ok_or_else(|| OrderError::UnknownOrder(po_id.clone()))?;

        if !is_valid_transition(current, next) {
            self.audit.record(&format!(
                "PO {po_id} invalid transition {current} -> {next} attempted by {actor}"
            ));
            return Err(OrderError::InvalidTransition {
                current,
                requested: next,
            });
        }

        if !self.store.update_status(po_id, next)? {
            return Err(OrderError::UnknownOrder(po_id.clone()));
        }

        self.audit.record(&format!(
            "PO {po_id} status {current} -> {next} by {actor}"
        ));
        info!(id = %po_id, from = %current, to = %next, "purchase order status updated");
        Ok(next)
    }

    pub fn status_of(&self, po_id: &PoId) -> Result<Option<PoStatus>, OrderError> {
        Ok(self.store.status_of(po_id)?)
    }

    pub fn orders(&self) -> Result<Vec<PurchaseOrder>, OrderError> {
        Ok(self.store.orders()?)
    }

    pub fn lines_for(&self, po_id: &PoId) -> Result<Vec<PurchaseOrderLine>, OrderError> {
        Ok(self.store.lines_for(po_id)?)
    }
}

fn parse_expected_date(input: &str) -> Result<NaiveDate, OrderError> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        OrderError::Validation(format!(
            "expected delivery date must be YYYY-MM-DD, got {input:?}"
        ))
    })?;
    if date < Local::now().date_naive() {
        return Err(OrderError::Validation(
            "expected delivery date cannot be in the past".to_string(),
        ));
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockdesk_audit::MemoryAuditSink;
    use stockdesk_budget::BudgetStore;
    use stockdesk_catalog::{InMemoryCatalog, StockUnit};
    use stockdesk_store::RecordFile;

    const FAR_FUTURE: &str = "2999-12-31";

    fn unit(sku: &str, price: Decimal, active: bool) -> StockUnit {
        StockUnit {
            sku: Sku::new(sku),
            name: format!("{sku} name"),
            description: String::new(),
            quantity: 100,
            price,
            category: None,
            active,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        workflow: OrderWorkflow,
        tracker: BudgetTracker,
        audit: Arc<MemoryAuditSink>,
    }

    fn fixture(units: &[StockUnit]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let catalog = InMemoryCatalog::new();
        for u in units {
            catalog.insert(u.clone());
        }
        let audit = Arc::new(MemoryAuditSink::new());
        let workflow = OrderWorkflow::new(
            Arc::new(catalog),
            OrderStore::new(RecordFile::new(dir.path().join("purchase_orders.txt"))),
            audit.clone(),
        );
        let tracker = BudgetTracker::new(
            BudgetStore::new(RecordFile::new(dir.path().join("budgets.txt"))),
            audit.clone(),
        );
        Fixture {
            _dir: dir,
            workflow,
            tracker,
            audit,
        }
    }

    fn request(sku: &str, quantity: i64) -> OrderLineRequest {
        OrderLineRequest {
            sku: Sku::new(sku),
            quantity,
        }
    }

    #[test]
    fn rejects_unparseable_or_past_dates() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        for bad in ["not-a-date", "2026-13-40", "2020-01-01"] {
            let err = f
                .workflow
                .create_order(bad, &[request("SKU1", 1)], "anetta", None)
                .unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)), "{bad}: {err:?}");
        }
        assert!(f.workflow.orders().unwrap().is_empty());
    }

    #[test]
    fn rejects_empty_line_list() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let err = f
            .workflow
            .create_order(FAR_FUTURE, &[], "anetta", None)
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[test]
    fn drops_invalid_lines_and_totals_only_survivors() {
        let f = fixture(&[
            unit("SKU1", dec!(5.00), true),
            unit("SKU2", dec!(2.00), true),
            unit("SKU9", dec!(99.00), false),
        ]);

        let created = f
            .workflow
            .create_order(
                FAR_FUTURE,
                &[
                    request("SKU1", 2),    // 10.00
                    request("SKU2", 3),    // 6.00
                    request("SKU9", 1),    // inactive: dropped
                    request("NOPE", 1),    // unknown: dropped
                    request("SKU1", 0),    // non-positive: dropped
                ],
                "anetta",
                None,
            )
            .unwrap();

        assert_eq!(created.total_cost, dec!(16.00));
        assert_eq!(created.lines.len(), 2);
        assert_eq!(created.budget_remaining, None);
        assert_eq!(created.order.status, PoStatus::Created);
        assert!(created.order.id.as_str().starts_with("PO-"));

        let persisted = f.workflow.lines_for(&created.order.id).unwrap();
        assert_eq!(persisted, created.lines);
    }

    #[test]
    fn rejects_when_no_line_survives() {
        let f = fixture(&[unit("SKU9", dec!(99.00), false)]);
        let err = f
            .workflow
            .create_order(
                FAR_FUTURE,
                &[request("SKU9", 1), request("NOPE", 2)],
                "anetta",
                None,
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::NoValidLines));
        assert!(f.workflow.orders().unwrap().is_empty());
    }

    #[test]
    fn order_within_budget_charges_the_spend() {
        // Scenario: cap 50, spent 0; a 30.00 order leaves 20 remaining.
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let month = MonthKey::current();
        f.tracker.set_cap(&month, dec!(50)).unwrap();

        let created = f
            .workflow
            .create_order(FAR_FUTURE, &[request("SKU1", 6)], "anetta", Some(&f.tracker))
            .unwrap();

        assert_eq!(created.total_cost, dec!(30.00));
        assert_eq!(created.budget_remaining, Some(dec!(20.00)));
        assert_eq!(f.tracker.remaining(&month).unwrap(), Some(dec!(20.00)));
        assert!(f.audit.contains("created by anetta"));
    }

    #[test]
    fn order_over_budget_is_blocked_and_audited() {
        // Scenario: cap 50, spent 45; a 10.00 order must be rejected whole.
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let month = MonthKey::current();
        f.tracker.set_cap(&month, dec!(50)).unwrap();
        f.tracker.add_spend(&month, dec!(45)).unwrap();

        let err = f
            .workflow
            .create_order(FAR_FUTURE, &[request("SKU1", 2)], "anetta", Some(&f.tracker))
            .unwrap_err();

        match err {
            OrderError::OverBudget { cost, cap, spent } => {
                assert_eq!(cost, dec!(10.00));
                assert_eq!(cap, dec!(50));
                assert_eq!(spent, dec!(45));
            }
            other => panic!("expected OverBudget, got {other:?}"),
        }
        assert!(f.workflow.orders().unwrap().is_empty());
        assert!(f.audit.contains("PO BLOCKED user=anetta cost=£10.00"));
        assert_eq!(f.tracker.load(&month).unwrap().spent, dec!(45));
    }

    #[test]
    fn cost_exactly_equal_to_remaining_budget_is_allowed() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let month = MonthKey::current();
        f.tracker.set_cap(&month, dec!(100)).unwrap();

        let created = f
            .workflow
            .create_order(FAR_FUTURE, &[request("SKU1", 20)], "anetta", Some(&f.tracker))
            .unwrap();

        assert_eq!(created.total_cost, dec!(100.00));
        assert_eq!(created.budget_remaining, Some(dec!(0.00)));
        assert_eq!(f.tracker.load(&month).unwrap().spent, dec!(100.00));
    }

    #[test]
    fn month_without_cap_passes_with_no_charge() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let month = MonthKey::current();

        let created = f
            .workflow
            .create_order(FAR_FUTURE, &[request("SKU1", 2)], "anetta", Some(&f.tracker))
            .unwrap();

        assert_eq!(created.budget_remaining, None);
        assert_eq!(f.tracker.load(&month).unwrap().spent, Decimal::ZERO);
        // the workflow normalized the month explicitly before the gate
        assert!(f.audit.contains("BUDGET RESET"));
    }

    #[test]
    fn status_walks_the_graph_and_rejects_backwards_moves() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);
        let created = f
            .workflow
            .create_order(FAR_FUTURE, &[request("SKU1", 1)], "anetta", None)
            .unwrap();
        let id = created.order.id;

        assert_eq!(
            f.workflow.update_status(&id, "APPROVED", "mgr").unwrap(),
            PoStatus::Approved
        );
        // case-insensitive status input
        assert_eq!(
            f.workflow.update_status(&id, "partial", "mgr").unwrap(),
            PoStatus::Partial
        );

        let err = f.workflow.update_status(&id, "CREATED", "mgr").unwrap_err();
        match err {
            OrderError::InvalidTransition { current, requested } => {
                assert_eq!(current, PoStatus::Partial);
                assert_eq!(requested, PoStatus::Created);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert!(f.audit.contains("invalid transition PARTIAL -> CREATED"));
        assert_eq!(f.workflow.status_of(&id).unwrap(), Some(PoStatus::Partial));
    }

    #[test]
    fn unknown_status_and_unknown_order_are_distinguished() {
        let f = fixture(&[unit("SKU1", dec!(5.00), true)]);

        let err = f
            .workflow
            .update_status(&PoId::new("PO-404"), "NOT_A_STATUS", "mgr")
            .unwrap_err();
        assert!(matches!(err, OrderError::UnknownStatus(_)));

        let err = f
            .workflow
            .update_status(&PoId::new("PO-404"), "APPROVED", "mgr")
            .unwrap_err();
        assert!(matches!(err, OrderError::UnknownOrder(_)));
    }
}
