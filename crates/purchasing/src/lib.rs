//! `stockdesk-purchasing` — purchase orders and their workflow.
//!
//! A purchase order moves along a fixed status graph and is gated, at
//! creation time, by line validation against the stock ledger and by the
//! monthly spending cap.

pub mod order;
pub mod store;
pub mod workflow;

pub use order::{is_valid_transition, PoStatus, PurchaseOrder, PurchaseOrderLine};
pub use store::OrderStore;
pub use workflow::{CreatedOrder, OrderError, OrderLineRequest, OrderWorkflow};
