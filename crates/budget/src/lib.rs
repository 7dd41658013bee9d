//! `stockdesk-budget` — monthly spending cap tracking.
//!
//! One mutable record per calendar month: an optional cap and the amount
//! spent against it so far. Budgets do not carry over; each month starts
//! with no cap until one is set explicitly.

pub mod month;
pub mod tracker;

pub use month::MonthKey;
pub use tracker::{BudgetError, BudgetRecord, BudgetStore, BudgetTracker, SpendDecision};
