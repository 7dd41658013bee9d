//! `stockdesk-catalog` — the stock ledger read surface.
//!
//! The catalog is the system of record for how much of a unit physically
//! exists. This core is **read-only** with respect to it: quantity, price
//! and the active flag are consumed by reservations and ordering, while
//! catalog mutation belongs to the surrounding management tooling.

pub mod unit;

pub use unit::{FileCatalog, InMemoryCatalog, StockLedger, StockUnit};
