//! `stockdesk-core` — shared domain primitives.
//!
//! This crate contains **pure domain** building blocks (no persistence
//! concerns): strongly-typed identifiers, the shared domain error model,
//! and currency display helpers.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{PoId, ReservationId, Sku};
