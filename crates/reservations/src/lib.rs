//! `stockdesk-reservations` — holds against stock units.
//!
//! A reservation claims part of a unit's on-hand quantity for a customer
//! order without mutating the ledger. Availability is always computed as
//! on-hand minus the sum of active holds; cancelling a hold is purely a
//! status change that the next availability read reflects.

pub mod manager;
pub mod reservation;

pub use manager::{ReservationManager, ReserveError};
pub use reservation::{Reservation, ReservationStatus, ReservationStore};
