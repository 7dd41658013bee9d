//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are opaque strings in the persisted record formats, so the
//! newtypes wrap `String` rather than a UUID. `new` trusts its input
//! (records read back from a store are authoritative); `FromStr` is the
//! validating entry point for caller-supplied text.

use core::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Stock-keeping unit identifier; uniquely names a catalog unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

/// Reservation (hold) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(String);

/// Purchase order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoId(String);

macro_rules! impl_str_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw identifier without validation.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, " cannot be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_str_newtype!(Sku, "Sku");
impl_str_newtype!(ReservationId, "ReservationId");
impl_str_newtype!(PoId, "PoId");

impl ReservationId {
    /// Generate a fresh reservation id (`RSV-` + 6 uppercase hex chars).
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("RSV-{}", hex[..6].to_uppercase()))
    }
}

impl PoId {
    /// Generate a purchase order id (`PO-YYYYMMDDHHMMSS-XXXX`).
    ///
    /// The timestamp keeps ids sortable and human-readable; the random
    /// suffix disambiguates orders created within the same second.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!(
            "PO-{}-{}",
            Local::now().format("%Y%m%d%H%M%S"),
            hex[..4].to_uppercase()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_trims_and_rejects_empty() {
        let sku: Sku = " SKU1 ".parse().unwrap();
        assert_eq!(sku.as_str(), "SKU1");

        let err = "   ".parse::<Sku>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn generated_reservation_ids_carry_prefix_and_are_unique() {
        let a = ReservationId::generate();
        let b = ReservationId::generate();
        assert!(a.as_str().starts_with("RSV-"));
        assert_eq!(a.as_str().len(), "RSV-".len() + 6);
        assert_ne!(a, b);
    }

    #[test]
    fn generated_po_ids_are_time_derived_and_unique_within_a_second() {
        let ids: Vec<PoId> = (0..3).map(|_| PoId::generate()).collect();
        for id in &ids {
            assert!(id.as_str().starts_with("PO-"));
            assert_eq!(id.as_str().len(), "PO-".len() + 14 + 1 + 4);
        }
        assert!(ids.windows(2).any(|pair| pair[0] != pair[1]));
    }
}
