//! Currency display helpers.
//!
//! All costs use exact decimal arithmetic; these helpers only normalize
//! for display. Comparisons elsewhere are exact, never tolerance-based.

use rust_decimal::Decimal;

/// Normalize a monetary amount to two-place currency precision.
pub fn to_currency(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Render an amount as pounds sterling, e.g. `£45.00`.
pub fn format_gbp(amount: Decimal) -> String {
    format!("£{:.2}", amount.round_dp(2))
}
