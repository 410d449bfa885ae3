//! Decimal totals engine: line totals and document totals.
//!
//! All money values are fixed-point with 2 fractional digits. Document totals
//! are a pure function of the (non-deleted) line set, so recomputing them any
//! number of times over unchanged lines yields identical values.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fractional digits for money columns.
pub const MONEY_DP: u32 = 2;

/// Round to money precision the same way a NUMERIC(12,2) column does on
/// write: midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total: quantity x unit price, minus the percentage discount, rounded
/// to money precision.
pub fn line_total(quantity: Decimal, unit_price: Decimal, discount_percent: Decimal) -> Decimal {
    let gross = quantity * unit_price;
    let discount = gross * discount_percent / Decimal::ONE_HUNDRED;
    round_money(gross - discount)
}

/// Derived document totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl DocumentTotals {
    pub const ZERO: DocumentTotals = DocumentTotals {
        subtotal: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        total: Decimal::ZERO,
    };
}

/// Document totals from already-rounded line totals and the document tax
/// rate (a percentage).
pub fn document_totals<I>(line_totals: I, tax_rate: Decimal) -> DocumentTotals
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal: Decimal = line_totals.into_iter().sum();
    let tax_amount = round_money(subtotal * tax_rate / Decimal::ONE_HUNDRED);
    DocumentTotals {
        subtotal,
        tax_amount,
        total: subtotal + tax_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn line_total_without_discount() {
        assert_eq!(line_total(dec("2"), dec("50.00"), Decimal::ZERO), dec("100.00"));
    }

    #[test]
    fn line_total_applies_percentage_discount() {
        // 2 x 100.00 = 200.00, minus 10% = 180.00
        assert_eq!(line_total(dec("2"), dec("100.00"), dec("10")), dec("180.00"));
    }

    #[test]
    fn line_total_rounds_fractional_quantities() {
        // 1.333 x 9.99 = 13.31667 -> 13.32
        assert_eq!(line_total(dec("1.333"), dec("9.99"), Decimal::ZERO), dec("13.32"));
    }

    #[test]
    fn document_totals_sum_and_tax() {
        let totals = document_totals([dec("100.00"), dec("100.00")], dec("21.00"));
        assert_eq!(totals.subtotal, dec("200.00"));
        assert_eq!(totals.tax_amount, dec("42.00"));
        assert_eq!(totals.total, dec("242.00"));
    }

    #[test]
    fn document_totals_of_empty_line_set_are_zero() {
        let totals = document_totals([], dec("21.00"));
        assert_eq!(totals, DocumentTotals::ZERO);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let lines = [dec("19.37"), dec("0.01"), dec("1250.00")];
        let first = document_totals(lines, dec("21.00"));
        let second = document_totals(lines, dec("21.00"));
        assert_eq!(first, second);
        assert_eq!(first.total, first.subtotal + first.tax_amount);
    }

    proptest! {
        #[test]
        fn line_total_has_money_precision(
            qty in 0i64..100_000,
            price_cents in 0i64..10_000_000,
            discount_bp in 0i64..10_000,
        ) {
            let total = line_total(
                Decimal::new(qty, 3),
                Decimal::new(price_cents, 2),
                Decimal::new(discount_bp, 2),
            );
            prop_assert!(total.scale() <= MONEY_DP);
            prop_assert!(total >= Decimal::ZERO);
        }

        #[test]
        fn totals_are_stable_under_recomputation(
            cents in proptest::collection::vec(0i64..100_000_000, 0..20),
            rate_bp in 0i64..5_000,
        ) {
            let line_totals: Vec<Decimal> =
                cents.iter().map(|c| Decimal::new(*c, 2)).collect();
            let rate = Decimal::new(rate_bp, 2);
            let first = document_totals(line_totals.clone(), rate);
            let second = document_totals(line_totals, rate);
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.total, first.subtotal + first.tax_amount);
        }
    }
}
