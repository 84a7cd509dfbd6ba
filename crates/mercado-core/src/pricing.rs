//! # Pricing
//!
//! Line subtotals and sale totals.
//!
//! ```text
//!   subtotal(li) = li.quantity × li.unit_price
//!   total(sale)  = Σ subtotal(li)   for li in sale.line_items
//! ```
//!
//! Called after every change to a sale's line-item set, before persisting.
//! The only failure is an amount that does not fit in `i64` cents, reported
//! as [`ValidationError::OutOfRange`] so it is rejected like any other bad
//! input.

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::LineItem;
use crate::validation::ValidationResult;

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// `quantity × unit_price`
#[inline]
pub fn subtotal(quantity: i64, unit_price: Money) -> ValidationResult<Money> {
    unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| out_of_range("subtotal"))
}

/// Adds one more subtotal to a running total.
#[inline]
pub fn add_to_total(total: Money, subtotal: Money) -> ValidationResult<Money> {
    total.checked_add(subtotal).ok_or_else(|| out_of_range("total"))
}

/// Sum of the line subtotals. An empty slice totals zero.
pub fn total(line_items: &[LineItem]) -> ValidationResult<Money> {
    line_items.iter().try_fold(Money::zero(), |acc, li| {
        add_to_total(acc, subtotal(li.quantity, li.unit_price())?)
    })
}

/// Builds a line item with its subtotal filled in.
pub fn price_line(
    product_id: impl Into<String>,
    quantity: i64,
    unit_price: Money,
) -> ValidationResult<LineItem> {
    Ok(LineItem {
        product_id: product_id.into(),
        quantity,
        unit_price_cents: unit_price.cents(),
        subtotal_cents: subtotal(quantity, unit_price)?.cents(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtotal() {
        assert_eq!(subtotal(3, Money::from_cents(1050)), Ok(Money::from_cents(3150)));
        assert_eq!(subtotal(7, Money::zero()), Ok(Money::zero()));
    }

    #[test]
    fn test_total_of_lines() {
        let lines = vec![
            price_line("arroz", 2, Money::from_cents(1200)).unwrap(),
            price_line("aceite", 1, Money::from_cents(2350)).unwrap(),
            price_line("pan", 6, Money::from_cents(50)).unwrap(),
        ];
        assert_eq!(total(&lines).unwrap().cents(), 2400 + 2350 + 300);
    }

    #[test]
    fn test_total_ignores_stored_subtotal() {
        let mut line = price_line("p", 2, Money::from_cents(100)).unwrap();
        line.subtotal_cents = 999;
        assert_eq!(total(&[line]).unwrap().cents(), 200);
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert!(total(&[]).unwrap().is_zero());
    }

    #[test]
    fn test_overflow_is_out_of_range() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert!(matches!(
            price_line("p", 2, huge),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "subtotal"
        ));

        let lines = vec![
            price_line("p", 1, huge).unwrap(),
            price_line("q", 1, huge).unwrap(),
        ];
        assert!(matches!(
            total(&lines),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "total"
        ));
    }
}
