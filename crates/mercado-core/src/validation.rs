//! # Validation Module
//!
//! Input validation for the back-office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Back-office command (Rust)                                   │
//! │  ├── Argument parsing                                                  │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │        (runs before any stock is touched)                  │
//! │           ▼                                                             │
//! │  Layer 2: Stock ledger                                                 │
//! │  └── stock never below zero                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (price >= 0, stock >= 0, quantity > 0)          │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::types::{LineItemRequest, SaleRequest};
//! use mercado_core::validation::validate_sale_request;
//!
//! let request = SaleRequest::new("cust-1", vec![LineItemRequest::new("prod-1", 2)]);
//! assert!(validate_sale_request(&request).is_ok());
//!
//! let empty = SaleRequest::new("cust-1", vec![]);
//! assert!(validate_sale_request(&empty).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::SaleRequest;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity identifier (non-empty after trimming).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category or customer).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Line-item quantities must be strictly positive.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use mercado_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Administrative stock takes may set zero but never a negative count.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a WGS84 coordinate pair.
pub fn validate_coordinates(lat: f64, lng: f64) -> ValidationResult<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidFormat {
            field: "lat".to_string(),
            reason: "must be between -90 and 90".to_string(),
        });
    }

    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::InvalidFormat {
            field: "lng".to_string(),
            reason: "must be between -180 and 180".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Sale Request
// =============================================================================

/// Validates a sale create/update request.
///
/// ## Rules
/// - customer id is non-empty
/// - at least one line item
/// - every product id is non-empty
/// - every quantity > 0
/// - every supplied unit price >= 0
pub fn validate_sale_request(request: &SaleRequest) -> ValidationResult<()> {
    validate_id("customer_id", &request.customer_id)?;

    if request.line_items.is_empty() {
        return Err(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }

    for item in &request.line_items {
        validate_id("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
        if let Some(price) = item.unit_price_cents {
            validate_price_cents(price)?;
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LineItemRequest;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Leche entera 1L").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_stock() {
        assert!(validate_stock(0).is_ok());
        assert!(matches!(
            validate_stock(-1),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "stock"
        ));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(5000).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_sale_request() {
        let ok = SaleRequest::new(
            "cust",
            vec![
                LineItemRequest::new("p", 1),
                LineItemRequest::new("q", 2).with_price(0),
            ],
        );
        assert!(validate_sale_request(&ok).is_ok());

        let no_customer = SaleRequest::new(" ", vec![LineItemRequest::new("p", 1)]);
        assert_eq!(
            validate_sale_request(&no_customer),
            Err(ValidationError::Required {
                field: "customer_id".into()
            })
        );

        let empty = SaleRequest::new("cust", vec![]);
        assert!(validate_sale_request(&empty).is_err());

        let zero_qty = SaleRequest::new("cust", vec![LineItemRequest::new("p", 0)]);
        assert!(matches!(
            validate_sale_request(&zero_qty),
            Err(ValidationError::MustBePositive { .. })
        ));

        let negative_price =
            SaleRequest::new("cust", vec![LineItemRequest::new("p", 1).with_price(-1)]);
        assert!(validate_sale_request(&negative_price).is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(-17.7833, -63.1821).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
    }
}
