//! # Error Types
//!
//! Domain-specific error types for mercado-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  ├── CoreError        - Sale engine errors (what callers match on)     │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── StoreError       - Infrastructure failures behind the ports       │
//! │                                                                         │
//! │  mercado-sales errors                                                  │
//! │  └── StockError       - Stock ledger failures (→ CoreError)            │
//! │                                                                         │
//! │  mercado-db errors                                                     │
//! │  └── DbError          - Database operation failures (→ StoreError)     │
//! │                                                                         │
//! │  Back-office errors (in app)                                           │
//! │  └── ApiError         - What the caller sees (serialized)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//! ```text
//!  not found       CustomerNotFound, ProductNotFound, SaleNotFound
//!  business rule   InsufficientStock, StockNotConfigured, Validation
//!  infrastructure  Store(..), TimedOut
//! ```
//! Every variant is returned only after the operation's stock changes have
//! been compensated; callers never need to clean up.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Sale engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// A decrement would take stock below zero.
    ///
    /// ```text
    /// Sell (qty: 3)
    ///      │
    ///      ▼
    /// Check stock: available=2
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: "leche-1l", available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 left of leche-1l"
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The product's stock was never set, so nothing can be sold.
    #[error("Stock not configured for product {product_id}")]
    StockNotConfigured { product_id: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Datastore unreachable, unresolved write conflict, failed commit.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The operation exceeded its deadline and was rolled back.
    #[error("Operation timed out")]
    TimedOut,
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::CustomerNotFound(_) | CoreError::ProductNotFound(_) | CoreError::SaleNotFound(_)
        )
    }

    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientStock { .. }
                | CoreError::StockNotConfigured { .. }
                | CoreError::Validation(_)
        )
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CoreError::Store(_) | CoreError::TimedOut)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any stock is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed coordinate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Store Error
// =============================================================================

/// Failures reported by a storage collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A conditional stock write found a different value than expected.
    #[error("Concurrent stock update on product {product_id}")]
    Conflict { product_id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store failure: {0}")]
    Backend(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "leche-1l".to_string(),
            available: 2,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for leche-1l: available 2, requested 3"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(core_err.is_business_rule());
    }

    #[test]
    fn test_classification() {
        assert!(CoreError::SaleNotFound("s".into()).is_not_found());
        assert!(CoreError::StockNotConfigured { product_id: "p".into() }.is_business_rule());
        assert!(CoreError::TimedOut.is_infrastructure());

        let conflict: CoreError = StoreError::Conflict { product_id: "p".into() }.into();
        assert!(conflict.is_infrastructure());
        assert!(!conflict.is_not_found());
    }
}
