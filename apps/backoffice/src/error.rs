//! # API Error Type
//!
//! What a back-office caller sees when a command fails.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError / DbError / ConfigError / bad arguments                      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ApiError { code, message }  ──► stderr as JSON, exit code 1            │
//! │                                                                         │
//! │  Infrastructure details are logged; the caller gets a generic message. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```json
//! {
//!   "code": "INSUFFICIENT_STOCK",
//!   "message": "Insufficient stock for leche-1l: 2 available, 3 requested"
//! }
//! ```

use serde::Serialize;
use tracing::error;

use crate::config::ConfigError;
use mercado_core::CoreError;
use mercado_db::DbError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    InsufficientStock,
    StockNotConfigured,
    DatabaseError,
    Timeout,
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::Invalid(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    product_id, available, requested
                ),
            ),
            CoreError::StockNotConfigured { product_id } => ApiError::new(
                ErrorCode::StockNotConfigured,
                format!("Stock is not tracked for product {}", product_id),
            ),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
            CoreError::Store(e) => {
                error!("Sale operation failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Sale could not be saved, nothing was changed")
            }
            CoreError::TimedOut => ApiError::new(
                ErrorCode::Timeout,
                "Sale operation timed out, nothing was changed",
            ),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use mercado_core::{StoreError, ValidationError};

    #[test]
    fn test_business_errors_keep_detail() {
        let err = ApiError::from(CoreError::InsufficientStock {
            product_id: "leche".into(),
            available: 2,
            requested: 3,
        });
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("2 available, 3 requested"));
    }

    #[test]
    fn test_infrastructure_errors_are_generic() {
        let err = ApiError::from(CoreError::Store(StoreError::Backend("disk I/O error at page 7".into())));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("page 7"));

        assert_eq!(ApiError::from(CoreError::TimedOut).code, ErrorCode::Timeout);
    }

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::from(CoreError::Validation(ValidationError::Required {
            field: "line_items".into(),
        }));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["message"].as_str().unwrap().contains("line_items"));
    }
}
