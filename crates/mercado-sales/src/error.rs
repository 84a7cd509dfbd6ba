//! # Stock Ledger Errors

use mercado_core::{CoreError, StoreError};
use thiserror::Error;

/// Why a stock adjustment was refused or could not be written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Stock not configured for product {product_id}")]
    StockNotConfigured { product_id: String },

    /// Conflicts that outlived every retry end up here too.
    #[error("Stock write failed: {0}")]
    Store(#[from] StoreError),
}

impl From<StockError> for CoreError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::ProductNotFound(id) => CoreError::ProductNotFound(id),
            StockError::InsufficientStock {
                product_id,
                available,
                requested,
            } => CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StockError::StockNotConfigured { product_id } => {
                CoreError::StockNotConfigured { product_id }
            }
            StockError::Store(e) => CoreError::Store(e),
        }
    }
}

pub type StockResult<T> = Result<T, StockError>;
