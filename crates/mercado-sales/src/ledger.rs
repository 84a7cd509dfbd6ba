//! # Stock Ledger
//!
//! The only code path that changes `Product.stock` on behalf of a sale.
//!
//! ## apply_delta
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_delta(product, delta)                                            │
//! │                                                                         │
//! │   read product ──► stock unset?  delta < 0 → StockNotConfigured         │
//! │        ▲                          delta > 0 → treat as 0                │
//! │        │         stock + delta < 0?         → InsufficientStock         │
//! │        │                                      (nothing written)         │
//! │        │         set_stock(expected = stock, new = stock + delta)       │
//! │        │              │                                                 │
//! │        └── Conflict ──┤ (retry, up to max_retries)                      │
//! │                       ▼                                                 │
//! │                StockAdjustment { delta, applied: true }                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## StockJournal
//! Every applied adjustment of one operation is recorded in order. On
//! failure the journal is replayed newest-first with negated deltas. Each
//! entry leaves the journal once reversed, so nothing is reversed twice.

use tracing::{debug, error, warn};

use crate::error::{StockError, StockResult};
use mercado_core::store::Catalog;
use mercado_core::{StockAdjustment, StoreError};

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone)]
pub struct StockLedger {
    max_retries: u32,
}

impl StockLedger {
    pub fn new(max_retries: u32) -> Self {
        StockLedger { max_retries }
    }

    /// Applies `delta` to the product's stock with a conditional write.
    ///
    /// Decrements are validated against the stock read in the same attempt;
    /// increments always pass validation.
    pub async fn apply_delta<C>(
        &self,
        catalog: &mut C,
        product_id: &str,
        delta: i64,
    ) -> StockResult<StockAdjustment>
    where
        C: Catalog + ?Sized,
    {
        let mut attempt: u32 = 0;

        loop {
            let product = catalog
                .get_product(product_id)
                .await?
                .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))?;

            let new_stock = match product.stock {
                None if delta < 0 => {
                    return Err(StockError::StockNotConfigured {
                        product_id: product_id.to_string(),
                    })
                }
                None => delta,
                Some(current) if current + delta < 0 => {
                    return Err(StockError::InsufficientStock {
                        product_id: product_id.to_string(),
                        available: current,
                        requested: -delta,
                    })
                }
                Some(current) => current.checked_add(delta).ok_or_else(|| {
                    StoreError::Backend(format!("stock overflow on product {product_id}"))
                })?,
            };

            match catalog.set_stock(product_id, product.stock, new_stock).await {
                Ok(()) => {
                    debug!(
                        product_id,
                        delta,
                        from = ?product.stock,
                        to = new_stock,
                        "Stock adjusted"
                    );
                    return Ok(StockAdjustment {
                        product_id: product_id.to_string(),
                        delta,
                        applied: true,
                    });
                }
                Err(StoreError::Conflict { .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(product_id, attempt, "Stock write conflict, retrying");
                }
                Err(e) => {
                    if matches!(e, StoreError::Conflict { .. }) {
                        warn!(product_id, attempts = attempt + 1, "Stock write conflict not resolved");
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

// =============================================================================
// Journal
// =============================================================================

/// The adjustments applied so far within one operation.
#[derive(Debug, Default)]
pub struct StockJournal {
    entries: Vec<StockAdjustment>,
}

impl StockJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, adjustment: StockAdjustment) {
        if adjustment.applied {
            self.entries.push(adjustment);
        }
    }

    pub fn entries(&self) -> &[StockAdjustment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reverses every recorded adjustment, newest first.
    ///
    /// Stops at the first reversal that fails; that entry and the older ones
    /// stay recorded. Returns how many adjustments were reversed.
    pub async fn compensate<C>(&mut self, ledger: &StockLedger, catalog: &mut C) -> StockResult<usize>
    where
        C: Catalog + ?Sized,
    {
        let mut reversed = 0;

        while let Some(entry) = self.entries.last() {
            let reversal = entry.reversal();

            if let Err(e) = ledger
                .apply_delta(catalog, &reversal.product_id, reversal.delta)
                .await
            {
                error!(
                    product_id = %reversal.product_id,
                    delta = reversal.delta,
                    error = %e,
                    "Compensating stock write failed"
                );
                return Err(e);
            }

            self.entries.pop();
            reversed += 1;
        }

        Ok(reversed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
