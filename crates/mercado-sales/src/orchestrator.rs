//! # Sale Transaction Orchestrator
//!
//! Runs sale create/update/delete as one all-or-nothing operation over
//! stock and the sale record.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate request                     (no side effects on failure)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock sale:{id}  ──► find sale ──► lock product:{id}... (sorted)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  begin unit ──► steps ─────────────┬── Ok ──► commit                    │
//! │                 (every stock       │                                    │
//! │                  change journaled) └── Err / timeout                    │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                              replay journal newest-first                │
//! │                              rollback ──► original error                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Steps
//! ```text
//! create   customer ─► for each item: product ─► price line ─► take stock
//!          ─► total ─► save
//! update   reload sale ─► customer ─► restore previous items
//!          ─► take stock for new items ─► total ─► save (id, created_at,
//!          payment and delivery kept)
//! delete   reload sale ─► restore every item ─► delete record
//! ```
//!
//! The deadline from [`EngineConfig::operation_timeout`] covers lock waits,
//! the sale lookup and the steps. Compensation itself is never cut short.

use std::future::Future;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::ledger::{StockJournal, StockLedger};
use crate::locks::{product_key, sale_key, LockGuard, LockSet};
use mercado_core::pricing::{add_to_total, price_line};
use mercado_core::store::{Catalog, Customers, SaleRecords, UnitOfWork, UnitOfWorkFactory};
use mercado_core::validation::{validate_id, validate_sale_request};
use mercado_core::{CoreError, CoreResult, Money, PaymentInfo, Sale, SaleRequest};

// =============================================================================
// Orchestrator
// =============================================================================

pub struct SaleOrchestrator<F: UnitOfWorkFactory> {
    factory: F,
    ledger: StockLedger,
    locks: LockSet,
    config: EngineConfig,
}

impl<F: UnitOfWorkFactory> SaleOrchestrator<F> {
    pub fn new(factory: F, config: EngineConfig) -> Self {
        SaleOrchestrator {
            factory,
            ledger: StockLedger::new(config.stock_write_retries),
            locks: LockSet::new(),
            config,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Records a new sale, taking stock for every line item.
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, items = request.line_items.len())
    )]
    pub async fn create_sale(&self, request: SaleRequest) -> CoreResult<Sale> {
        validate_sale_request(&request)?;
        let deadline = self.deadline();

        let _products = self.lock_products(deadline, request.product_ids()).await?;
        let mut unit = self.begin(deadline).await?;
        let mut journal = StockJournal::new();

        let outcome = bounded(deadline, self.create_steps(&mut unit, &mut journal, &request)).await;
        let sale = self.settle(unit, journal, outcome).await?;

        info!(sale_id = %sale.id, total_cents = sale.total_cents, "Sale created");
        Ok(sale)
    }

    /// Replaces the customer, date and line items of an existing sale.
    ///
    /// Stock for the previous items is restored and stock for the new items
    /// taken within the same operation.
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, items = request.line_items.len())
    )]
    pub async fn update_sale(&self, sale_id: &str, request: SaleRequest) -> CoreResult<Sale> {
        validate_id("sale_id", sale_id)?;
        validate_sale_request(&request)?;
        let deadline = self.deadline();

        let _sale = self.lock_sale(deadline, sale_id).await?;
        let existing = self.find_sale(deadline, sale_id).await?;

        let mut product_ids = existing.product_ids();
        product_ids.extend(request.product_ids());
        let _products = self.lock_products(deadline, product_ids).await?;

        let mut unit = self.begin(deadline).await?;
        let mut journal = StockJournal::new();

        let outcome = bounded(
            deadline,
            self.update_steps(&mut unit, &mut journal, sale_id, &request),
        )
        .await;
        let sale = self.settle(unit, journal, outcome).await?;

        info!(sale_id = %sale.id, total_cents = sale.total_cents, "Sale updated");
        Ok(sale)
    }

    /// Removes a sale and returns its stock. Returns the sale as it was.
    #[instrument(skip(self))]
    pub async fn delete_sale(&self, sale_id: &str) -> CoreResult<Sale> {
        validate_id("sale_id", sale_id)?;
        let deadline = self.deadline();

        let _sale = self.lock_sale(deadline, sale_id).await?;
        let existing = self.find_sale(deadline, sale_id).await?;
        let _products = self.lock_products(deadline, existing.product_ids()).await?;

        let mut unit = self.begin(deadline).await?;
        let mut journal = StockJournal::new();

        let outcome = bounded(deadline, self.delete_steps(&mut unit, &mut journal, sale_id)).await;
        let sale = self.settle(unit, journal, outcome).await?;

        info!(sale_id = %sale.id, restored_items = sale.line_items.len(), "Sale deleted");
        Ok(sale)
    }

    // =========================================================================
    // Steps
    // =========================================================================

    async fn create_steps(
        &self,
        unit: &mut F::Unit,
        journal: &mut StockJournal,
        request: &SaleRequest,
    ) -> CoreResult<Sale> {
        self.resolve_customer(unit, &request.customer_id).await?;
        let line_items = self.take_stock(unit, journal, request).await?;

        let now = Utc::now();
        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id.clone(),
            sold_at: request.sold_at.unwrap_or(now),
            total_cents: 0,
            line_items,
            payment: PaymentInfo::default(),
            delivery: None,
            created_at: now,
            updated_at: now,
        };
        sale.recompute_total()?;

        debug!(sale_id = %sale.id, total_cents = sale.total_cents, "Saving sale");
        Ok(unit.save_sale(&sale).await?)
    }

    async fn update_steps(
        &self,
        unit: &mut F::Unit,
        journal: &mut StockJournal,
        sale_id: &str,
        request: &SaleRequest,
    ) -> CoreResult<Sale> {
        let previous = unit
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        // Before any stock moves, so an unknown customer changes nothing
        self.resolve_customer(unit, &request.customer_id).await?;

        self.restore_stock(unit, journal, &previous).await?;
        let line_items = self.take_stock(unit, journal, request).await?;

        let mut sale = Sale {
            customer_id: request.customer_id.clone(),
            sold_at: request.sold_at.unwrap_or(previous.sold_at),
            line_items,
            updated_at: Utc::now(),
            ..previous
        };
        sale.recompute_total()?;

        debug!(sale_id, total_cents = sale.total_cents, "Saving sale");
        Ok(unit.save_sale(&sale).await?)
    }

    async fn delete_steps(
        &self,
        unit: &mut F::Unit,
        journal: &mut StockJournal,
        sale_id: &str,
    ) -> CoreResult<Sale> {
        let sale = unit
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        self.restore_stock(unit, journal, &sale).await?;

        if !unit.delete_sale(sale_id).await? {
            return Err(CoreError::SaleNotFound(sale_id.to_string()));
        }

        Ok(sale)
    }

    async fn resolve_customer(&self, unit: &mut F::Unit, customer_id: &str) -> CoreResult<()> {
        match unit.get_customer(customer_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::CustomerNotFound(customer_id.to_string())),
        }
    }

    /// Prices each requested item and then decrements its stock, in request
    /// order.
    ///
    /// An item whose subtotal, or the running total, does not fit in cents
    /// is rejected before its stock is touched.
    async fn take_stock(
        &self,
        unit: &mut F::Unit,
        journal: &mut StockJournal,
        request: &SaleRequest,
    ) -> CoreResult<Vec<mercado_core::LineItem>> {
        let mut line_items = Vec::with_capacity(request.line_items.len());
        let mut running_total = Money::zero();

        for item in &request.line_items {
            let product = unit
                .get_product(&item.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

            let unit_price = item
                .unit_price_cents
                .map(Money::from_cents)
                .unwrap_or_else(|| product.price());
            let line = price_line(item.product_id.clone(), item.quantity, unit_price)?;
            running_total = add_to_total(running_total, line.subtotal())?;

            let adjustment = self
                .ledger
                .apply_delta(&mut *unit, &item.product_id, -item.quantity)
                .await?;
            journal.record(adjustment);

            debug!(
                product_id = %item.product_id,
                quantity = item.quantity,
                unit_price_cents = unit_price.cents(),
                "Line item priced"
            );
            line_items.push(line);
        }

        Ok(line_items)
    }

    async fn restore_stock(
        &self,
        unit: &mut F::Unit,
        journal: &mut StockJournal,
        sale: &Sale,
    ) -> CoreResult<()> {
        for item in &sale.line_items {
            let adjustment = self
                .ledger
                .apply_delta(&mut *unit, &item.product_id, item.quantity)
                .await?;
            journal.record(adjustment);
        }
        Ok(())
    }

    // =========================================================================
    // Scaffolding
    // =========================================================================

    fn deadline(&self) -> Option<Instant> {
        self.config.operation_timeout.map(|timeout| Instant::now() + timeout)
    }

    async fn lock_sale(&self, deadline: Option<Instant>, sale_id: &str) -> CoreResult<LockGuard> {
        bounded(deadline, async { Ok(self.locks.acquire([sale_key(sale_id)]).await) }).await
    }

    async fn lock_products(
        &self,
        deadline: Option<Instant>,
        product_ids: Vec<String>,
    ) -> CoreResult<LockGuard> {
        let keys: Vec<String> = product_ids.iter().map(|id| product_key(id)).collect();
        bounded(deadline, async { Ok(self.locks.acquire(keys).await) }).await
    }

    async fn find_sale(&self, deadline: Option<Instant>, sale_id: &str) -> CoreResult<Sale> {
        bounded(deadline, async { Ok(self.factory.find_sale(sale_id).await?) })
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))
    }

    async fn begin(&self, deadline: Option<Instant>) -> CoreResult<F::Unit> {
        bounded(deadline, async { Ok(self.factory.begin().await?) }).await
    }

    /// Commits on success. On failure replays the journal, rolls back and
    /// returns the failure unchanged.
    async fn settle<T>(
        &self,
        mut unit: F::Unit,
        mut journal: StockJournal,
        outcome: CoreResult<T>,
    ) -> CoreResult<T> {
        let err = match outcome {
            Ok(value) => {
                return match unit.commit().await {
                    Ok(()) => Ok(value),
                    Err(e) => {
                        error!(error = %e, "Commit failed");
                        Err(e.into())
                    }
                };
            }
            Err(err) => err,
        };

        if err.is_infrastructure() {
            error!(error = %err, adjustments = journal.len(), "Sale operation failed, compensating");
        } else {
            warn!(error = %err, adjustments = journal.len(), "Sale operation rejected, compensating");
        }

        match journal.compensate(&self.ledger, &mut unit).await {
            Ok(reversed) => debug!(reversed, "Stock compensated"),
            Err(e) => error!(error = %e, remaining = journal.len(), "Compensation incomplete"),
        }

        if let Err(e) = unit.rollback().await {
            error!(error = %e, "Rollback failed");
        }

        Err(err)
    }
}

/// Runs `fut` until `deadline`, mapping expiry to [`CoreError::TimedOut`].
async fn bounded<T, Fut>(deadline: Option<Instant>, fut: Fut) -> CoreResult<T>
where
    Fut: Future<Output = CoreResult<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .unwrap_or_else(|_| Err(CoreError::TimedOut)),
        None => fut.await,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use mercado_core::{LineItemRequest, ValidationError};

    async fn engine() -> SaleOrchestrator<MemoryStore> {
        let store = MemoryStore::new();
        store.add_customer("c1", "Ana").await;
        store.add_product("p1", 250, Some(10)).await;
        store.add_product("p2", 1000, Some(3)).await;
        SaleOrchestrator::new(store, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_create_prices_from_catalog_and_request() {
        let engine = engine().await;

        let sale = engine
            .create_sale(SaleRequest::new(
                "c1",
                vec![
                    LineItemRequest::new("p1", 4),
                    LineItemRequest::new("p2", 1).with_price(900),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(sale.line_items[0].unit_price_cents, 250);
        assert_eq!(sale.line_items[1].unit_price_cents, 900);
        assert_eq!(sale.total_cents, 1900);
        assert!(sale.is_consistent());
        assert_eq!(engine.factory().stock_of("p1").await, Some(6));
        assert_eq!(engine.factory().stock_of("p2").await, Some(2));
    }

    #[tokio::test]
    async fn test_invalid_request_has_no_side_effects() {
        let engine = engine().await;

        let err = engine
            .create_sale(SaleRequest::new("c1", vec![LineItemRequest::new("p1", 0)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustBePositive { .. })
        ));
        assert!(engine.factory().stock_writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_sold_at_when_absent() {
        let engine = engine().await;
        let sold_at = Utc::now() - chrono::Duration::days(2);

        let sale = engine
            .create_sale(SaleRequest::new("c1", vec![LineItemRequest::new("p1", 1)]).sold_at(sold_at))
            .await
            .unwrap();
        let updated = engine
            .update_sale(&sale.id, SaleRequest::new("c1", vec![LineItemRequest::new("p1", 2)]))
            .await
            .unwrap();

        assert_eq!(updated.sold_at, sold_at);
        assert_eq!(updated.created_at, sale.created_at);
        assert_eq!(engine.factory().stock_of("p1").await, Some(8));
    }

    #[tokio::test]
    async fn test_delete_unknown_sale() {
        let engine = engine().await;
        assert_eq!(
            engine.delete_sale("nope").await.unwrap_err(),
            CoreError::SaleNotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_nothing_behind() {
        let engine = engine().await;
        engine.factory().fail_next_commit().await;

        let err = engine
            .create_sale(SaleRequest::new("c1", vec![LineItemRequest::new("p1", 1)]))
            .await
            .unwrap_err();

        assert!(err.is_infrastructure());
        assert_eq!(engine.factory().stock_of("p1").await, Some(10));
        assert_eq!(engine.factory().sale_count().await, 0);
    }
}
