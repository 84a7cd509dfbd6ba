//! # In-Memory Store
//!
//! An implementation of the storage ports kept entirely in memory, used to
//! exercise the sale engine without a database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MemoryMode::Transactional                                              │
//! │     unit writes are staged; commit() checks every staged stock value   │
//! │     against what it was based on, then applies all or nothing          │
//! │                                                                         │
//! │  MemoryMode::WriteThrough                                               │
//! │     unit writes land immediately; commit()/rollback() do nothing,       │
//! │     so undoing work relies on the engine's compensation journal         │
//! │                                                                         │
//! │  Faults (one-shot unless noted)                                         │
//! │     fail_next_save            save_sale → Unavailable                   │
//! │     fail_stock_write_after(n) the (n+1)th stock write → Unavailable     │
//! │     inject_conflicts(id, n)   next n writes of id → Conflict            │
//! │     set_stock_write_delay(d)  every stock write sleeps d first          │
//! │     fail_next_commit          commit → Unavailable (transactional only) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use mercado_core::store::{Catalog, Customers, SaleRecords, UnitOfWork, UnitOfWorkFactory};
use mercado_core::{Customer, Product, Sale, StoreError, StoreResult};

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Transactional,
    WriteThrough,
}

/// A stock write accepted by a unit, committed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockWrite {
    pub product_id: String,
    pub from: Option<i64>,
    pub to: i64,
}

impl StockWrite {
    pub fn delta(&self) -> i64 {
        self.to - self.from.unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_save: bool,
    fail_next_commit: bool,
    stock_writes_until_failure: Option<usize>,
    conflicts: HashMap<String, u32>,
    stock_write_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<String, Product>,
    customers: HashMap<String, Customer>,
    sales: HashMap<String, Sale>,
    stock_writes: Vec<StockWrite>,
    faults: Faults,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    mode: MemoryMode,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_mode(MemoryMode::Transactional)
    }

    pub fn write_through() -> Self {
        Self::with_mode(MemoryMode::WriteThrough)
    }

    pub fn with_mode(mode: MemoryMode) -> Self {
        MemoryStore {
            mode,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    pub async fn insert_product(&self, product: Product) {
        self.state
            .lock()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    pub async fn add_product(&self, id: &str, price_cents: i64, stock: Option<i64>) {
        let now = Utc::now();
        self.insert_product(Product {
            id: id.to_string(),
            category_id: None,
            name: format!("Product {id}"),
            description: None,
            image_url: None,
            price_cents,
            stock,
            created_at: now,
            updated_at: now,
        })
        .await;
    }

    pub async fn insert_customer(&self, customer: Customer) {
        self.state
            .lock()
            .await
            .customers
            .insert(customer.id.clone(), customer);
    }

    pub async fn add_customer(&self, id: &str, name: &str) {
        let now = Utc::now();
        self.insert_customer(Customer {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            phone: None,
            created_at: now,
            updated_at: now,
        })
        .await;
    }

    /// Changes a product's price without touching its stock.
    pub async fn set_price(&self, id: &str, price_cents: i64) {
        if let Some(product) = self.state.lock().await.products.get_mut(id) {
            product.price_cents = price_cents;
        }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub async fn stock_of(&self, id: &str) -> Option<i64> {
        self.state
            .lock()
            .await
            .products
            .get(id)
            .and_then(|p| p.stock)
    }

    pub async fn sale(&self, id: &str) -> Option<Sale> {
        self.state.lock().await.sales.get(id).cloned()
    }

    pub async fn sale_count(&self) -> usize {
        self.state.lock().await.sales.len()
    }

    pub async fn stock_writes(&self) -> Vec<StockWrite> {
        self.state.lock().await.stock_writes.clone()
    }

    // -------------------------------------------------------------------------
    // Faults
    // -------------------------------------------------------------------------

    pub async fn fail_next_save(&self) {
        self.state.lock().await.faults.fail_next_save = true;
    }

    pub async fn fail_next_commit(&self) {
        self.state.lock().await.faults.fail_next_commit = true;
    }

    /// Lets `n` stock writes through, then fails the next one.
    pub async fn fail_stock_write_after(&self, n: usize) {
        self.state.lock().await.faults.stock_writes_until_failure = Some(n);
    }

    pub async fn inject_conflicts(&self, product_id: &str, n: u32) {
        self.state
            .lock()
            .await
            .faults
            .conflicts
            .insert(product_id.to_string(), n);
    }

    pub async fn set_stock_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.faults.stock_write_delay = delay;
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> StoreResult<MemoryUnit> {
        Ok(MemoryUnit {
            mode: self.mode,
            state: self.state.clone(),
            staged_stock: HashMap::new(),
            staged_sales: HashMap::new(),
        })
    }

    async fn find_sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        Ok(self.sale(id).await)
    }
}

// =============================================================================
// Unit
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct StagedStock {
    base: Option<i64>,
    value: i64,
}

/// Writes made by one operation. Staging is only used in transactional mode.
#[derive(Debug)]
pub struct MemoryUnit {
    mode: MemoryMode,
    state: Arc<Mutex<MemoryState>>,
    staged_stock: HashMap<String, StagedStock>,
    /// `None` marks a staged delete.
    staged_sales: HashMap<String, Option<Sale>>,
}

impl MemoryUnit {
    fn staged_sale(&self, state: &MemoryState, id: &str) -> Option<Sale> {
        match self.staged_sales.get(id) {
            Some(staged) => staged.clone(),
            None => state.sales.get(id).cloned(),
        }
    }
}

#[async_trait]
impl Catalog for MemoryUnit {
    async fn get_product(&mut self, id: &str) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        let mut product = state.products.get(id).cloned();

        if let (Some(product), Some(staged)) = (product.as_mut(), self.staged_stock.get(id)) {
            product.stock = Some(staged.value);
        }

        Ok(product)
    }

    async fn set_stock(&mut self, id: &str, expected: Option<i64>, new_stock: i64) -> StoreResult<()> {
        let delay = self.state.lock().await.faults.stock_write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;

        if let Some(left) = state.faults.stock_writes_until_failure {
            if left == 0 {
                state.faults.stock_writes_until_failure = None;
                return Err(StoreError::Unavailable(format!("stock write to {id} failed")));
            }
            state.faults.stock_writes_until_failure = Some(left - 1);
        }

        if let Some(remaining) = state.faults.conflicts.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Conflict {
                    product_id: id.to_string(),
                });
            }
        }

        let stored = match state.products.get(id) {
            Some(product) => product.stock,
            None => return Err(StoreError::Backend(format!("Product not found: {id}"))),
        };
        let current = match self.staged_stock.get(id) {
            Some(staged) => Some(staged.value),
            None => stored,
        };

        if current != expected {
            return Err(StoreError::Conflict {
                product_id: id.to_string(),
            });
        }

        state.stock_writes.push(StockWrite {
            product_id: id.to_string(),
            from: current,
            to: new_stock,
        });

        match self.mode {
            MemoryMode::WriteThrough => {
                if let Some(product) = state.products.get_mut(id) {
                    product.stock = Some(new_stock);
                    product.updated_at = Utc::now();
                }
            }
            MemoryMode::Transactional => {
                self.staged_stock
                    .entry(id.to_string())
                    .and_modify(|staged| staged.value = new_stock)
                    .or_insert(StagedStock {
                        base: stored,
                        value: new_stock,
                    });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Customers for MemoryUnit {
    async fn get_customer(&mut self, id: &str) -> StoreResult<Option<Customer>> {
        Ok(self.state.lock().await.customers.get(id).cloned())
    }
}

#[async_trait]
impl SaleRecords for MemoryUnit {
    async fn get_sale(&mut self, id: &str) -> StoreResult<Option<Sale>> {
        let state = self.state.lock().await;
        Ok(self.staged_sale(&state, id))
    }

    async fn save_sale(&mut self, sale: &Sale) -> StoreResult<Sale> {
        let mut state = self.state.lock().await;

        if state.faults.fail_next_save {
            state.faults.fail_next_save = false;
            return Err(StoreError::Unavailable(format!("saving sale {} failed", sale.id)));
        }

        let mut stored = sale.clone();
        if let Some(existing) = self.staged_sale(&state, &sale.id) {
            stored.payment = existing.payment;
            stored.delivery = existing.delivery;
            stored.created_at = existing.created_at;
        }

        match self.mode {
            MemoryMode::WriteThrough => {
                state.sales.insert(stored.id.clone(), stored.clone());
            }
            MemoryMode::Transactional => {
                self.staged_sales
                    .insert(stored.id.clone(), Some(stored.clone()));
            }
        }

        Ok(stored)
    }

    async fn delete_sale(&mut self, id: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;

        if self.staged_sale(&state, id).is_none() {
            return Ok(false);
        }

        match self.mode {
            MemoryMode::WriteThrough => {
                state.sales.remove(id);
            }
            MemoryMode::Transactional => {
                self.staged_sales.insert(id.to_string(), None);
            }
        }

        Ok(true)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn commit(mut self) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        // Nothing is left to fail once writes have landed
        if self.mode == MemoryMode::WriteThrough {
            return Ok(());
        }

        if state.faults.fail_next_commit {
            state.faults.fail_next_commit = false;
            return Err(StoreError::Unavailable("commit failed".to_string()));
        }

        for (id, staged) in &self.staged_stock {
            let stored = state.products.get(id).and_then(|p| p.stock);
            if stored != staged.base {
                return Err(StoreError::Conflict {
                    product_id: id.clone(),
                });
            }
        }

        let now = Utc::now();
        for (id, staged) in self.staged_stock.drain() {
            if let Some(product) = state.products.get_mut(&id) {
                product.stock = Some(staged.value);
                product.updated_at = now;
            }
        }
        for (id, sale) in self.staged_sales.drain() {
            match sale {
                Some(sale) => {
                    state.sales.insert(id, sale);
                }
                None => {
                    state.sales.remove(&id);
                }
            }
        }

        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mercado_core::pricing::price_line;
    use mercado_core::{Money, PaymentStatus};

    fn sale(id: &str) -> Sale {
        let now = Utc::now();
        let mut sale = Sale {
            id: id.to_string(),
            customer_id: "c".into(),
            sold_at: now,
            total_cents: 0,
            line_items: vec![price_line("p", 1, Money::from_cents(100)).unwrap()],
            payment: Default::default(),
            delivery: None,
            created_at: now,
            updated_at: now,
        };
        sale.recompute_total().unwrap();
        sale
    }

    #[tokio::test]
    async fn test_transactional_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        store.add_product("p", 100, Some(5)).await;

        let mut unit = store.begin().await.unwrap();
        unit.set_stock("p", Some(5), 3).await.unwrap();
        unit.save_sale(&sale("s")).await.unwrap();

        assert_eq!(unit.get_product("p").await.unwrap().unwrap().stock, Some(3));
        assert_eq!(store.stock_of("p").await, Some(5));
        assert_eq!(store.sale_count().await, 0);

        unit.commit().await.unwrap();
        assert_eq!(store.stock_of("p").await, Some(3));
        assert_eq!(store.sale_count().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        store.add_product("p", 100, Some(5)).await;

        let mut unit = store.begin().await.unwrap();
        unit.set_stock("p", Some(5), 0).await.unwrap();
        unit.rollback().await.unwrap();

        assert_eq!(store.stock_of("p").await, Some(5));
    }

    #[tokio::test]
    async fn test_commit_detects_lost_update() {
        let store = MemoryStore::new();
        store.add_product("p", 100, Some(5)).await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.set_stock("p", Some(5), 4).await.unwrap();
        second.set_stock("p", Some(5), 3).await.unwrap();

        first.commit().await.unwrap();
        assert_eq!(
            second.commit().await,
            Err(StoreError::Conflict {
                product_id: "p".into()
            })
        );
        assert_eq!(store.stock_of("p").await, Some(4));
    }

    #[tokio::test]
    async fn test_write_through_applies_immediately() {
        let store = MemoryStore::write_through();
        store.add_product("p", 100, Some(5)).await;

        let mut unit = store.begin().await.unwrap();
        unit.set_stock("p", Some(5), 2).await.unwrap();
        assert_eq!(store.stock_of("p").await, Some(2));

        unit.rollback().await.unwrap();
        assert_eq!(store.stock_of("p").await, Some(2));
    }

    #[tokio::test]
    async fn test_save_keeps_payment_of_existing_sale() {
        let store = MemoryStore::write_through();
        let mut original = sale("s");
        original.payment.status = PaymentStatus::Paid;

        let mut unit = store.begin().await.unwrap();
        unit.save_sale(&original).await.unwrap();
        let saved = unit.save_sale(&sale("s")).await.unwrap();

        assert_eq!(saved.payment.status, PaymentStatus::Paid);
        assert_eq!(saved.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_one_shot_faults() {
        let store = MemoryStore::write_through();
        store.add_product("p", 100, Some(5)).await;
        store.fail_next_save().await;
        store.fail_stock_write_after(1).await;

        let mut unit = store.begin().await.unwrap();
        assert!(matches!(
            unit.save_sale(&sale("s")).await,
            Err(StoreError::Unavailable(_))
        ));
        unit.save_sale(&sale("s")).await.unwrap();

        unit.set_stock("p", Some(5), 4).await.unwrap();
        assert!(matches!(
            unit.set_stock("p", Some(4), 3).await,
            Err(StoreError::Unavailable(_))
        ));
        unit.set_stock("p", Some(4), 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_staged_delete() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        unit.save_sale(&sale("s")).await.unwrap();
        unit.commit().await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert!(unit.delete_sale("s").await.unwrap());
        assert!(unit.get_sale("s").await.unwrap().is_none());
        assert!(!unit.delete_sale("s").await.unwrap());
        assert!(store.sale("s").await.is_some());

        unit.commit().await.unwrap();
        assert!(store.sale("s").await.is_none());
    }
}
