//! Sale engine behaviour against an in-memory SQLite database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mercado_core::store::{Catalog, Customers, SaleRecords, UnitOfWork, UnitOfWorkFactory};
use mercado_core::{
    CoreError, Customer, LineItemRequest, PaymentStatus, Product, Sale, SaleRequest, StoreResult,
};
use mercado_db::{Database, DbConfig, SqliteStore, SqliteUnit};
use mercado_sales::{EngineConfig, SaleOrchestrator};
use tokio::sync::Notify;

struct Fixture {
    db: Database,
    engine: SaleOrchestrator<SqliteStore>,
}

impl Fixture {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        for (id, name) in [("ana", "Ana"), ("luis", "Luis")] {
            db.customers()
                .insert(&Customer {
                    id: id.to_string(),
                    name: name.to_string(),
                    email: None,
                    phone: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let engine = SaleOrchestrator::new(db.store(), EngineConfig::default());
        Fixture { db, engine }
    }

    async fn product(&self, id: &str, price_cents: i64, stock: Option<i64>) {
        let now = Utc::now();
        self.db
            .products()
            .insert(&Product {
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
            .await
            .unwrap();
    }

    async fn stock(&self, id: &str) -> Option<i64> {
        self.db.products().get_by_id(id).await.unwrap().unwrap().stock
    }
}

fn request(customer: &str, items: &[(&str, i64)]) -> SaleRequest {
    SaleRequest::new(
        customer,
        items
            .iter()
            .map(|(id, qty)| LineItemRequest::new(*id, *qty))
            .collect(),
    )
}

#[tokio::test]
async fn create_persists_sale_and_stock() {
    let fx = Fixture::new().await;
    fx.product("P", 450, Some(5)).await;

    let sale = fx.engine.create_sale(request("ana", &[("P", 3)])).await.unwrap();

    assert_eq!(fx.stock("P").await, Some(2));
    let stored = fx.db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
    assert_eq!(stored.total_cents, 1350);
    assert_eq!(stored.line_items, sale.line_items);
    assert_eq!(stored.payment.status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn insufficient_stock_rolls_back_everything() {
    let fx = Fixture::new().await;
    fx.product("Q", 100, Some(10)).await;
    fx.product("P", 200, Some(2)).await;

    let err = fx
        .engine
        .create_sale(request("ana", &[("Q", 1), ("P", 3)]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CoreError::InsufficientStock {
            product_id: "P".into(),
            available: 2,
            requested: 3
        }
    );
    assert_eq!(fx.stock("Q").await, Some(10));
    assert_eq!(fx.db.sales().count().await.unwrap(), 0);
}

#[tokio::test]
async fn update_keeps_payment_and_nets_stock() {
    let fx = Fixture::new().await;
    fx.product("P", 300, Some(10)).await;
    fx.product("Q", 150, Some(10)).await;

    let sale = fx.engine.create_sale(request("ana", &[("P", 4)])).await.unwrap();
    fx.db.sales().begin_checkout(&sale.id, "stripe", "cs_test_1").await.unwrap();

    let updated = fx
        .engine
        .update_sale(&sale.id, request("luis", &[("P", 2), ("Q", 1)]))
        .await
        .unwrap();

    assert_eq!(fx.stock("P").await, Some(8));
    assert_eq!(fx.stock("Q").await, Some(9));
    assert_eq!(updated.customer_id, "luis");
    assert_eq!(updated.total_cents, 750);
    assert_eq!(updated.payment.status, PaymentStatus::Pending);
    assert_eq!(updated.payment.checkout_session_id.as_deref(), Some("cs_test_1"));
}

#[tokio::test]
async fn failed_update_leaves_sale_untouched() {
    let fx = Fixture::new().await;
    fx.product("P", 100, Some(10)).await;
    fx.product("Q", 100, Some(10)).await;

    let sale = fx.engine.create_sale(request("ana", &[("P", 4)])).await.unwrap();

    let err = fx
        .engine
        .update_sale(&sale.id, request("ana", &[("Q", 1), ("P", 20)]))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InsufficientStock { .. }));
    assert_eq!(fx.stock("P").await, Some(6));
    assert_eq!(fx.stock("Q").await, Some(10));

    let stored = fx.db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
    assert_eq!(stored.line_items, sale.line_items);
    assert_eq!(stored.total_cents, sale.total_cents);
}

#[tokio::test]
async fn delete_returns_stock_and_removes_line_items() {
    let fx = Fixture::new().await;
    fx.product("P", 300, Some(5)).await;

    let sale = fx.engine.create_sale(request("ana", &[("P", 4)])).await.unwrap();
    fx.engine.delete_sale(&sale.id).await.unwrap();

    assert_eq!(fx.stock("P").await, Some(5));
    assert!(fx.db.sales().get_by_id(&sale.id).await.unwrap().is_none());

    let items: i64 = line_item_count(&fx.db).await;
    assert_eq!(items, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_unit_sold_once() {
    let fx = Arc::new(Fixture::new().await);
    fx.product("P", 100, Some(1)).await;

    let handles: Vec<_> = ["ana", "luis"]
        .into_iter()
        .map(|customer| {
            let fx = fx.clone();
            tokio::spawn(async move { fx.engine.create_sale(request(customer, &[("P", 1)])).await })
        })
        .collect();

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(e) => assert!(matches!(e, CoreError::InsufficientStock { available: 0, .. })),
        }
    }

    assert_eq!(sold, 1);
    assert_eq!(fx.stock("P").await, Some(0));
    assert_eq!(fx.db.sales().count().await.unwrap(), 1);
}

// =============================================================================
// Caller-side cancellation
// =============================================================================

/// SQLite store whose units signal after their first stock write and then
/// hang on the next one, so a test can drop the operation at that point.
struct StallAfterFirstWrite {
    inner: SqliteStore,
    written: Arc<Notify>,
}

struct StallingUnit {
    inner: SqliteUnit,
    written: Arc<Notify>,
    writes: usize,
}

#[async_trait]
impl UnitOfWorkFactory for StallAfterFirstWrite {
    type Unit = StallingUnit;

    async fn begin(&self) -> StoreResult<StallingUnit> {
        Ok(StallingUnit {
            inner: self.inner.begin().await?,
            written: self.written.clone(),
            writes: 0,
        })
    }

    async fn find_sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        self.inner.find_sale(id).await
    }
}

#[async_trait]
impl Catalog for StallingUnit {
    async fn get_product(&mut self, id: &str) -> StoreResult<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn set_stock(&mut self, id: &str, expected: Option<i64>, new_stock: i64) -> StoreResult<()> {
        if self.writes > 0 {
            std::future::pending::<()>().await;
        }
        self.inner.set_stock(id, expected, new_stock).await?;
        self.writes += 1;
        self.written.notify_one();
        Ok(())
    }
}

#[async_trait]
impl Customers for StallingUnit {
    async fn get_customer(&mut self, id: &str) -> StoreResult<Option<Customer>> {
        self.inner.get_customer(id).await
    }
}

#[async_trait]
impl SaleRecords for StallingUnit {
    async fn get_sale(&mut self, id: &str) -> StoreResult<Option<Sale>> {
        self.inner.get_sale(id).await
    }

    async fn save_sale(&mut self, sale: &Sale) -> StoreResult<Sale> {
        self.inner.save_sale(sale).await
    }

    async fn delete_sale(&mut self, id: &str) -> StoreResult<bool> {
        self.inner.delete_sale(id).await
    }
}

#[async_trait]
impl UnitOfWork for StallingUnit {
    async fn commit(self) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

fn stalling_engine(fx: &Fixture) -> (SaleOrchestrator<StallAfterFirstWrite>, Arc<Notify>) {
    let written = Arc::new(Notify::new());
    let store = StallAfterFirstWrite {
        inner: fx.db.store(),
        written: written.clone(),
    };
    // Only the caller gives up; the engine's own deadline stays out of it
    let engine = SaleOrchestrator::new(store, EngineConfig::default().operation_timeout(None));
    (engine, written)
}

#[tokio::test]
async fn dropped_create_after_first_decrement_leaves_no_trace() {
    let fx = Fixture::new().await;
    fx.product("P", 100, Some(5)).await;
    fx.product("Q", 100, Some(5)).await;
    let (engine, written) = stalling_engine(&fx);

    tokio::select! {
        result = engine.create_sale(request("ana", &[("P", 2), ("Q", 1)])) => {
            panic!("create finished despite the stalled write: {result:?}")
        }
        _ = written.notified() => {}
    }

    // The dropped unit rolls back before the single in-memory connection
    // is handed out again
    assert_eq!(fx.stock("P").await, Some(5));
    assert_eq!(fx.stock("Q").await, Some(5));
    assert_eq!(fx.db.sales().count().await.unwrap(), 0);

    // Locks and connection were released; the next sale goes through
    fx.engine.create_sale(request("ana", &[("P", 2)])).await.unwrap();
    assert_eq!(fx.stock("P").await, Some(3));
}

#[tokio::test]
async fn dropped_update_after_first_restore_leaves_sale_untouched() {
    let fx = Fixture::new().await;
    fx.product("P", 100, Some(10)).await;
    fx.product("Q", 100, Some(10)).await;
    let sale = fx.engine.create_sale(request("ana", &[("P", 4), ("Q", 2)])).await.unwrap();
    let (engine, written) = stalling_engine(&fx);

    tokio::select! {
        result = engine.update_sale(&sale.id, request("luis", &[("Q", 1)])) => {
            panic!("update finished despite the stalled write: {result:?}")
        }
        _ = written.notified() => {}
    }

    assert_eq!(fx.stock("P").await, Some(6));
    assert_eq!(fx.stock("Q").await, Some(8));
    let stored = fx.db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
    assert_eq!(stored.customer_id, "ana");
    assert_eq!(stored.line_items, sale.line_items);
}

async fn line_item_count(db: &Database) -> i64 {
    let sales = db.sales().list(100).await.unwrap();
    sales.iter().map(|s| s.line_items.len() as i64).sum()
}
