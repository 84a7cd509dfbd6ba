//! # Sale Repository
//!
//! Sale aggregate persistence plus the checkout and delivery updates.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Row Ownership                                │
//! │                                                                         │
//! │  sale engine (unit of work)                                            │
//! │     └── upsert_sale()  → customer_id, sold_at, total_cents,            │
//! │                          sale_line_items (replaced as a set)           │
//! │                                                                         │
//! │  checkout / payment webhook (this repository)                          │
//! │     └── begin_checkout(), mark_paid(), mark_payment_failed()           │
//! │                        → payment_* columns                             │
//! │                                                                         │
//! │  delivery desk (this repository)                                       │
//! │     └── record_delivery(), update_delivery_status()                    │
//! │                        → delivery_* columns                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale update therefore never clobbers a payment that landed meanwhile.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mercado_core::delivery::DeliveryQuote;
use mercado_core::{
    DeliveryInfo, DeliveryStatus, LineItem, PaymentInfo, PaymentStatus, Sale,
};

const SALE_COLUMNS: &str = r#"
    id,
    customer_id,
    sold_at,
    total_cents,
    payment_status,
    payment_provider,
    checkout_session_id,
    payment_intent_id,
    delivery_address,
    delivery_lat,
    delivery_lng,
    delivery_distance_km,
    delivery_fee_cents,
    delivery_eta_minutes,
    delivery_status,
    rider_id,
    created_at,
    updated_at
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    customer_id: String,
    sold_at: DateTime<Utc>,
    total_cents: i64,
    payment_status: PaymentStatus,
    payment_provider: Option<String>,
    checkout_session_id: Option<String>,
    payment_intent_id: Option<String>,
    delivery_address: Option<String>,
    delivery_lat: Option<f64>,
    delivery_lng: Option<f64>,
    delivery_distance_km: Option<f64>,
    delivery_fee_cents: Option<i64>,
    delivery_eta_minutes: Option<i64>,
    delivery_status: Option<DeliveryStatus>,
    rider_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, line_items: Vec<LineItem>) -> Sale {
        // A delivery exists once an address has been recorded.
        let delivery = self.delivery_address.map(|address| DeliveryInfo {
            address,
            lat: self.delivery_lat.unwrap_or_default(),
            lng: self.delivery_lng.unwrap_or_default(),
            distance_km: self.delivery_distance_km.unwrap_or_default(),
            fee_cents: self.delivery_fee_cents.unwrap_or_default(),
            eta_minutes: self.delivery_eta_minutes.unwrap_or_default(),
            status: self.delivery_status.unwrap_or_default(),
            rider_id: self.rider_id,
        });

        Sale {
            id: self.id,
            customer_id: self.customer_id,
            sold_at: self.sold_at,
            total_cents: self.total_cents,
            line_items,
            payment: PaymentInfo {
                status: self.payment_status,
                provider: self.payment_provider,
                checkout_session_id: self.checkout_session_id,
                payment_intent_id: self.payment_intent_id,
            },
            delivery,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale queries and sub-state updates.
///
/// Sale create/update/delete go through the sale engine, never through here.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its line items in stored order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    /// Lists sales, newest first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, id LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let items = fetch_line_items(&mut conn, &row.id).await?;
            sales.push(row.into_sale(items));
        }

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Payment
    // -------------------------------------------------------------------------

    /// Records a created checkout session and marks the sale Pending.
    ///
    /// The amount charged is the sale total at this moment.
    pub async fn begin_checkout(
        &self,
        sale_id: &str,
        provider: &str,
        session_id: &str,
    ) -> DbResult<Sale> {
        debug!(sale_id = %sale_id, session_id = %session_id, "Beginning checkout");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                payment_status = ?2,
                payment_provider = ?3,
                checkout_session_id = ?4,
                payment_intent_id = NULL,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(PaymentStatus::Pending)
        .bind(provider)
        .bind(session_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        self.require(sale_id).await
    }

    /// Webhook path: the provider confirmed the session was paid.
    pub async fn mark_paid(&self, session_id: &str, payment_intent_id: &str) -> DbResult<Sale> {
        debug!(session_id = %session_id, "Marking sale paid");

        let sale_id: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE sales SET
                payment_status = ?2,
                payment_intent_id = ?3,
                updated_at = ?4
            WHERE checkout_session_id = ?1
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(PaymentStatus::Paid)
        .bind(payment_intent_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match sale_id {
            Some(id) => self.require(&id).await,
            None => Err(DbError::not_found("Checkout session", session_id)),
        }
    }

    pub async fn mark_payment_failed(&self, sale_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET payment_status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(sale_id)
            .bind(PaymentStatus::Failed)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------------

    /// Attaches a quoted delivery to a sale, status Pending.
    pub async fn record_delivery(
        &self,
        sale_id: &str,
        address: &str,
        lat: f64,
        lng: f64,
        quote: &DeliveryQuote,
    ) -> DbResult<Sale> {
        debug!(sale_id = %sale_id, fee_cents = quote.fee_cents, "Recording delivery");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                delivery_address = ?2,
                delivery_lat = ?3,
                delivery_lng = ?4,
                delivery_distance_km = ?5,
                delivery_fee_cents = ?6,
                delivery_eta_minutes = ?7,
                delivery_status = ?8,
                rider_id = NULL,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(address)
        .bind(lat)
        .bind(lng)
        .bind(quote.distance_km)
        .bind(quote.fee_cents)
        .bind(quote.eta_minutes)
        .bind(DeliveryStatus::Pending)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        self.require(sale_id).await
    }

    /// Moves a recorded delivery along. `rider_id` is kept when `None`.
    pub async fn update_delivery_status(
        &self,
        sale_id: &str,
        status: DeliveryStatus,
        rider_id: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                delivery_status = ?2,
                rider_id = COALESCE(?3, rider_id),
                updated_at = ?4
            WHERE id = ?1 AND delivery_address IS NOT NULL
            "#,
        )
        .bind(sale_id)
        .bind(status)
        .bind(rider_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Delivery", sale_id));
        }

        Ok(())
    }

    async fn require(&self, sale_id: &str) -> DbResult<Sale> {
        self.get_by_id(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))
    }
}

// =============================================================================
// Aggregate Persistence (shared with the unit of work)
// =============================================================================

pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");

    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let items = fetch_line_items(conn, &row.id).await?;
            Ok(Some(row.into_sale(items)))
        }
        None => Ok(None),
    }
}

async fn fetch_line_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<LineItem>> {
    let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT product_id, quantity, unit_price_cents, subtotal_cents
        FROM sale_line_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, quantity, unit_price_cents, subtotal_cents)| LineItem {
            product_id,
            quantity,
            unit_price_cents,
            subtotal_cents,
        })
        .collect())
}

/// Inserts or replaces a sale and its line items.
///
/// On conflict only the engine-owned columns change; payment and delivery
/// columns keep their stored values. Returns the sale as now stored.
pub(crate) async fn upsert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<Sale> {
    debug!(sale_id = %sale.id, items = sale.line_items.len(), "Saving sale");

    let delivery = sale.delivery.as_ref();

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, customer_id, sold_at, total_cents,
            payment_status, payment_provider, checkout_session_id, payment_intent_id,
            delivery_address, delivery_lat, delivery_lng, delivery_distance_km,
            delivery_fee_cents, delivery_eta_minutes, delivery_status, rider_id,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16,
            ?17, ?18
        )
        ON CONFLICT(id) DO UPDATE SET
            customer_id = excluded.customer_id,
            sold_at = excluded.sold_at,
            total_cents = excluded.total_cents,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.customer_id)
    .bind(sale.sold_at)
    .bind(sale.total_cents)
    .bind(sale.payment.status)
    .bind(&sale.payment.provider)
    .bind(&sale.payment.checkout_session_id)
    .bind(&sale.payment.payment_intent_id)
    .bind(delivery.map(|d| d.address.clone()))
    .bind(delivery.map(|d| d.lat))
    .bind(delivery.map(|d| d.lng))
    .bind(delivery.map(|d| d.distance_km))
    .bind(delivery.map(|d| d.fee_cents))
    .bind(delivery.map(|d| d.eta_minutes))
    .bind(delivery.map(|d| d.status))
    .bind(delivery.and_then(|d| d.rider_id.clone()))
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM sale_line_items WHERE sale_id = ?1")
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;

    for (position, item) in sale.line_items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_line_items (
                sale_id, position, product_id, quantity, unit_price_cents, subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.subtotal_cents)
        .execute(&mut *conn)
        .await?;
    }

    fetch_sale(conn, &sale.id)
        .await?
        .ok_or_else(|| DbError::Internal(format!("sale {} vanished after save", sale.id)))
}

/// Deletes a sale; line items go with it (ON DELETE CASCADE).
pub(crate) async fn remove_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(sale_id = %id, "Deleting sale");

    let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mercado_core::delivery::{quote, DeliveryRates};
    use mercado_core::{pricing, Customer, Money, Product};

    async fn db_with_sale() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();

        db.products()
            .insert(&Product {
                id: "p1".into(),
                category_id: None,
                name: "Leche entera 1L".into(),
                description: None,
                image_url: None,
                price_cents: 650,
                stock: Some(3),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        db.customers()
            .insert(&Customer {
                id: "c1".into(),
                name: "Ana".into(),
                email: None,
                phone: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let mut sale = Sale {
            id: "s1".into(),
            customer_id: "c1".into(),
            sold_at: now,
            total_cents: 0,
            line_items: vec![pricing::price_line("p1", 2, Money::from_cents(650)).unwrap()],
            payment: PaymentInfo::default(),
            delivery: None,
            created_at: now,
            updated_at: now,
        };
        sale.recompute_total().unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        upsert_sale(&mut conn, &sale).await.unwrap();
        drop(conn);

        db
    }

    #[tokio::test]
    async fn test_get_list_count() {
        let db = db_with_sale().await;
        let sales = db.sales();

        let sale = sales.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(sale.total_cents, 1300);
        assert_eq!(sale.line_items.len(), 1);
        assert!(sale.is_consistent());
        assert!(sale.delivery.is_none());

        assert_eq!(sales.list(10).await.unwrap().len(), 1);
        assert_eq!(sales.count().await.unwrap(), 1);
        assert!(sales.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkout_then_webhook() {
        let db = db_with_sale().await;
        let sales = db.sales();

        let pending = sales.begin_checkout("s1", "stripe", "cs_test_1").await.unwrap();
        assert_eq!(pending.payment.status, PaymentStatus::Pending);

        let paid = sales.mark_paid("cs_test_1", "pi_123").await.unwrap();
        assert_eq!(paid.payment.status, PaymentStatus::Paid);
        assert_eq!(paid.payment.payment_intent_id.as_deref(), Some("pi_123"));

        assert!(matches!(
            sales.mark_paid("cs_unknown", "pi_x").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delivery_lifecycle() {
        let db = db_with_sale().await;
        let sales = db.sales();

        // No delivery recorded yet
        assert!(sales
            .update_delivery_status("s1", DeliveryStatus::Assigned, Some("rider-1"))
            .await
            .is_err());

        let rates = DeliveryRates::default();
        let q = quote(&rates, -17.80, -63.15);
        let sale = sales
            .record_delivery("s1", "Av. Busch 123", -17.80, -63.15, &q)
            .await
            .unwrap();
        let delivery = sale.delivery.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.fee_cents, q.fee_cents);

        sales
            .update_delivery_status("s1", DeliveryStatus::Assigned, Some("rider-1"))
            .await
            .unwrap();
        sales
            .update_delivery_status("s1", DeliveryStatus::InTransit, None)
            .await
            .unwrap();

        let delivery = sales.get_by_id("s1").await.unwrap().unwrap().delivery.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::InTransit);
        assert_eq!(delivery.rider_id.as_deref(), Some("rider-1"));
    }
}
