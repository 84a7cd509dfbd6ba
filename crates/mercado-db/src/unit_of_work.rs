//! # SQLite Unit of Work
//!
//! Implements the storage ports for the sale engine on one pooled
//! connection inside one `BEGIN IMMEDIATE` transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteStore::begin()                                                   │
//! │     pool.acquire() ──► BEGIN IMMEDIATE   (takes the write lock now,     │
//! │                        │                  not at the first UPDATE)      │
//! │                        ▼                                                │
//! │  SqliteUnit  get_product / set_stock / get_customer / save_sale / ...   │
//! │                        │                                                │
//! │           ┌────────────┼─────────────────────┐                          │
//! │           ▼            ▼                     ▼                          │
//! │       commit()     rollback()         dropped unfinished                │
//! │        COMMIT       ROLLBACK          ROLLBACK spawned on the runtime   │
//! │                                       (connection closed if no runtime) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::repository::customer::fetch_customer;
use crate::repository::product::fetch_product;
use crate::repository::sale::{fetch_sale, remove_sale, upsert_sale};
use mercado_core::store::{Catalog, Customers, SaleRecords, UnitOfWork, UnitOfWorkFactory};
use mercado_core::{Customer, Product, Sale, StoreError, StoreResult};

// =============================================================================
// Factory
// =============================================================================

/// Hands out one [`SqliteUnit`] per sale operation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for SqliteStore {
    type Unit = SqliteUnit;

    async fn begin(&self) -> StoreResult<SqliteUnit> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Unit of work started");
        Ok(SqliteUnit { conn: Some(conn) })
    }

    async fn find_sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(fetch_sale(&mut conn, id).await?)
    }
}

// =============================================================================
// Unit
// =============================================================================

/// An open SQLite transaction. `conn` is `None` once finished.
pub struct SqliteUnit {
    conn: Option<PoolConnection<Sqlite>>,
}

impl SqliteUnit {
    fn conn(&mut self) -> StoreResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| StoreError::Backend("unit of work already finished".to_string()))
    }

    async fn finish(&mut self, statement: &'static str) -> StoreResult<()> {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => return Err(StoreError::Backend("unit of work already finished".to_string())),
        };

        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            error!(error = %e, statement, "Transaction finish failed");
            // A connection stuck inside a transaction must not go back to the pool
            drop(conn.detach());
            return Err(DbError::TransactionFailed(e.to_string()).into());
        }

        debug!(statement, "Unit of work finished");
        Ok(())
    }
}

#[async_trait]
impl Catalog for SqliteUnit {
    async fn get_product(&mut self, id: &str) -> StoreResult<Option<Product>> {
        Ok(fetch_product(self.conn()?, id).await?)
    }

    async fn set_stock(
        &mut self,
        id: &str,
        expected: Option<i64>,
        new_stock: i64,
    ) -> StoreResult<()> {
        let conn = self.conn()?;

        // `IS` so that an unset (NULL) stock compares equal to None
        let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1 AND stock IS ?4")
            .bind(id)
            .bind(new_stock)
            .bind(Utc::now())
            .bind(expected)
            .execute(&mut *conn)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::from)?;

        if exists == 0 {
            Err(DbError::not_found("Product", id).into())
        } else {
            Err(StoreError::Conflict {
                product_id: id.to_string(),
            })
        }
    }
}

#[async_trait]
impl Customers for SqliteUnit {
    async fn get_customer(&mut self, id: &str) -> StoreResult<Option<Customer>> {
        Ok(fetch_customer(self.conn()?, id).await?)
    }
}

#[async_trait]
impl SaleRecords for SqliteUnit {
    async fn get_sale(&mut self, id: &str) -> StoreResult<Option<Sale>> {
        Ok(fetch_sale(self.conn()?, id).await?)
    }

    async fn save_sale(&mut self, sale: &Sale) -> StoreResult<Sale> {
        Ok(upsert_sale(self.conn()?, sale).await?)
    }

    async fn delete_sale(&mut self, id: &str) -> StoreResult<bool> {
        Ok(remove_sale(self.conn()?, id).await?)
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnit {
    async fn commit(mut self) -> StoreResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteUnit {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        warn!("Unit of work dropped unfinished, rolling back");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        error!(error = %e, "Rollback of abandoned unit failed");
                        drop(conn.detach());
                    }
                });
            }
            // Closing the connection discards the open transaction
            Err(_) => drop(conn.detach()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
