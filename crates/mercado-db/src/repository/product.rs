//! # Product Repository
//!
//! Catalog CRUD for products.
//!
//! ## Stock Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who writes products.stock?                           │
//! │                                                                         │
//! │  ProductRepository::set_stock      administrative stock take           │
//! │  ProductRepository::insert/update  initial / corrected stock           │
//! │                                                                         │
//! │  SqliteUnit::set_stock             every sale create/update/delete     │
//! │  (via the stock ledger only)       conditional: WHERE stock IS ?       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mercado_core::validation::{validate_id, validate_name, validate_price_cents, validate_stock};
use mercado_core::Product;

pub(crate) const PRODUCT_COLUMNS: &str = r#"
    id,
    category_id,
    name,
    description,
    image_url,
    price_cents,
    stock,
    created_at,
    updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let page = repo.list(50).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Lists products sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1");

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The product as inserted
    /// * `Err(DbError::Invalid)` - Empty id or name, negative price or stock
    /// * `Err(DbError::ForeignKeyViolation)` - Unknown category
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product(product)?;
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, category_id, name, description, image_url,
                price_cents, stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Updates catalog fields, including an administrative stock correction.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                category_id = ?2,
                name = ?3,
                description = ?4,
                image_url = ?5,
                price_cents = ?6,
                stock = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Sets the stock level after a physical count. Zero is allowed.
    pub async fn set_stock(&self, id: &str, stock: i64) -> DbResult<()> {
        validate_stock(stock)?;
        debug!(id = %id, stock = %stock, "Setting stock");

        let result = sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product.
    ///
    /// Fails with `ForeignKeyViolation` while any sale still references it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn validate_product(product: &Product) -> DbResult<()> {
    validate_id("id", &product.id)?;
    validate_name(&product.name)?;
    validate_price_cents(product.price_cents)?;
    if let Some(stock) = product.stock {
        validate_stock(stock)?;
    }
    Ok(())
}

/// Product lookup on an explicit connection (pooled or inside a unit of work).
pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(product)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mercado_core::{Customer, ValidationError};

    fn product(id: &str, name: &str, stock: Option<i64>) -> Product {
        let now = Utc::now();
        Product {
            id: id.into(),
            category_id: None,
            name: name.into(),
            description: None,
            image_url: None,
            price_cents: 990,
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_stock_take_rejects_negative_count() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();
        products.insert(&product("p1", "Yerba 500g", Some(4))).await.unwrap();

        let err = products.set_stock("p1", -1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Invalid(ValidationError::OutOfRange { ref field, .. }) if field == "stock"
        ));
        assert_eq!(products.get_by_id("p1").await.unwrap().unwrap().stock, Some(4));

        products.set_stock("p1", 0).await.unwrap();
        assert_eq!(products.get_by_id("p1").await.unwrap().unwrap().stock, Some(0));
    }

    #[tokio::test]
    async fn test_catalog_writes_are_validated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let products = db.products();

        assert!(matches!(
            products.insert(&product("p1", "  ", Some(1))).await,
            Err(DbError::Invalid(ValidationError::Required { .. }))
        ));
        assert!(matches!(
            products.insert(&product("p1", "Yerba 500g", Some(-3))).await,
            Err(DbError::Invalid(_))
        ));
        assert_eq!(products.count().await.unwrap(), 0);

        products.insert(&product("p1", "Yerba 500g", None)).await.unwrap();
        let mut renamed = product("p1", "", None);
        renamed.price_cents = 100;
        assert!(matches!(products.update(&renamed).await, Err(DbError::Invalid(_))));

        let now = Utc::now();
        let nameless = Customer {
            id: "c1".into(),
            name: String::new(),
            email: None,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            db.customers().insert(&nameless).await,
            Err(DbError::Invalid(_))
        ));
    }
}
