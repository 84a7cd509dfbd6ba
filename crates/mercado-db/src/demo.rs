//! # Demo Data
//!
//! A small supermarket catalog used by the `seed` binary and the
//! back-office `seed` command.

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Database;
use mercado_core::{Category, Customer, Product};

/// Aisles and their products (name, price in cents).
const AISLES: &[(&str, &[(&str, i64)])] = &[
    (
        "Bebidas",
        &[
            ("Agua mineral 2L", 850),
            ("Coca-Cola 2L", 1400),
            ("Jugo de naranja 1L", 1200),
            ("Cerveza Paceña 710ml", 1500),
            ("Café molido 250g", 3200),
        ],
    ),
    (
        "Lácteos",
        &[
            ("Leche entera 1L", 650),
            ("Yogurt bebible 1L", 1300),
            ("Queso fresco 500g", 3500),
            ("Mantequilla 200g", 1800),
        ],
    ),
    (
        "Abarrotes",
        &[
            ("Arroz 1kg", 1200),
            ("Fideo spaghetti 500g", 700),
            ("Aceite de girasol 900ml", 2350),
            ("Azúcar 1kg", 900),
            ("Harina 1kg", 800),
            ("Pan molde", 1500),
        ],
    ),
    (
        "Limpieza",
        &[
            ("Detergente 1kg", 2500),
            ("Lavandina 1L", 900),
            ("Jabón de tocador", 550),
        ],
    ),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ana Gutiérrez", "ana@example.com"),
    ("Carlos Rojas", "carlos@example.com"),
    ("María Flores", "maria@example.com"),
];

/// What [`seed_demo_data`] inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub customers: usize,
}

/// Inserts the demo catalog, every product starting at `stock` units.
pub async fn seed_demo_data(db: &Database, stock: i64) -> DbResult<SeedSummary> {
    let now = Utc::now();
    let mut products = 0;

    for (aisle, items) in AISLES {
        let category = db
            .categories()
            .insert(&Category {
                id: Uuid::new_v4().to_string(),
                name: aisle.to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        for (name, price_cents) in items.iter() {
            db.products()
                .insert(&Product {
                    id: Uuid::new_v4().to_string(),
                    category_id: Some(category.id.clone()),
                    name: name.to_string(),
                    description: None,
                    image_url: None,
                    price_cents: *price_cents,
                    stock: Some(stock),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            products += 1;
        }

        tracing::debug!(aisle = %aisle, products = items.len(), "Seeded aisle");
    }

    for (name, email) in CUSTOMERS {
        db.customers()
            .insert(&Customer {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                email: Some(email.to_string()),
                phone: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    Ok(SeedSummary {
        categories: AISLES.len(),
        products,
        customers: CUSTOMERS.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    #[tokio::test]
    async fn test_seed_demo_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let summary = seed_demo_data(&db, 25).await.unwrap();

        assert_eq!(summary.categories, 4);
        assert_eq!(db.products().count().await.unwrap(), summary.products as i64);
        assert_eq!(db.customers().list(10).await.unwrap().len(), summary.customers);

        let products = db.products().list(100).await.unwrap();
        assert!(products.iter().all(|p| p.stock == Some(25)));
    }
}
