//! # Storage Ports
//!
//! The collaborators the sale engine talks to. Declared here, implemented by
//! `mercado-db` (SQLite) and by the in-memory store in `mercado-sales`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleOrchestrator                                                       │
//! │      │                                                                  │
//! │      │ begin()                                                          │
//! │      ▼                                                                  │
//! │  UnitOfWorkFactory ────────► UnitOfWork (one per operation)            │
//! │                              ├── Catalog      get_product, set_stock    │
//! │                              ├── Customers    get_customer              │
//! │                              ├── SaleRecords  get/save/delete sale      │
//! │                              └── commit() / rollback()                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write made through a unit becomes visible to other units only on
//! `commit`. Stores without real transactions (write-through) still honour
//! the contract of each method; the engine's compensation journal covers
//! them.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{Customer, Product, Sale};

/// Product lookup and conditional stock writes.
#[async_trait]
pub trait Catalog: Send {
    async fn get_product(&mut self, id: &str) -> StoreResult<Option<Product>>;

    /// Writes `new_stock` only if the stored value still equals `expected`.
    ///
    /// Returns `StoreError::Conflict` when it does not, and
    /// `StoreError::Backend` when the product does not exist.
    async fn set_stock(&mut self, id: &str, expected: Option<i64>, new_stock: i64)
        -> StoreResult<()>;
}

#[async_trait]
pub trait Customers: Send {
    async fn get_customer(&mut self, id: &str) -> StoreResult<Option<Customer>>;
}

/// Sale aggregate persistence. A sale and its line items are one unit.
#[async_trait]
pub trait SaleRecords: Send {
    async fn get_sale(&mut self, id: &str) -> StoreResult<Option<Sale>>;

    /// Inserts or replaces the sale together with its line items.
    ///
    /// Payment and delivery sub-state of an existing sale are kept as
    /// stored; they belong to the checkout and delivery flows.
    async fn save_sale(&mut self, sale: &Sale) -> StoreResult<Sale>;

    /// Returns `false` when no such sale existed.
    async fn delete_sale(&mut self, id: &str) -> StoreResult<bool>;
}

/// One transactional scope, covering a single create/update/delete.
#[async_trait]
pub trait UnitOfWork: Catalog + Customers + SaleRecords + Send {
    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    type Unit: UnitOfWork;

    async fn begin(&self) -> StoreResult<Self::Unit>;

    /// Reads a sale outside any unit.
    ///
    /// Used to plan which products an update or delete will lock; the
    /// sale is read again inside the unit once the locks are held.
    async fn find_sale(&self, id: &str) -> StoreResult<Option<Sale>>;
}
