//! # mercado-db: Database Layer for the Mercado Back-Office
//!
//! SQLite storage via sqlx: the catalog/customer repositories, sale queries,
//! and the transactional unit of work the sale engine runs on.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Data Flow                                │
//! │                                                                         │
//! │  backoffice command                 SaleOrchestrator (mercado-sales)   │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    mercado-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ Category      │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ Product       │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │ Customer      │    │              │  │   │
//! │  │   │               │    │ Sale          │    └──────────────┘  │   │
//! │  │   │               │    └───────────────┘                      │   │
//! │  │   │               │◄───┌───────────────┐                      │   │
//! │  │   │               │    │ SqliteStore   │ UnitOfWorkFactory    │   │
//! │  │   └───────────────┘    │ SqliteUnit    │ BEGIN IMMEDIATE      │   │
//! │  │                        └───────────────┘                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("mercado.db")).await?;
//! let products = db.products().list(50).await?;
//! let engine = SaleOrchestrator::new(db.store(), EngineConfig::default());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod demo;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::category::CategoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use unit_of_work::{SqliteStore, SqliteUnit};
