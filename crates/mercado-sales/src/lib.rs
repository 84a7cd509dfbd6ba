//! # mercado-sales: Sale Inventory-Consistency Engine
//!
//! Keeps `Product.stock` and the recorded sales in step. Every sale create,
//! update and delete either lands completely (stock moved, record written)
//! or leaves stock and records exactly as they were.
//!
//! ## Module Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          mercado-sales                                  │
//! │                                                                         │
//! │  orchestrator   SaleOrchestrator: create_sale / update_sale /           │
//! │       │         delete_sale, compensation, deadlines                    │
//! │       ├──────►  ledger   StockLedger (conditional stock writes)         │
//! │       │                  StockJournal (reverse-order compensation)      │
//! │       ├──────►  locks    LockSet (sale:{id}, product:{id})              │
//! │       └──────►  config   EngineConfig                                   │
//! │                                                                         │
//! │  memory         MemoryStore: the ports in memory, transactional or      │
//! │                 write-through, with injectable faults                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use mercado_core::{LineItemRequest, SaleRequest};
//! use mercado_sales::{EngineConfig, MemoryStore, SaleOrchestrator};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let store = MemoryStore::new();
//! store.add_customer("c1", "Ana").await;
//! store.add_product("leche", 850, Some(10)).await;
//!
//! let engine = SaleOrchestrator::new(store, EngineConfig::default());
//! let sale = engine
//!     .create_sale(SaleRequest::new("c1", vec![LineItemRequest::new("leche", 2)]))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(sale.total_cents, 1700);
//! assert_eq!(engine.factory().stock_of("leche").await, Some(8));
//! # });
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod memory;
pub mod orchestrator;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::EngineConfig;
pub use error::{StockError, StockResult};
pub use ledger::{StockJournal, StockLedger};
pub use locks::{LockGuard, LockSet};
pub use memory::{MemoryMode, MemoryStore, MemoryUnit, StockWrite};
pub use orchestrator::SaleOrchestrator;
