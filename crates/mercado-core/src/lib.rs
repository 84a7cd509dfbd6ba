//! # mercado-core: Pure Business Logic for the Mercado Back-Office
//!
//! This crate holds the domain model of the supermarket back-office and the
//! rules that do not need I/O: money arithmetic, sale pricing, input
//! validation and delivery-fee quoting. It also declares the storage ports
//! the sale engine talks to; implementations live in `mercado-db` (SQLite)
//! and `mercado-sales` (in-memory).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Mercado Back-Office Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/backoffice (API layer)                     │   │
//! │  │      sell, resell, void, quote, deliver, checkout, paid         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          mercado-sales (Stock Ledger + Orchestrator)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ports                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ mercado-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌───────┐  │   │
//! │  │   │  types  │ │  money  │ │ pricing │ │validation│ │ store │  │   │
//! │  │   │ Product │ │  Money  │ │subtotal │ │  rules   │ │ ports │  │   │
//! │  │   │  Sale   │ │         │ │  total  │ │          │ │       │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └───────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲                                        │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │           mercado-db (SQLite implementation of the ports)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Sale, LineItem, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line subtotals and sale totals
//! - [`delivery`] - Great-circle delivery fee quoting
//! - [`validation`] - Business rule validation
//! - [`store`] - Storage ports used by the sale engine
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mercado_core::money::Money;
//! use mercado_core::pricing;
//!
//! let line = pricing::price_line("prod-1", 3, Money::from_cents(1050)).unwrap();
//! assert_eq!(line.subtotal_cents, 3150);
//! assert_eq!(pricing::total(&[line]).unwrap().cents(), 3150);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod delivery;
pub mod error;
pub mod money;
pub mod pricing;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, StoreError, StoreResult, ValidationError};
pub use money::Money;
pub use types::*;
