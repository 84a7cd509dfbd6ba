//! # Repository Module
//!
//! Database repository implementations for the Mercado back-office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Back-office command                                                   │
//! │       │                                                                 │
//! │       │  db.products().list(50)                                        │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── insert(&self, product)                                            │
//! │  └── update(&self, product)                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Sale writes are the exception: they run through the sale engine on a  │
//! │  SqliteUnit (see `unit_of_work`), which reuses the aggregate queries   │
//! │  defined in `sale.rs`.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`category::CategoryRepository`] - Category CRUD
//! - [`product::ProductRepository`] - Product CRUD and stock takes
//! - [`customer::CustomerRepository`] - Customer CRUD
//! - [`sale::SaleRepository`] - Sale queries, payment and delivery updates

pub mod category;
pub mod customer;
pub mod product;
pub mod sale;
