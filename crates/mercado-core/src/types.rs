//! # Domain Types
//!
//! Core domain types used throughout the Mercado back-office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │◄──│    Product      │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name (unique)  │   │  price_cents    │   │  name           │       │
//! │  └─────────────────┘   │  stock (ledger) │   │  email, phone   │       │
//! │                        └────────▲────────┘   └────────▲────────┘       │
//! │                                 │ product_id          │ customer_id     │
//! │  ┌──────────────────────────────┴─────────────────────┴──────────────┐ │
//! │  │  Sale (aggregate root)                                            │ │
//! │  │  ───────────────────────────────────────────────────────────────  │ │
//! │  │  id, sold_at, total_cents = Σ line_items[i].subtotal_cents         │ │
//! │  │  line_items: Vec<LineItem>   (owned, stored order preserved)      │ │
//! │  │  payment:    PaymentInfo     (written by checkout / webhook)      │ │
//! │  │  delivery:   Option<DeliveryInfo>                                 │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line items have no identity outside their sale. Deleting a sale deletes
//! its line items; the store persists both as one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::validation::ValidationResult;

// =============================================================================
// Category
// =============================================================================

/// A product category (Bebidas, Lácteos, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    /// Unique across the catalog.
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Category this product is listed under.
    pub category_id: Option<String>,

    /// Display name.
    pub name: String,

    pub description: Option<String>,

    pub image_url: Option<String>,

    /// Current list price in cents. Sales capture this at sale time.
    pub price_cents: i64,

    /// Units on hand. `None` means stock was never configured for the
    /// product, which blocks any sale of it.
    ///
    /// Sale-driven changes go exclusively through the stock ledger.
    pub stock: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks if `quantity` units could be taken from stock right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        matches!(self.stock, Some(stock) if stock >= quantity)
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment Status
// =============================================================================

/// Card-payment state of a sale.
///
/// ```text
///   Unpaid ──begin_checkout──► Pending ──webhook──► Paid
///                                 │
///                                 └──────failure───► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

/// Payment sub-state carried by a sale.
///
/// The sale engine never writes this; it is set by checkout and the
/// payment webhook and survives sale updates untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInfo {
    pub status: PaymentStatus,
    /// Payment provider name ("stripe").
    pub provider: Option<String>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

// =============================================================================
// Delivery Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Quoted and recorded, no rider yet.
    Pending,
    /// A rider has been assigned.
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Pending
    }
}

/// Home-delivery sub-state carried by a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryInfo {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: f64,
    pub fee_cents: i64,
    pub eta_minutes: i64,
    pub status: DeliveryStatus,
    pub rider_id: Option<String>,
}

// =============================================================================
// Line Item
// =============================================================================

/// One product/quantity/price entry of a sale.
///
/// `unit_price_cents` is captured when the sale is created or updated and is
/// independent of later product price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    /// Always > 0.
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`
    pub subtotal_cents: i64,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale and its owned line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
    /// Derived from the line items, never set by a caller.
    pub total_cents: i64,
    pub line_items: Vec<LineItem>,
    pub payment: PaymentInfo,
    pub delivery: Option<DeliveryInfo>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Re-derives `total_cents` from the current line items.
    ///
    /// Leaves the sale untouched if the total overflows.
    pub fn recompute_total(&mut self) -> ValidationResult<()> {
        self.total_cents = crate::pricing::total(&self.line_items)?.cents();
        Ok(())
    }

    /// Checks `total == Σ subtotal` and `subtotal == quantity × unit price`
    /// for every line.
    pub fn is_consistent(&self) -> bool {
        let lines_ok = self.line_items.iter().all(|li| {
            crate::pricing::subtotal(li.quantity, li.unit_price()) == Ok(li.subtotal())
        });
        lines_ok && crate::pricing::total(&self.line_items) == Ok(self.total())
    }

    /// Distinct product ids referenced by this sale.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.line_items.iter().map(|li| li.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A requested line item. When `unit_price_cents` is omitted the product's
/// current price is captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

impl LineItemRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineItemRequest {
            product_id: product_id.into(),
            quantity,
            unit_price_cents: None,
        }
    }

    pub fn with_price(mut self, unit_price_cents: i64) -> Self {
        self.unit_price_cents = Some(unit_price_cents);
        self
    }
}

/// Input of sale create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub customer_id: String,
    /// Defaults to now.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub sold_at: Option<DateTime<Utc>>,
    pub line_items: Vec<LineItemRequest>,
}

impl SaleRequest {
    pub fn new(customer_id: impl Into<String>, line_items: Vec<LineItemRequest>) -> Self {
        SaleRequest {
            customer_id: customer_id.into(),
            sold_at: None,
            line_items,
        }
    }

    pub fn sold_at(mut self, sold_at: DateTime<Utc>) -> Self {
        self.sold_at = Some(sold_at);
        self
    }

    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.line_items.iter().map(|li| li.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

// =============================================================================
// Stock Adjustment
// =============================================================================

/// A stock change applied within one sale operation.
///
/// Lives only as long as the operation; the journal uses it to issue the
/// compensating writes if a later step fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: String,
    /// Negative for a sale decrement, positive for a restore.
    pub delta: i64,
    pub applied: bool,
}

impl StockAdjustment {
    /// The adjustment that undoes this one.
    pub fn reversal(&self) -> StockAdjustment {
        StockAdjustment {
            product_id: self.product_id.clone(),
            delta: -self.delta,
            applied: false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
