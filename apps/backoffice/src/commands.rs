//! # Back-Office Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Command                            Goes through                        │
//! │  ───────                            ────────────                        │
//! │  seed [stock]                       demo data loader                    │
//! │  products / sales                   repositories (read)                 │
//! │  sell <customer> <item>...          SaleOrchestrator::create_sale       │
//! │  resell <sale> <customer> <item>... SaleOrchestrator::update_sale       │
//! │  void <sale>                        SaleOrchestrator::delete_sale       │
//! │  quote <lat> <lng>                  delivery fee quote                  │
//! │  deliver <sale> <lat> <lng> <addr>  quote + SaleRepository              │
//! │  dispatch <sale> <status> [rider]   SaleRepository                      │
//! │  checkout <sale> <session> [prov]   SaleRepository (payment Pending)    │
//! │  paid <session> <intent>            SaleRepository (payment Paid)       │
//! │                                                                         │
//! │  <item> = <product-id>:<qty>[@<unit-price-cents>]                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ApiError;
use mercado_core::delivery::{quote, DeliveryRates};
use mercado_core::validation::{validate_coordinates, validate_id};
use mercado_core::{DeliveryStatus, LineItemRequest, SaleRequest};
use mercado_db::demo::seed_demo_data;
use mercado_db::{Database, SqliteStore};
use mercado_sales::{EngineConfig, SaleOrchestrator};

const LIST_LIMIT: u32 = 100;
const DEFAULT_PROVIDER: &str = "stripe";

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Seed { stock: i64 },
    Products,
    Sales,
    Sell { request: SaleRequest },
    Resell { sale_id: String, request: SaleRequest },
    Void { sale_id: String },
    Quote { lat: f64, lng: f64 },
    Deliver { sale_id: String, lat: f64, lng: f64, address: String },
    Dispatch { sale_id: String, status: DeliveryStatus, rider_id: Option<String> },
    Checkout { sale_id: String, session_id: String, provider: String },
    Paid { session_id: String, payment_intent_id: String },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Command, ApiError> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| ApiError::validation("missing command"))?;
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

        match (name.as_str(), rest.as_slice()) {
            ("seed", []) => Ok(Command::Seed { stock: 100 }),
            ("seed", [stock]) => Ok(Command::Seed {
                stock: parse_number("stock", stock)?,
            }),
            ("products", []) => Ok(Command::Products),
            ("sales", []) => Ok(Command::Sales),
            ("sell", [customer, items @ ..]) => Ok(Command::Sell {
                request: parse_request(customer, items)?,
            }),
            ("resell", [sale_id, customer, items @ ..]) => Ok(Command::Resell {
                sale_id: sale_id.to_string(),
                request: parse_request(customer, items)?,
            }),
            ("void", [sale_id]) => Ok(Command::Void {
                sale_id: sale_id.to_string(),
            }),
            ("quote", [lat, lng]) => Ok(Command::Quote {
                lat: parse_number("lat", lat)?,
                lng: parse_number("lng", lng)?,
            }),
            ("deliver", [sale_id, lat, lng, address @ ..]) if !address.is_empty() => {
                Ok(Command::Deliver {
                    sale_id: sale_id.to_string(),
                    lat: parse_number("lat", lat)?,
                    lng: parse_number("lng", lng)?,
                    address: address.join(" "),
                })
            }
            ("dispatch", [sale_id, status, rider @ ..]) if rider.len() <= 1 => {
                Ok(Command::Dispatch {
                    sale_id: sale_id.to_string(),
                    status: parse_delivery_status(status)?,
                    rider_id: rider.first().map(|r| r.to_string()),
                })
            }
            ("checkout", [sale_id, session_id, provider @ ..]) if provider.len() <= 1 => {
                Ok(Command::Checkout {
                    sale_id: sale_id.to_string(),
                    session_id: session_id.to_string(),
                    provider: provider.first().unwrap_or(&DEFAULT_PROVIDER).to_string(),
                })
            }
            ("paid", [session_id, intent]) => Ok(Command::Paid {
                session_id: session_id.to_string(),
                payment_intent_id: intent.to_string(),
            }),
            (other, _) => Err(ApiError::validation(format!(
                "unknown command or wrong arguments: {other}"
            ))),
        }
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("{field} is not a valid number: '{raw}'")))
}

fn parse_request(customer: &str, items: &[&str]) -> Result<SaleRequest, ApiError> {
    let line_items = items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SaleRequest::new(customer, line_items))
}

/// `<product-id>:<qty>[@<unit-price-cents>]`
fn parse_item(raw: &str) -> Result<LineItemRequest, ApiError> {
    let (product_id, rest) = raw
        .split_once(':')
        .ok_or_else(|| ApiError::validation(format!("line item must be <product>:<qty>, got '{raw}'")))?;

    let item = match rest.split_once('@') {
        Some((qty, price)) => LineItemRequest::new(product_id, parse_number("quantity", qty)?)
            .with_price(parse_number("unit price", price)?),
        None => LineItemRequest::new(product_id, parse_number("quantity", rest)?),
    };
    Ok(item)
}

fn parse_delivery_status(raw: &str) -> Result<DeliveryStatus, ApiError> {
    match raw.to_lowercase().as_str() {
        "pending" => Ok(DeliveryStatus::Pending),
        "assigned" => Ok(DeliveryStatus::Assigned),
        "in_transit" | "in-transit" => Ok(DeliveryStatus::InTransit),
        "delivered" => Ok(DeliveryStatus::Delivered),
        "cancelled" | "canceled" => Ok(DeliveryStatus::Cancelled),
        other => Err(ApiError::validation(format!(
            "Unknown delivery status: '{other}'. Valid options: pending, assigned, in_transit, delivered, cancelled"
        ))),
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Everything a command needs.
pub struct Backoffice {
    db: Database,
    engine: SaleOrchestrator<SqliteStore>,
    rates: DeliveryRates,
}

impl Backoffice {
    pub fn new(db: Database, engine_config: EngineConfig, rates: DeliveryRates) -> Self {
        let engine = SaleOrchestrator::new(db.store(), engine_config);
        Backoffice { db, engine, rates }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Runs one command, returning its JSON output.
    pub async fn run(&self, command: Command) -> Result<Value, ApiError> {
        debug!(?command, "Running command");

        let output = match command {
            Command::Seed { stock } => {
                if self.db.products().count().await? > 0 {
                    return Err(ApiError::validation("catalog already has products"));
                }
                let summary = seed_demo_data(&self.db, stock).await?;
                info!(products = summary.products, "Demo data seeded");
                json!({
                    "categories": summary.categories,
                    "products": summary.products,
                    "customers": summary.customers,
                })
            }
            Command::Products => to_json(&self.db.products().list(LIST_LIMIT).await?)?,
            Command::Sales => to_json(&self.db.sales().list(LIST_LIMIT).await?)?,
            Command::Sell { request } => to_json(&self.engine.create_sale(request).await?)?,
            Command::Resell { sale_id, request } => {
                to_json(&self.engine.update_sale(&sale_id, request).await?)?
            }
            Command::Void { sale_id } => to_json(&self.engine.delete_sale(&sale_id).await?)?,
            Command::Quote { lat, lng } => {
                validate_coordinates(lat, lng).map_err(mercado_core::CoreError::from)?;
                to_json(&quote(&self.rates, lat, lng))?
            }
            Command::Deliver {
                sale_id,
                lat,
                lng,
                address,
            } => {
                validate_coordinates(lat, lng).map_err(mercado_core::CoreError::from)?;
                let fee = quote(&self.rates, lat, lng);
                let sale = self
                    .db
                    .sales()
                    .record_delivery(&sale_id, &address, lat, lng, &fee)
                    .await?;
                to_json(&sale)?
            }
            Command::Dispatch {
                sale_id,
                status,
                rider_id,
            } => {
                self.db
                    .sales()
                    .update_delivery_status(&sale_id, status, rider_id.as_deref())
                    .await?;
                json!({ "saleId": sale_id, "status": status })
            }
            Command::Checkout {
                sale_id,
                session_id,
                provider,
            } => {
                validate_id("session_id", &session_id).map_err(mercado_core::CoreError::from)?;
                let sale = self
                    .db
                    .sales()
                    .begin_checkout(&sale_id, &provider, &session_id)
                    .await?;
                json!({
                    "saleId": sale.id,
                    "amountCents": sale.total_cents,
                    "payment": sale.payment,
                })
            }
            Command::Paid {
                session_id,
                payment_intent_id,
            } => to_json(&self.db.sales().mark_paid(&session_id, &payment_intent_id).await?)?,
        };

        Ok(output)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use mercado_db::DbConfig;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    async fn backoffice() -> Backoffice {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let office = Backoffice::new(db, EngineConfig::default(), DeliveryRates::default());
        office.run(Command::Seed { stock: 10 }).await.unwrap();
        office
    }

    async fn first_ids(office: &Backoffice) -> (String, String) {
        let products = office.db().products().list(1).await.unwrap();
        let customers = office.db().customers().list(1).await.unwrap();
        (customers[0].id.clone(), products[0].id.clone())
    }

    async fn stock_of(office: &Backoffice, id: &str) -> Option<i64> {
        office.db().products().get_by_id(id).await.unwrap().unwrap().stock
    }

    #[test]
    fn test_parse_sell() {
        let cmd = Command::parse(&args("sell c1 p1:2 p2:1@450")).unwrap();
        assert_eq!(
            cmd,
            Command::Sell {
                request: SaleRequest::new(
                    "c1",
                    vec![
                        LineItemRequest::new("p1", 2),
                        LineItemRequest::new("p2", 1).with_price(450),
                    ]
                )
            }
        );
    }

    #[test]
    fn test_parse_deliver_joins_address() {
        let cmd = Command::parse(&args("deliver s1 -17.79 -63.18 Calle Sucre 123")).unwrap();
        assert!(matches!(cmd, Command::Deliver { ref address, .. } if address == "Calle Sucre 123"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args("sell c1 p1")).is_err());
        assert!(Command::parse(&args("quote north south")).is_err());
        assert!(Command::parse(&args("dispatch s1 lost")).is_err());
        assert!(Command::parse(&args("refund s1")).is_err());
    }

    #[tokio::test]
    async fn test_sell_resell_void() {
        let office = backoffice().await;
        let (customer, product) = first_ids(&office).await;

        let sold = office
            .run(Command::parse(&args(&format!("sell {customer} {product}:3"))).unwrap())
            .await
            .unwrap();
        let sale_id = sold["id"].as_str().unwrap().to_string();
        assert_eq!(stock_of(&office, &product).await, Some(7));

        office
            .run(Command::parse(&args(&format!("resell {sale_id} {customer} {product}:1"))).unwrap())
            .await
            .unwrap();
        assert_eq!(stock_of(&office, &product).await, Some(9));

        office
            .run(Command::Void { sale_id })
            .await
            .unwrap();
        assert_eq!(stock_of(&office, &product).await, Some(10));
    }

    #[tokio::test]
    async fn test_oversell_maps_to_insufficient_stock() {
        let office = backoffice().await;
        let (customer, product) = first_ids(&office).await;

        let err = office
            .run(Command::parse(&args(&format!("sell {customer} {product}:11"))).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_delivery_and_payment_flow() {
        let office = backoffice().await;
        let (customer, product) = first_ids(&office).await;

        let sold = office
            .run(Command::parse(&args(&format!("sell {customer} {product}:1"))).unwrap())
            .await
            .unwrap();
        let sale_id = sold["id"].as_str().unwrap().to_string();

        let delivered = office
            .run(Command::Deliver {
                sale_id: sale_id.clone(),
                lat: -17.79,
                lng: -63.18,
                address: "Calle Sucre 123".into(),
            })
            .await
            .unwrap();
        assert_eq!(delivered["delivery"]["status"], "pending");

        let checkout = office
            .run(Command::Checkout {
                sale_id: sale_id.clone(),
                session_id: "cs_1".into(),
                provider: DEFAULT_PROVIDER.into(),
            })
            .await
            .unwrap();
        assert_eq!(checkout["amountCents"], sold["total_cents"]);

        let paid = office
            .run(Command::Paid {
                session_id: "cs_1".into(),
                payment_intent_id: "pi_1".into(),
            })
            .await
            .unwrap();
        assert_eq!(paid["payment"]["status"], "paid");
    }

    #[tokio::test]
    async fn test_quote_rejects_bad_coordinates() {
        let office = backoffice().await;
        let err = office
            .run(Command::Quote { lat: 95.0, lng: 0.0 })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
