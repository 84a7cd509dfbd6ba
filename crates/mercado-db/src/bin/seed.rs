//! # Seed Data Generator
//!
//! Populates the database with a demo catalog and customers.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p mercado-db --bin seed
//!
//! # Specify database path and starting stock
//! cargo run -p mercado-db --bin seed -- --db ./data/mercado.db --stock 50
//! ```
//!
//! ## Generated Data
//! - One category per aisle (Bebidas, Lácteos, Abarrotes, Limpieza)
//! - Every product of the aisle, priced in cents, with `--stock` units
//! - A handful of customers

use std::env;

use mercado_db::demo::seed_demo_data;
use mercado_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut stock: i64 = 100;
    let mut db_path = String::from("./mercado_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mercado Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stock <N>    Starting stock per product (default: 100)");
                println!("  -d, --db <PATH>    Database file path (default: ./mercado_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Mercado Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let summary = seed_demo_data(&db, stock).await?;

    println!();
    println!(
        "✓ Seeded {} categories, {} products, {} customers",
        summary.categories, summary.products, summary.customers
    );

    Ok(())
}
