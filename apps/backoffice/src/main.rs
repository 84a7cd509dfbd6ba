//! # Back-Office Entry Point
//!
//! ```bash
//! backoffice seed 50
//! backoffice sell <customer-id> <product-id>:2 <product-id>:1@450
//! backoffice void <sale-id>
//! ```
//!
//! Results are printed to stdout as JSON. Failures are printed to stderr as
//! an `ApiError` and the process exits with status 1.

use std::process::ExitCode;

use tracing::info;

use mercado_backoffice::{init_tracing, ApiError, AppConfig, Backoffice, Command};
use mercado_db::Database;

const USAGE: &str = "\
Usage: backoffice <command> [args]

Commands:
  seed [stock]                                  Load the demo catalog
  products                                      List products
  sales                                         List sales, newest first
  sell <customer> <item>...                     Record a sale
  resell <sale> <customer> <item>...            Replace a sale's customer and items
  void <sale>                                   Delete a sale and return its stock
  quote <lat> <lng>                             Quote a delivery fee
  deliver <sale> <lat> <lng> <address...>       Attach a delivery to a sale
  dispatch <sale> <status> [rider]              Move a delivery along
  checkout <sale> <session> [provider]          Mark a sale's payment pending
  paid <session> <intent>                       Mark a checkout session paid

  <item> = <product-id>:<qty>[@<unit-price-cents>]

Environment:
  MERCADO_CONFIG    Path to a TOML config file (default ./mercado.toml)
  MERCADO_DB_PATH   Database file path
  RUST_LOG          Log filter";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || matches!(args[0].as_str(), "--help" | "-h" | "help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    init_tracing();

    match run(&args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let body = serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string());
            eprintln!("{body}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<String, ApiError> {
    let command = Command::parse(args)?;

    let config = AppConfig::load()?;
    info!(db_path = ?config.database.path, "Configuration loaded");

    let db = Database::new(config.db_config()).await?;
    let office = Backoffice::new(db, config.engine_config(), config.delivery_rates());

    let output = office.run(command).await?;
    office.db().close().await;

    serde_json::to_string_pretty(&output).map_err(|e| ApiError::internal(e.to_string()))
}
