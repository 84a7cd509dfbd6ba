//! # Mercado Back-Office
//!
//! Command-line stand-in for the back-office API layer.
//!
//! ## Module Organization
//! ```text
//! mercado_backoffice/
//! ├── lib.rs          ◄─── You are here
//! ├── config.rs       ◄─── AppConfig (defaults → TOML file → environment)
//! ├── commands.rs     ◄─── Command parsing and execution
//! └── error.rs        ◄─── ApiError returned by every command
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration
//! 3. Connect to database & run migrations
//! 4. Build the sale engine over the SQLite store
//! 5. Run the command, print its JSON result

pub mod commands;
pub mod config;
pub mod error;

use tracing_subscriber::EnvFilter;

pub use commands::{Backoffice, Command};
pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ErrorCode};

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=mercado_sales=trace` - Trace the sale engine only
/// - Default: `info,mercado=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mercado=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
